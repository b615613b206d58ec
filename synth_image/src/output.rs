//! On-disk layout of a run:
//!
//! ```text
//! <output_dir>/
//!     synth_image.headfile
//!     maps/<label>.nii            t1_map|t2_map, m0_map, residual, validity, status, ...
//!     maps/<label>/<label>.NNN.raw   NNN = slice index + 1
//!     maps/fit_summary.json
//!     synthetic/<TI|TE>_<t>ms.nii
//!     synthetic/<TI|TE>_<t>ms/<TI|TE>_<t>ms.NNN.raw
//! ```

use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use log::info;
use ndarray::Array3;
use mr_data::MrDataError;
use mr_data::headfile::Headfile;
use mr_data::image::{self, ImageScale};
use relax::{ModelKind, ParameterMap, SyntheticImage};
use crate::config::OutputSettings;

pub const MAPS_DIR:&str = "maps";
pub const SYNTHETIC_DIR:&str = "synthetic";
pub const SUMMARY_HEADFILE:&str = "synth_image.headfile";
pub const FIT_SUMMARY:&str = "fit_summary.json";

pub fn relaxation_map_label(kind:ModelKind) -> String {
    format!("{}_map",kind.map_label())
}

pub fn synthetic_label(kind:ModelKind,timing_ms:f64) -> String {
    format!("{}_{}ms",kind.timing_label(),utils::ms_label(timing_ms))
}

pub struct OutputWriter<'a> {
    dir:&'a Path,
    settings:&'a OutputSettings,
    /// acquisition slice number of each output slice
    slice_numbers:&'a [usize],
    written:Vec<PathBuf>,
}

impl<'a> OutputWriter<'a> {
    pub fn new(dir:&'a Path,settings:&'a OutputSettings,slice_numbers:&'a [usize]) -> Self {
        Self { dir, settings, slice_numbers, written:Vec::new() }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn into_written(self) -> Vec<PathBuf> {
        self.written
    }

    fn volume(&mut self,sub_dir:&str,label:&str,vol:&Array3<f32>,raw:bool,summary:&mut Headfile) -> Result<(),MrDataError> {
        let dir = self.dir.join(sub_dir);
        create_dir_all(&dir).map_err(MrDataError::io(&dir))?;
        if self.settings.write_nifti {
            let nii = dir.join(format!("{}.nii",label));
            image::write_nifti(vol,&nii)?;
            self.written.push(nii);
        }
        if raw && self.settings.write_raw {
            let scale = ImageScale::from_image(vol,self.settings.image_scale_hist_percent);
            let raw_dir = dir.join(label);
            let files = image::write_raw_u16(vol,self.slice_numbers,&raw_dir,label,scale.scale_factor)?;
            let scale_file = dir.join(format!("{}_scale.json",label));
            scale.to_file(&scale_file)?;
            summary.append_field(format!("{}_scale_factor",label),scale.scale_factor);
            self.written.extend(files);
            self.written.push(scale_file);
        }
        Ok(())
    }

    pub fn write_maps(&mut self,maps:&ParameterMap,summary:&mut Headfile) -> Result<(),MrDataError> {
        let kind = maps.kind();
        let as_f32 = |a:&Array3<f64>| a.mapv(|v| v as f32);
        let codes_f32 = |a:&Array3<u8>| a.mapv(|v| v as f32);

        self.volume(MAPS_DIR,&relaxation_map_label(kind),&as_f32(maps.relaxation_time()),true,summary)?;
        self.volume(MAPS_DIR,"m0_map",&as_f32(maps.m0()),true,summary)?;
        self.volume(MAPS_DIR,"offset_map",&as_f32(maps.offset()),false,summary)?;
        self.volume(MAPS_DIR,"residual",&as_f32(maps.residual()),false,summary)?;
        self.volume(MAPS_DIR,"validity",&codes_f32(&maps.validity()),false,summary)?;
        self.volume(MAPS_DIR,"status",&codes_f32(maps.status()),false,summary)?;
        if kind == ModelKind::T1InversionRecovery {
            self.volume(MAPS_DIR,"inversion_efficiency_map",&as_f32(maps.inversion_efficiency()),false,summary)?;
        }
        if let Some(sign_map) = maps.sign_map() {
            self.volume(MAPS_DIR,"sign_map",&codes_f32(sign_map),false,summary)?;
        }

        let json_file = self.dir.join(MAPS_DIR).join(FIT_SUMMARY);
        let s = serde_json::to_string_pretty(maps.summary())
            .map_err(|source| MrDataError::Json { path:json_file.clone(), source })?;
        let mut f = File::create(&json_file).map_err(MrDataError::io(&json_file))?;
        f.write_all(s.as_bytes()).map_err(MrDataError::io(&json_file))?;
        self.written.push(json_file);

        let fs = maps.summary();
        summary.append_field("fit_valid",fs.valid);
        summary.append_field("fit_below_noise_floor",fs.below_noise_floor);
        summary.append_field("fit_degenerate",fs.degenerate);
        summary.append_field("fit_poor_fit",fs.poor_fit);
        info!("wrote {} maps to {:?}",kind.map_label(),self.dir.join(MAPS_DIR));
        Ok(())
    }

    pub fn write_synthetic(&mut self,images:&[SyntheticImage],summary:&mut Headfile) -> Result<(),MrDataError> {
        for im in images {
            let label = synthetic_label(im.kind,im.timing_ms);
            self.volume(SYNTHETIC_DIR,&label,&im.image,true,summary)?;
            info!("wrote synthetic image {}",label);
        }
        if let Some(first) = images.first() {
            let timings:Vec<f64> = images.iter().map(|im| im.timing_ms).collect();
            summary.append_field(format!("synthetic_{}_ms",first.kind.timing_label().to_lowercase()),utils::vec_to_string(&timings));
        }
        Ok(())
    }

    pub fn write_summary(&mut self,summary:&Headfile) -> Result<(),MrDataError> {
        let file = self.dir.join(SUMMARY_HEADFILE);
        summary.write(&file)?;
        self.written.push(file);
        Ok(())
    }
}
