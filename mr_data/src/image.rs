use std::path::{Path,PathBuf};
use std::fs::{create_dir_all, File};
use std::io::{Read,Write};
use byteorder::{ByteOrder,BigEndian};
use log::debug;
use ndarray::{Array3, Axis};
use nifti::writer::WriterOptions;
use serde::{Deserialize, Serialize};
use crate::error::MrDataError;

// typical histo %: 0.999500
pub const DEFAULT_HIST_PERCENT:f64 = 0.9995;

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct ImageScale {
    pub histogram_percent:f32,
    pub scale_factor:f32
}

impl ImageScale {
    pub fn new(histogram_percent:f32,scale_factor:f32) -> Self {
        Self {
            histogram_percent,
            scale_factor
        }
    }

    pub fn from_image(img:&Array3<f32>,histo_percent:f64) -> Self {
        let mag:Vec<f32> = img.iter().copied().collect();
        Self::new(histo_percent as f32,u16_scale_from_vec(&mag,histo_percent))
    }

    pub fn from_file(file_path:&Path) -> Result<Self,MrDataError> {
        let mut f = File::open(file_path).map_err(MrDataError::io(file_path))?;
        let mut s = String::new();
        f.read_to_string(&mut s).map_err(MrDataError::io(file_path))?;
        serde_json::from_str(&s).map_err(|source| MrDataError::Json { path:file_path.to_owned(), source })
    }

    pub fn to_file(&self,file_path:&Path) -> Result<(),MrDataError> {
        let s = serde_json::to_string_pretty(&self)
            .map_err(|source| MrDataError::Json { path:file_path.to_owned(), source })?;
        let mut f = File::create(file_path).map_err(MrDataError::io(file_path))?;
        f.write_all(s.as_bytes()).map_err(MrDataError::io(file_path))
    }
}

/// scale that maps the given histogram percentile of the image to full u16 range.
/// Non-finite samples are ignored; an all-zero image gets a unit scale.
pub fn u16_scale_from_vec(magnitude_img:&[f32],histo_percent:f64) -> f32 {
    let mut mag:Vec<f32> = magnitude_img.iter().copied().filter(|v| v.is_finite()).collect();
    if mag.is_empty() {
        return 1.0;
    }
    mag.sort_by(|a, b| a.total_cmp(b));
    let n_voxels = mag.len();
    let n_to_saturate = (n_voxels as f64 * (1.0-histo_percent)).round() as usize;
    let reference = mag[(n_voxels - 1).saturating_sub(n_to_saturate)];
    match reference > 0.0 {
        true => 65535.0/reference,
        false => 1.0
    }
}

pub fn write_nifti(vol:&Array3<f32>,nifti_file:&Path) -> Result<(),MrDataError> {
    debug!("writing {:?}",nifti_file);
    WriterOptions::new(nifti_file)
        .write_nifti(vol)
        .map_err(|source| MrDataError::Nifti { path:nifti_file.to_owned(), source })
}

/// one big-endian u16 file per slice, named `<label>.<slice number>.raw`.
/// `slice_numbers` are the 0-based acquisition indices of the slices along the
/// first axis. Files are numbered from 1.
pub fn write_raw_u16(vol:&Array3<f32>,slice_numbers:&[usize],output_dir:&Path,label:&str,scale:f32) -> Result<Vec<PathBuf>,MrDataError> {
    if slice_numbers.len() != vol.shape()[0] {
        return Err(MrDataError::DataShape(
            format!("{} slice numbers for {} slices",slice_numbers.len(),vol.shape()[0])
        ));
    }
    if !output_dir.exists(){
        create_dir_all(output_dir).map_err(MrDataError::io(output_dir))?;
    }
    let numel_per_img = vol.shape()[1]*vol.shape()[2];
    let mut byte_buff:Vec<u8> = vec![0;2*numel_per_img];
    let mut written = Vec::<PathBuf>::with_capacity(slice_numbers.len());
    for (slice,&number) in vol.axis_iter(Axis(0)).zip(slice_numbers) {
        let uints:Vec<u16> = slice.iter().map(|float| (*float*scale).round().clamp(0.0,65535.0) as u16).collect();
        let fname = output_dir.join(format!("{}.{:03}.raw",label,number + 1));
        BigEndian::write_u16_into(&uints,&mut byte_buff);
        let mut f = File::create(&fname).map_err(MrDataError::io(&fname))?;
        f.write_all(&byte_buff).map_err(MrDataError::io(&fname))?;
        written.push(fname);
    }
    Ok(written)
}
