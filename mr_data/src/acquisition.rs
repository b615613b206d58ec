//! Acquisition description and the k-space loader seam.
//!
//! Raw vendor containers are parsed elsewhere. What reaches the reconstructor is
//! a [KSpaceSeries]: one complex (slice, phase, read) volume per timing value plus
//! the header describing the experiment. [AcquisitionDir] is the on-disk form of
//! that contract: a cfl/hdr pair and a headfile in one directory.

use std::path::{Path, PathBuf};
use std::fs::create_dir_all;
use log::info;
use ndarray::{stack, Array3, Array4, Axis};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use crate::cfl;
use crate::error::MrDataError;
use crate::headfile::Headfile;

const KSPACE_BASE:&str = "kspace";
const HEADFILE_NAME:&str = "acq.headfile";

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize)]
pub enum Relaxometry {
    /// inversion-recovery spin echo, timing values are inversion times
    T1InversionRecovery,
    /// multi-echo spin echo, timing values are echo times
    T2MultiEcho,
}

impl Relaxometry {
    pub fn code(&self) -> &'static str {
        match self {
            Relaxometry::T1InversionRecovery => "t1_ir",
            Relaxometry::T2MultiEcho => "t2_me",
        }
    }

    pub fn from_code(code:&str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "t1_ir" | "sems_ir" | "ir" => Some(Relaxometry::T1InversionRecovery),
            "t2_me" | "mems" | "me" => Some(Relaxometry::T2MultiEcho),
            _ => None
        }
    }
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq,Serialize,Deserialize)]
pub enum ReconMode {
    /// independent 2D transforms per slice
    #[default]
    MultiSlice2d,
    /// one 3D transform per timing value
    Volume3d,
}

impl ReconMode {
    pub fn code(&self) -> &'static str {
        match self {
            ReconMode::MultiSlice2d => "2d",
            ReconMode::Volume3d => "3d",
        }
    }

    pub fn from_code(code:&str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "2d" => Some(ReconMode::MultiSlice2d),
            "3d" => Some(ReconMode::Volume3d),
            _ => None
        }
    }
}

#[derive(Clone,Debug,PartialEq)]
pub struct AcqHeader {
    pub relaxometry:Relaxometry,
    /// inversion or echo times in acquisition order (ms)
    pub timing_ms:Vec<f64>,
    pub recon_mode:ReconMode,
    /// (slice, phase, read) if recorded
    pub matrix:Option<[usize;3]>,
}

impl AcqHeader {
    pub fn new(relaxometry:Relaxometry,timing_ms:&[f64]) -> Self {
        Self {
            relaxometry,
            timing_ms:timing_ms.to_vec(),
            recon_mode:ReconMode::default(),
            matrix:None,
        }
    }

    pub fn from_headfile(hf:&Headfile,path:&Path) -> Result<Self,MrDataError> {
        let bad = |reason:String| MrDataError::malformed(path,reason);
        let code = hf.get("relaxometry").ok_or_else(|| bad(String::from("missing relaxometry")))?;
        let relaxometry = Relaxometry::from_code(code)
            .ok_or_else(|| bad(format!("unknown relaxometry '{}'",code)))?;
        let timing_ms:Vec<f64> = hf.get_list("timing_ms").map_err(bad)?
            .ok_or_else(|| bad(String::from("missing timing_ms")))?;
        if timing_ms.is_empty() {
            return Err(bad(String::from("timing_ms is empty")));
        }
        let recon_mode = match hf.get("recon_mode") {
            Some(code) => ReconMode::from_code(code).ok_or_else(|| bad(format!("unknown recon_mode '{}'",code)))?,
            None => ReconMode::default()
        };
        let dims = (
            hf.get_parsed::<usize>("dim_slice").map_err(bad)?,
            hf.get_parsed::<usize>("dim_phase").map_err(bad)?,
            hf.get_parsed::<usize>("dim_read").map_err(bad)?,
        );
        let matrix = match dims {
            (Some(s),Some(p),Some(r)) => Some([s,p,r]),
            (None,None,None) => None,
            _ => return Err(bad(String::from("dim_slice, dim_phase and dim_read must be given together")))
        };
        Ok(Self { relaxometry, timing_ms, recon_mode, matrix })
    }

    pub fn to_headfile(&self) -> Headfile {
        let mut hf = Headfile::new();
        hf.append_field("relaxometry",self.relaxometry.code());
        hf.append_field("timing_ms",utils::vec_to_string(&self.timing_ms));
        hf.append_field("recon_mode",self.recon_mode.code());
        if let Some([s,p,r]) = self.matrix {
            hf.append_field("dim_slice",s);
            hf.append_field("dim_phase",p);
            hf.append_field("dim_read",r);
        }
        hf
    }
}

#[derive(Clone,Debug)]
pub struct KSpaceSeries {
    header:AcqHeader,
    kspace:Vec<Array3<Complex32>>,
}

impl KSpaceSeries {
    /// one (slice, phase, read) volume per timing value, in header order
    pub fn new(header:AcqHeader,kspace:Vec<Array3<Complex32>>) -> Result<Self,MrDataError> {
        if kspace.len() != header.timing_ms.len() {
            return Err(MrDataError::DataShape(
                format!("{} k-space volumes for {} timing values",kspace.len(),header.timing_ms.len())
            ));
        }
        if let Some(matrix) = header.matrix {
            if let Some((i,k)) = kspace.iter().enumerate().find(|(_,k)| k.shape() != matrix) {
                return Err(MrDataError::DataShape(
                    format!("k-space volume {} has shape {:?} but the header declares {:?}",i,k.shape(),matrix)
                ));
            }
        }
        Ok(Self { header, kspace })
    }

    /// split a (timing, slice, phase, read) array
    pub fn from_array(header:AcqHeader,kspace:&Array4<Complex32>) -> Result<Self,MrDataError> {
        let vols = kspace.outer_iter().map(|v| v.to_owned()).collect();
        Self::new(header,vols)
    }

    pub fn header(&self) -> &AcqHeader {
        &self.header
    }

    pub fn kspace(&self) -> &[Array3<Complex32>] {
        &self.kspace
    }

    pub fn n_slices(&self) -> usize {
        self.kspace.first().map(|k| k.shape()[0]).unwrap_or(0)
    }

    /// keep only the listed slices of every volume
    pub fn select_slices(&self,slices:&[usize]) -> Result<Self,MrDataError> {
        let n = self.n_slices();
        if let Some(bad) = slices.iter().find(|&&s| s >= n) {
            return Err(MrDataError::DataShape(format!("slice {} requested from {} slices",bad,n)));
        }
        let kspace = self.kspace.iter().map(|k| k.select(Axis(0),slices)).collect();
        let mut header = self.header.clone();
        header.matrix = header.matrix.map(|[_,p,r]| [slices.len(),p,r]);
        Self::new(header,kspace)
    }

    fn to_array(&self) -> Result<Array4<Complex32>,MrDataError> {
        let views:Vec<_> = self.kspace.iter().map(|k| k.view()).collect();
        stack(Axis(0),&views).map_err(|e| MrDataError::DataShape(e.to_string()))
    }
}

/// anything that can hand over raw k-space with its acquisition header
pub trait KSpaceSource {
    /// human readable origin used in error reports
    fn describe(&self) -> String;
    fn load(&self) -> Result<KSpaceSeries,MrDataError>;
}

impl KSpaceSource for KSpaceSeries {
    fn describe(&self) -> String {
        String::from("in-memory k-space")
    }
    fn load(&self) -> Result<KSpaceSeries,MrDataError> {
        Ok(self.clone())
    }
}

pub struct AcquisitionDir {
    dir:PathBuf,
}

impl AcquisitionDir {

    pub fn open(dir:&Path) -> Result<Self,MrDataError> {
        match dir.is_dir() {
            true => Ok(Self { dir:dir.to_owned() }),
            false => Err(MrDataError::InputMissing(dir.to_owned()))
        }
    }

    /// write a series in the layout `open` expects
    pub fn create(dir:&Path,series:&KSpaceSeries) -> Result<Self,MrDataError> {
        create_dir_all(dir).map_err(MrDataError::io(dir))?;
        let mut header = series.header().clone();
        if let Some(k) = series.kspace().first() {
            let s = k.shape();
            header.matrix = Some([s[0],s[1],s[2]]);
        }
        cfl::write_cfl4(&series.to_array()?,&dir.join(KSPACE_BASE))?;
        header.to_headfile().write(&dir.join(HEADFILE_NAME))?;
        Ok(Self { dir:dir.to_owned() })
    }

    fn single_match(&self,pattern:&str) -> Result<PathBuf,MrDataError> {
        let matches = utils::get_all_matches(&self.dir,pattern)
            .ok_or_else(|| MrDataError::InputMissing(self.dir.join(pattern)))?;
        match matches.len() {
            1 => Ok(matches[0].clone()),
            n => Err(MrDataError::malformed(&self.dir,format!("expected one {} file, found {}",pattern,n)))
        }
    }

    pub fn cfl_base(&self) -> Result<PathBuf,MrDataError> {
        self.single_match("*.cfl").map(|cfl| cfl.with_extension(""))
    }

    pub fn headfile_path(&self) -> Result<PathBuf,MrDataError> {
        self.single_match("*.headfile")
    }
}

impl KSpaceSource for AcquisitionDir {
    fn describe(&self) -> String {
        format!("{:?}",self.dir)
    }

    fn load(&self) -> Result<KSpaceSeries,MrDataError> {
        let hf_path = self.headfile_path()?;
        let header = AcqHeader::from_headfile(&Headfile::open(&hf_path)?,&hf_path)?;
        let base = self.cfl_base()?;
        let kspace = cfl::read_cfl4(&base)?;
        info!("loaded k-space {:?} from {:?} ({} timing values)",kspace.shape(),base,header.timing_ms.len());
        KSpaceSeries::from_array(header,&kspace)
    }
}
