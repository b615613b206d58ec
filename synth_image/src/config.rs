use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use mr_data::Orientation;
use mr_data::image::DEFAULT_HIST_PERCENT;
use relax::{FitSettings, SynthesisMode};
use crate::error::ConfigError;

pub trait Config {
    fn default() -> Self;
}

pub trait ConfigFile: Sized {
    fn to_file(&self,filename:&Path) -> Result<(),ConfigError>;
    fn from_file(filename:&Path) -> Result<Self,ConfigError>;
    fn file_ext() -> String;
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct OutputSettings {
    pub write_nifti:bool,
    /// 16-bit big-endian image per slice
    pub write_raw:bool,
    /// histogram fraction mapped to full scale in raw images
    pub image_scale_hist_percent:f64,
}

impl Config for OutputSettings {
    fn default() -> Self {
        Self {
            write_nifti:true,
            write_raw:true,
            image_scale_hist_percent:DEFAULT_HIST_PERCENT,
        }
    }
}

fn default_output() -> OutputSettings {
    <OutputSettings as Config>::default()
}

/// Everything a run needs. Plain values come before the tables so the struct
/// serializes to valid TOML.
#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct SynthConfig {
    pub input_dir:PathBuf,
    pub output_dir:PathBuf,
    /// slice indices to process, all slices when absent
    #[serde(default)]
    pub slices:Option<Vec<usize>>,
    /// fit worker threads, rayon's default pool when absent
    #[serde(default)]
    pub n_threads:Option<usize>,
    #[serde(default)]
    pub mode:SynthesisMode,
    #[serde(default)]
    pub fit:FitSettings,
    #[serde(default)]
    pub recon:Orientation,
    #[serde(default = "default_output")]
    pub output:OutputSettings,
}

impl Config for SynthConfig {
    fn default() -> Self {
        Self {
            input_dir:PathBuf::from("."),
            output_dir:PathBuf::from("synth_out"),
            slices:None,
            n_threads:None,
            mode:SynthesisMode::MapsOnly,
            fit:FitSettings::default(),
            recon:Orientation::default(),
            output:default_output(),
        }
    }
}

impl SynthConfig {
    pub fn new(input_dir:&Path,output_dir:&Path,mode:SynthesisMode) -> Self {
        Self {
            input_dir:input_dir.to_owned(),
            output_dir:output_dir.to_owned(),
            mode,
            ..<Self as Config>::default()
        }
    }

    pub fn validate(&self) -> Result<(),ConfigError> {
        self.fit.validate().map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let p = self.output.image_scale_hist_percent;
        if !(p > 0.0 && p <= 1.0) {
            return Err(ConfigError::Invalid(format!("image_scale_hist_percent must lie in (0, 1], got {}",p)));
        }
        if let SynthesisMode::Synthesize { timings_ms } = &self.mode {
            if timings_ms.is_empty() {
                return Err(ConfigError::Invalid(String::from("synthesize mode needs at least one timing value")));
            }
            if let Some(t) = timings_ms.iter().find(|t| !t.is_finite() || **t < 0.0) {
                return Err(ConfigError::Invalid(format!("timing value {} ms is not a finite, non-negative number",t)));
            }
        }
        if let Some(slices) = &self.slices {
            if slices.is_empty() {
                return Err(ConfigError::Invalid(String::from("slice list is empty")));
            }
        }
        if self.n_threads == Some(0) {
            return Err(ConfigError::Invalid(String::from("n_threads must be at least 1")));
        }
        Ok(())
    }
}

impl ConfigFile for SynthConfig {
    fn to_file(&self,filename:&Path) -> Result<(),ConfigError> {
        let t = toml::to_string_pretty(&self)?;
        utils::write_to_file(filename,&Self::file_ext(),&t)
            .map_err(|source| ConfigError::Io { path:filename.with_extension(Self::file_ext()), source })
    }

    fn from_file(filename:&Path) -> Result<Self,ConfigError> {
        let path = filename.with_extension(Self::file_ext());
        let t = utils::read_to_string(filename,&Self::file_ext())
            .map_err(|source| ConfigError::Io { path:path.clone(), source })?;
        toml::from_str(&t).map_err(|source| ConfigError::Parse { path, source })
    }

    fn file_ext() -> String {
        String::from("toml")
    }
}
