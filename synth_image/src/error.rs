use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use mr_data::MrDataError;
use relax::FitError;

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Stage {
    Load,
    Reconstruct,
    Fit,
    Synthesize,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self,f:&mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Load => "load",
            Stage::Reconstruct => "reconstruct",
            Stage::Fit => "fit",
            Stage::Synthesize => "synthesize",
            Stage::Write => "write",
        };
        write!(f,"{}",s)
    }
}

#[derive(Debug,Error)]
pub enum ConfigError {
    #[error("cannot access config file {path:?}")]
    Io {
        path:PathBuf,
        #[source]
        source:std::io::Error,
    },
    #[error("cannot parse config file {path:?}")]
    Parse {
        path:PathBuf,
        #[source]
        source:toml::de::Error,
    },
    #[error("cannot serialize config")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// fatal failure of a run, tagged with the stage and the input it was working on
#[derive(Debug,Error)]
pub enum PipelineError {
    #[error("{stage} stage failed on {input}")]
    Data {
        stage:Stage,
        input:String,
        #[source]
        source:MrDataError,
    },
    #[error("{stage} stage failed on {input}")]
    Fit {
        stage:Stage,
        input:String,
        #[source]
        source:FitError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// None for configuration errors, which happen before any stage runs
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Data { stage, .. } | PipelineError::Fit { stage, .. } => Some(*stage),
            PipelineError::Config(_) => None,
        }
    }

    pub(crate) fn data(stage:Stage,input:&str) -> impl FnOnce(MrDataError) -> Self {
        let input = input.to_owned();
        move |source| PipelineError::Data { stage, input, source }
    }

    pub(crate) fn fit(stage:Stage,input:&str) -> impl FnOnce(FitError) -> Self {
        let input = input.to_owned();
        move |source| PipelineError::Fit { stage, input, source }
    }
}
