use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MrDataError {
    #[error("input not found: {0:?}")]
    InputMissing(PathBuf),
    #[error("malformed input {path:?}: {reason}")]
    MalformedInput {
        path:PathBuf,
        reason:String,
    },
    #[error("inconsistent data shape: {0}")]
    DataShape(String),
    #[error("i/o failure on {path:?}")]
    Io {
        path:PathBuf,
        #[source]
        source:std::io::Error,
    },
    #[error("cannot write nifti {path:?}")]
    Nifti {
        path:PathBuf,
        #[source]
        source:nifti::NiftiError,
    },
    #[error("cannot serialize {path:?}")]
    Json {
        path:PathBuf,
        #[source]
        source:serde_json::Error,
    },
}

impl MrDataError {
    pub fn io(path:impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| MrDataError::Io { path, source }
    }

    pub(crate) fn malformed(path:impl Into<PathBuf>,reason:impl Into<String>) -> Self {
        MrDataError::MalformedInput { path:path.into(), reason:reason.into() }
    }
}
