use thiserror::Error;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("inconsistent image series: {0}")]
    DataShape(String),
    #[error("invalid timing value {0} ms")]
    InvalidTiming(f64),
    #[error("invalid fit settings: {0}")]
    Settings(String),
}
