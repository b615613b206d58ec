//! Theoretical T1/T2-weighted image synthesis from relaxometry acquisitions.
//!
//! A run loads raw k-space through a [mr_data::KSpaceSource], reconstructs one
//! magnitude image per inversion or echo time, fits the relaxation model of every
//! pixel and writes either parameter maps alone or synthetic images at new timing
//! values. Everything a run needs is in [SynthConfig].

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;

pub use config::{Config, ConfigFile, OutputSettings, SynthConfig};
pub use error::{ConfigError, PipelineError, Stage};
pub use pipeline::{Pipeline, PipelineOutput};
