//! Per-pixel relaxometry: T1 inversion-recovery and T2 multi-echo models,
//! pixel fits, whole-image parameter maps and synthetic weighted images.

pub mod error;
pub mod model;
pub mod linalg;
pub mod fit;
pub mod series;
pub mod param_map;
pub mod synth;

pub use error::FitError;
pub use model::{ModelKind, ModelParams};
pub use fit::{FitSettings, FitStatus, PixelFitter, PixelSample, RelaxationFit, T2Method};
pub use series::ImageSeries;
pub use param_map::{FitSummary, ParameterMap};
pub use synth::{generate, synthesize, SynthesisMode, SynthesisOutput, SyntheticImage};
