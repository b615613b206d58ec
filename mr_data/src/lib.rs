//! Raw relaxometry data handling: k-space containers, acquisition headers,
//! image reconstruction and image writers.

pub mod error;
pub mod cfl;
pub mod headfile;
pub mod acquisition;
pub mod recon;
pub mod image;

pub use error::MrDataError;
pub use acquisition::{AcqHeader, AcquisitionDir, KSpaceSeries, KSpaceSource, ReconMode, Relaxometry};
pub use recon::Orientation;
