// Detectors: one generic histogram with per-kind binning
pub mod detector;
pub mod histogram;
pub mod input;
pub mod result;

pub use detector::{Detector, DetectorContext, PhotonExit};
pub use histogram::Histogram;
pub use input::{DetectorInput, DetectorKind, PerturbationInput};
pub use result::DetectorResult;
