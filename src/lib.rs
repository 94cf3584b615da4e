//! Monte Carlo photon transport in layered turbid media.
//!
//! Photons are launched from a [`Source`], random-walk through a [`Tissue`]
//! of layers and embedded regions, and are tallied by detectors attached to
//! virtual boundaries. Exit records can be stored in a [`PhotonDatabase`] and
//! re-tallied for perturbed optical properties by the
//! [`PhotonDatabasePostProcessor`].

mod absorption;
mod bounding_box;
mod error;
mod fast_rng;
mod input;
mod optical_properties;
mod optics;
mod output;
mod phase_function;
mod random;
mod ranges;
mod region;
mod settings;
mod simulation;
mod source;
mod stats;
mod surface;

pub mod detectors;
pub mod photon;
pub mod pmc;
pub mod tissue;
pub mod virtual_boundary;

pub use absorption::{AbsorptionWeightingType, CollisionOutcome};
pub use bounding_box::BoundingBox;
pub use detectors::{DetectorInput, DetectorKind, DetectorResult, PerturbationInput};
pub use error::{Result, TurbidError};
pub use fast_rng::FastRng;
pub use input::SimulationInput;
pub use optical_properties::OpticalProperties;
pub use optics::{fresnel, reflect, refract, specular_reflectance};
pub use output::SimulationOutput;
pub use phase_function::{rotate_direction, sample_cos_theta, scatter, PhaseFunctionType};
pub use photon::{CollisionInfo, Photon, PhotonDataPoint, PhotonEvent, PhotonStatus, SubRegionCollisionInfo};
pub use pmc::{PerturbationWeighting, PhotonDatabase, PhotonDatabasePostProcessor};
pub use random::{RandomNumberGeneratorType, SimulationRng};
pub use ranges::DoubleRange;
pub use region::{RegionShape, TissueRegion};
pub use settings::{DatabaseType, SimulationOptions};
pub use simulation::{CancellationToken, MonteCarloSimulation};
pub use source::{Launch, Source, SourceInput};
pub use stats::{AngularDistribution, BeamProfile};
pub use surface::Surface;
pub use tissue::{Tissue, TissueInput};
pub use virtual_boundary::{VirtualBoundaryController, VirtualBoundaryType};
