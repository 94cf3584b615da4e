// Perturbation Monte Carlo: stored photon databases and their reweighting
pub mod database;
pub mod perturbation;
pub mod post_processor;

pub use database::{DatabaseHeader, PhotonDatabase, PhotonDatabaseRecord, DATABASE_FORMAT_VERSION};
pub use perturbation::PerturbationWeighting;
pub use post_processor::PhotonDatabasePostProcessor;
