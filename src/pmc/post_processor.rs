use super::database::PhotonDatabase;
use crate::detectors::{Detector, DetectorInput, DetectorResult, PhotonExit};
use crate::error::{Result, TurbidError};
use crate::settings::DatabaseType;
use crate::virtual_boundary::VirtualBoundaryType;
use log::info;
use std::collections::HashSet;
use std::path::Path;

/// Re-tallies detectors from a stored photon database.
///
/// Perturbation detectors reweight every record by their perturbed optical
/// properties; plain surface detectors matching the database's surface are
/// tallied as recorded.
#[derive(Debug, Clone)]
pub struct PhotonDatabasePostProcessor {
    database: PhotonDatabase,
}

impl PhotonDatabasePostProcessor {
    pub fn new(database: PhotonDatabase) -> Self {
        Self { database }
    }

    /// Load the database of `database_type` from `dir`.
    pub fn from_dir(dir: &Path, database_type: DatabaseType) -> Result<Self> {
        Ok(Self::new(PhotonDatabase::read(dir, database_type)?))
    }

    pub fn database(&self) -> &PhotonDatabase {
        &self.database
    }

    fn check(&self, input: &DetectorInput) -> Result<()> {
        let boundary = input.kind.virtual_boundary();
        let fits = match self.database.database_type() {
            DatabaseType::DiffuseReflectance => matches!(
                boundary,
                VirtualBoundaryType::DiffuseReflectance
                    | VirtualBoundaryType::SurfaceFiber
                    | VirtualBoundaryType::PMCDiffuseReflectance
            ),
            DatabaseType::DiffuseTransmittance => boundary == VirtualBoundaryType::DiffuseTransmittance,
        };
        let reason = if !fits {
            format!("cannot be tallied from a {:?} database", self.database.database_type())
        } else if input.final_tissue_region_index.is_some() {
            "database records carry no final tissue region".to_string()
        } else {
            return Ok(());
        };
        Err(TurbidError::InvalidDetector {
            name: input.name(),
            reason,
        })
    }

    /// Tally `inputs` over every stored record and normalize by the photons
    /// launched in the original run.
    pub fn run(&self, inputs: &[DetectorInput]) -> Result<Vec<DetectorResult>> {
        let context = self.database.detector_context();
        let mut names = HashSet::new();
        let mut detectors = Vec::with_capacity(inputs.len());
        for input in inputs {
            self.check(input)?;
            if !names.insert(input.name()) {
                return Err(TurbidError::InvalidDetector {
                    name: input.name(),
                    reason: "detector names must be unique".to_string(),
                });
            }
            detectors.push(Detector::new(input, &context)?);
        }

        for (record, info) in self.database.iter() {
            let exit = PhotonExit {
                position: record.position,
                direction: record.direction,
                weight: record.weight,
                time: record.time,
                collision_info: info,
                final_tissue_region: None,
            };
            for detector in &mut detectors {
                detector.tally_exit(&exit);
                detector.commit_photon();
            }
        }

        let photons = self.database.header().photons_launched;
        info!(
            "post-processed {} database records for {} detectors ({} photons launched)",
            self.database.len(),
            detectors.len(),
            photons
        );
        Ok(detectors.iter().flat_map(|d| d.finalize(photons)).collect())
    }
}
