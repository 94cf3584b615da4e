use crate::detectors::DetectorResult;
use crate::photon::PhotonStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Results of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub output_name: String,
    /// Photons actually launched; fewer than requested after cancellation.
    pub photons_launched: u64,
    pub detectors: Vec<DetectorResult>,
    /// Diffuse reflectance
    pub rd: f64,
    /// Diffuse transmittance
    pub td: f64,
    /// Total absorbed fraction
    pub atot: f64,
    /// Specular reflectance at launch
    pub rspec: f64,
    /// Weight lost through a bounding volume
    pub bounding_volume_loss: f64,
    /// Terminated photons per final status
    pub status_counts: BTreeMap<PhotonStatus, u64>,
}

impl SimulationOutput {
    /// Result of the detector named `name`.
    pub fn detector(&self, name: &str) -> Option<&DetectorResult> {
        self.detectors.iter().find(|d| d.name == name)
    }

    pub fn status_count(&self, status: PhotonStatus) -> u64 {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    /// Rd + Td + Atot + Rspec + bounding loss; 1 up to roulette noise.
    pub fn total_weight(&self) -> f64 {
        self.rd + self.td + self.atot + self.rspec + self.bounding_volume_loss
    }

    pub fn to_json_string(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for SimulationOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Simulation: {}", self.output_name)?;
        writeln!(f, "  Photons launched: {}", self.photons_launched)?;
        writeln!(f, "  Rd: {:.6}", self.rd)?;
        writeln!(f, "  Td: {:.6}", self.td)?;
        writeln!(f, "  Atot: {:.6}", self.atot)?;
        writeln!(f, "  Rspec: {:.6}", self.rspec)?;
        if self.bounding_volume_loss > 0.0 {
            writeln!(f, "  Bounding volume loss: {:.6}", self.bounding_volume_loss)?;
        }
        for (status, count) in &self.status_counts {
            writeln!(f, "  {:?}: {}", status, count)?;
        }
        for detector in &self.detectors {
            writeln!(f, "{}", detector)?;
        }
        Ok(())
    }
}
