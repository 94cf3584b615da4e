use crate::detectors::{DetectorInput, DetectorKind};
use crate::error::{Result, TurbidError};
use crate::ranges::DoubleRange;
use crate::settings::SimulationOptions;
use crate::source::SourceInput;
use crate::tissue::TissueInput;
use serde::{Deserialize, Serialize};

/// Everything needed to run one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationInput {
    /// Label carried into the output
    #[serde(default)]
    pub output_name: String,
    /// Number of photons to launch
    pub n: u64,
    #[serde(default)]
    pub options: SimulationOptions,
    #[serde(default)]
    pub source: SourceInput,
    #[serde(default)]
    pub tissue: TissueInput,
    #[serde(default)]
    pub detectors: Vec<DetectorInput>,
}

impl Default for SimulationInput {
    /// One semi-infinite-like layer lit by a normally incident pencil beam.
    fn default() -> Self {
        Self {
            output_name: "results".to_string(),
            n: 100,
            options: SimulationOptions::default(),
            source: SourceInput::default(),
            tissue: TissueInput::default(),
            detectors: vec![
                DetectorInput::new(DetectorKind::ROfRho {
                    rho: DoubleRange::new(0.0, 10.0, 101),
                }),
                DetectorInput::new(DetectorKind::RDiffuse),
                DetectorInput::new(DetectorKind::ATotal),
                DetectorInput::new(DetectorKind::TDiffuse),
            ],
        }
    }
}

impl SimulationInput {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that do not need the built tissue.
    pub fn validate(&self) -> Result<()> {
        if self.n == 0 {
            return Err(TurbidError::InvalidInput("number of photons must be positive".to_string()));
        }
        self.options.validate()
    }
}
