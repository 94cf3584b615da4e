use crate::absorption::AbsorptionWeightingType;
use crate::error::{Result, TurbidError};
use crate::phase_function::PhaseFunctionType;
use crate::random::RandomNumberGeneratorType;
use serde::{Deserialize, Serialize};

/// Which photons are written to a pMC database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseType {
    /// Photons leaving through the top surface
    DiffuseReflectance,
    /// Photons leaving through the bottom surface
    DiffuseTransmittance,
}

impl DatabaseType {
    pub fn file_stem(&self) -> &'static str {
        match self {
            DatabaseType::DiffuseReflectance => "DiffuseReflectanceDatabase",
            DatabaseType::DiffuseTransmittance => "DiffuseTransmittanceDatabase",
        }
    }
}

/// Run-wide transport and bookkeeping options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    pub seed: u64,
    pub random_number_generator_type: RandomNumberGeneratorType,
    pub absorption_weighting_type: AbsorptionWeightingType,
    pub phase_function_type: PhaseFunctionType,
    /// Photons below this weight play Russian roulette; 0 disables it.
    pub russian_roulette_weight_threshold: f64,
    /// Probability of surviving a round of roulette.
    pub russian_roulette_survival_probability: f64,
    pub max_collisions: u64,
    /// Total path length (mm) after which a photon is killed.
    pub max_path_length: f64,
    /// Worker threads; 0 uses one per available core.
    pub number_of_workers: usize,
    pub databases: Vec<DatabaseType>,
    /// Record the full photon history even when no detector needs it.
    pub track_statistics: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            random_number_generator_type: RandomNumberGeneratorType::MersenneTwister,
            absorption_weighting_type: AbsorptionWeightingType::Discrete,
            phase_function_type: PhaseFunctionType::HenyeyGreenstein,
            russian_roulette_weight_threshold: 1e-4,
            russian_roulette_survival_probability: 0.1,
            max_collisions: 100_000_000,
            max_path_length: 2000.0,
            number_of_workers: 1,
            databases: Vec::new(),
            track_statistics: false,
        }
    }
}

impl SimulationOptions {
    pub fn validate(&self) -> Result<()> {
        let p = self.russian_roulette_survival_probability;
        if !(p > 0.0 && p <= 1.0) {
            return Err(TurbidError::InvalidInput(format!(
                "russian roulette survival probability must lie in (0, 1], got {}",
                p
            )));
        }
        let threshold = self.russian_roulette_weight_threshold;
        if !(threshold >= 0.0 && threshold / p <= 1.0) {
            return Err(TurbidError::InvalidInput(format!(
                "russian roulette threshold {} with survival probability {} can push weights above 1",
                threshold, p
            )));
        }
        if !(self.max_path_length > 0.0) {
            return Err(TurbidError::InvalidInput(format!(
                "maximum path length must be positive, got {}",
                self.max_path_length
            )));
        }
        if self.max_collisions == 0 {
            return Err(TurbidError::InvalidInput("maximum collisions must be positive".to_string()));
        }
        Ok(())
    }

    /// Worker count after resolving 0 to the available parallelism.
    pub fn resolved_workers(&self) -> usize {
        if self.number_of_workers == 0 {
            rayon::current_num_threads().max(1)
        } else {
            self.number_of_workers
        }
    }
}
