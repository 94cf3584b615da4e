use crate::absorption::AbsorptionWeightingType;
use crate::error::{Result, TurbidError};
use serde::{Deserialize, Serialize};

/// Bulk optical properties of one tissue region.
///
/// Lengths are in mm, so `mua` and `mus` are in 1/mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpticalProperties {
    /// Absorption coefficient
    pub mua: f64,
    /// Scattering coefficient
    pub mus: f64,
    /// Anisotropy factor
    pub g: f64,
    /// Refractive index
    pub n: f64,
}

impl OpticalProperties {
    pub fn new(mua: f64, mus: f64, g: f64, n: f64) -> Self {
        Self { mua, mus, g, n }
    }

    /// Build from the reduced scattering coefficient mus' = mus(1 - g).
    pub fn from_reduced_scattering(mua: f64, musp: f64, g: f64, n: f64) -> Self {
        let mus = if g < 1.0 { musp / (1.0 - g) } else { musp };
        Self { mua, mus, g, n }
    }

    /// Properties of the ambient medium above and below the tissue.
    pub fn air() -> Self {
        Self {
            mua: 0.0,
            mus: 1e-10,
            g: 1.0,
            n: 1.0,
        }
    }

    pub fn mut_total(&self) -> f64 {
        self.mua + self.mus
    }

    pub fn musp(&self) -> f64 {
        self.mus * (1.0 - self.g)
    }

    /// Single scattering albedo mus / (mua + mus)
    pub fn albedo(&self) -> f64 {
        let mut_total = self.mut_total();
        if mut_total > 0.0 {
            self.mus / mut_total
        } else {
            0.0
        }
    }

    /// Interaction coefficient used to sample free paths.
    ///
    /// Continuous weighting samples scattering-only paths and removes the
    /// absorbed fraction along the way.
    pub fn interaction_coefficient(&self, awt: AbsorptionWeightingType) -> f64 {
        match awt {
            AbsorptionWeightingType::Continuous => self.mus,
            AbsorptionWeightingType::Analog | AbsorptionWeightingType::Discrete => {
                self.mut_total()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |what: &str| Err(TurbidError::InvalidOpticalProperties(format!("{} ({:?})", what, self)));
        if !(self.mua.is_finite() && self.mus.is_finite() && self.g.is_finite() && self.n.is_finite()) {
            return bad("all coefficients must be finite");
        }
        if self.mua < 0.0 {
            return bad("mua must be non-negative");
        }
        if self.mus < 0.0 {
            return bad("mus must be non-negative");
        }
        if !(-1.0..=1.0).contains(&self.g) {
            return bad("g must lie in [-1, 1]");
        }
        if self.n <= 0.0 {
            return bad("n must be positive");
        }
        Ok(())
    }
}

impl Default for OpticalProperties {
    fn default() -> Self {
        Self {
            mua: 0.01,
            mus: 1.0,
            g: 0.8,
            n: 1.4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_typical_tissue() {
        assert!(OpticalProperties::new(0.01, 10.0, 0.9, 1.4).validate().is_ok());
        assert!(OpticalProperties::air().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(OpticalProperties::new(-0.1, 1.0, 0.8, 1.4).validate().is_err());
        assert!(OpticalProperties::new(0.1, -1.0, 0.8, 1.4).validate().is_err());
        assert!(OpticalProperties::new(0.1, 1.0, 1.2, 1.4).validate().is_err());
        assert!(OpticalProperties::new(0.1, 1.0, 0.8, 0.0).validate().is_err());
        assert!(OpticalProperties::new(f64::NAN, 1.0, 0.8, 1.4).validate().is_err());
    }

    #[test]
    fn test_reduced_scattering_round_trip() {
        let ops = OpticalProperties::from_reduced_scattering(0.01, 1.0, 0.8, 1.4);
        assert!((ops.mus - 5.0).abs() < 1e-12);
        assert!((ops.musp() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_interaction_coefficient() {
        let ops = OpticalProperties::new(0.1, 1.0, 0.8, 1.4);
        assert_eq!(ops.interaction_coefficient(AbsorptionWeightingType::Discrete), 1.1);
        assert_eq!(ops.interaction_coefficient(AbsorptionWeightingType::Analog), 1.1);
        assert_eq!(ops.interaction_coefficient(AbsorptionWeightingType::Continuous), 1.0);
    }
}
