use crate::optical_properties::OpticalProperties;
use crate::random::SimulationRng;
use serde::{Deserialize, Serialize};

/// How absorption changes a photon's weight. One policy per simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AbsorptionWeightingType {
    /// Weight stays 1; each real collision is an absorption with probability mua/mut.
    Analog,
    /// Weight is multiplied by the albedo at every real collision.
    #[default]
    Discrete,
    /// Weight decays as exp(-mua s) along every sub-path.
    Continuous,
}

/// Result of a real collision under the active weighting policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionOutcome {
    /// Photon scatters on with `weight`; `absorbed` was deposited at the collision.
    Scattered { weight: f64, absorbed: f64 },
    /// Photon is absorbed and its full weight deposited.
    Absorbed { absorbed: f64 },
}

impl AbsorptionWeightingType {
    /// Weight left after travelling `distance` through a region.
    ///
    /// Returns `(new_weight, absorbed_along_path)`; only continuous weighting
    /// loses weight between collisions.
    #[inline]
    pub fn attenuate_along_path(&self, weight: f64, ops: &OpticalProperties, distance: f64) -> (f64, f64) {
        match self {
            AbsorptionWeightingType::Continuous if ops.mua > 0.0 => {
                let new_weight = weight * (-ops.mua * distance).exp();
                (new_weight, weight - new_weight)
            }
            _ => (weight, 0.0),
        }
    }

    /// Weight update at a real collision point.
    pub fn collide(&self, weight: f64, ops: &OpticalProperties, rng: &mut SimulationRng) -> CollisionOutcome {
        match self {
            AbsorptionWeightingType::Analog => {
                let mut_total = ops.mut_total();
                if mut_total > 0.0 && rng.uniform() < ops.mua / mut_total {
                    CollisionOutcome::Absorbed { absorbed: weight }
                } else {
                    CollisionOutcome::Scattered { weight, absorbed: 0.0 }
                }
            }
            AbsorptionWeightingType::Discrete => {
                let new_weight = weight * ops.albedo();
                CollisionOutcome::Scattered {
                    weight: new_weight,
                    absorbed: weight - new_weight,
                }
            }
            AbsorptionWeightingType::Continuous => CollisionOutcome::Scattered { weight, absorbed: 0.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RandomNumberGeneratorType;

    fn rng() -> SimulationRng {
        SimulationRng::for_stream(RandomNumberGeneratorType::MersenneTwister, 0, 0)
    }

    #[test]
    fn test_discrete_conserves_weight() {
        let ops = OpticalProperties::new(0.1, 0.9, 0.8, 1.4);
        match AbsorptionWeightingType::Discrete.collide(0.5, &ops, &mut rng()) {
            CollisionOutcome::Scattered { weight, absorbed } => {
                assert!((weight - 0.45).abs() < 1e-15);
                assert!((weight + absorbed - 0.5).abs() < 1e-15);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_continuous_only_attenuates_along_path() {
        let ops = OpticalProperties::new(0.5, 1.0, 0.8, 1.4);
        let (w, a) = AbsorptionWeightingType::Continuous.attenuate_along_path(1.0, &ops, 2.0);
        assert!((w - (-1.0f64).exp()).abs() < 1e-15);
        assert!((w + a - 1.0).abs() < 1e-15);
        let (w, a) = AbsorptionWeightingType::Discrete.attenuate_along_path(1.0, &ops, 2.0);
        assert_eq!((w, a), (1.0, 0.0));
        assert_eq!(
            AbsorptionWeightingType::Continuous.collide(0.3, &ops, &mut rng()),
            CollisionOutcome::Scattered { weight: 0.3, absorbed: 0.0 }
        );
    }

    #[test]
    fn test_analog_absorption_fraction() {
        let ops = OpticalProperties::new(0.25, 0.75, 0.8, 1.4);
        let mut rng = rng();
        let n = 20000;
        let absorbed = (0..n)
            .filter(|_| matches!(AbsorptionWeightingType::Analog.collide(1.0, &ops, &mut rng), CollisionOutcome::Absorbed { .. }))
            .count();
        let fraction = absorbed as f64 / n as f64;
        assert!((fraction - 0.25).abs() < 0.02, "fraction {}", fraction);
    }
}
