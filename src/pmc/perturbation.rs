use crate::error::{Result, TurbidError};
use crate::optical_properties::OpticalProperties;
use crate::photon::CollisionInfo;

/// Likelihood-ratio reweighting of recorded photon paths.
///
/// For every perturbed region r with c_r collisions and path length L_r the
/// weight of a recorded photon is multiplied by
///
/// ```text
/// (mus'_r / mus_r)^c_r * exp(-(mut'_r - mut_r) * L_r)
/// ```
///
/// which holds for analog, discrete and continuous weighting alike.
/// Regions not listed are left unperturbed.
#[derive(Debug, Clone, PartialEq)]
pub struct PerturbationWeighting {
    reference: Vec<OpticalProperties>,
    perturbed: Vec<OpticalProperties>,
    regions: Vec<usize>,
}

impl PerturbationWeighting {
    /// `reference` and `perturbed` are indexed by tissue region; `regions`
    /// lists the regions whose properties are perturbed.
    pub fn new(reference: Vec<OpticalProperties>, perturbed: Vec<OpticalProperties>, regions: Vec<usize>) -> Result<Self> {
        if reference.len() != perturbed.len() {
            return Err(TurbidError::InvalidInput(format!(
                "perturbed optical properties list has {} entries but the tissue has {} regions",
                perturbed.len(),
                reference.len()
            )));
        }
        for ops in &perturbed {
            ops.validate()?;
        }
        if let Some(bad) = regions.iter().find(|r| **r >= reference.len()) {
            return Err(TurbidError::InvalidInput(format!("perturbed region {} does not exist", bad)));
        }
        Ok(Self {
            reference,
            perturbed,
            regions,
        })
    }

    pub fn reference(&self) -> &[OpticalProperties] {
        &self.reference
    }

    pub fn perturbed(&self) -> &[OpticalProperties] {
        &self.perturbed
    }

    pub fn regions(&self) -> &[usize] {
        &self.regions
    }

    /// Multiplicative weight factor for one photon.
    ///
    /// Equal reference and perturbed properties give exactly 1.
    pub fn factor(&self, info: &CollisionInfo) -> f64 {
        let mut factor = 1.0;
        for &r in &self.regions {
            let (reference, perturbed) = (&self.reference[r], &self.perturbed[r]);
            let sub = &info.regions[r];
            if sub.collision_count > 0 {
                let ratio = perturbed.mus / reference.mus;
                factor *= match i32::try_from(sub.collision_count) {
                    Ok(c) => ratio.powi(c),
                    Err(_) => ratio.powf(sub.collision_count as f64),
                };
            }
            factor *= (-(perturbed.mut_total() - reference.mut_total()) * sub.path_length).exp();
        }
        factor
    }

    /// d(factor)/d(mua) divided by the factor: -sum L_r over perturbed regions.
    pub fn dmua_log_derivative(&self, info: &CollisionInfo) -> f64 {
        self.regions.iter().map(|&r| -info.regions[r].path_length).sum()
    }

    /// d(factor)/d(mus) divided by the factor: sum (c_r / mus'_r - L_r).
    pub fn dmus_log_derivative(&self, info: &CollisionInfo) -> f64 {
        self.regions
            .iter()
            .map(|&r| {
                let sub = &info.regions[r];
                sub.collision_count as f64 / self.perturbed[r].mus - sub.path_length
            })
            .sum()
    }
}
