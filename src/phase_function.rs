use crate::random::SimulationRng;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Scattering phase function family used in every region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PhaseFunctionType {
    #[default]
    HenyeyGreenstein,
    /// Scatters straight on (g) or straight back, with probabilities (1 ± g)/2.
    Bidirectional,
}

/// Sample the cosine of the polar deflection angle for anisotropy `g`.
pub fn sample_cos_theta(phase: PhaseFunctionType, g: f64, rng: &mut SimulationRng) -> f64 {
    match phase {
        PhaseFunctionType::HenyeyGreenstein => {
            let xi = rng.uniform();
            if g == 0.0 {
                2.0 * xi - 1.0
            } else {
                let temp = (1.0 - g * g) / (1.0 - g + 2.0 * g * xi);
                ((1.0 + g * g - temp * temp) / (2.0 * g)).clamp(-1.0, 1.0)
            }
        }
        PhaseFunctionType::Bidirectional => {
            if rng.uniform() < 0.5 * (1.0 + g) {
                1.0
            } else {
                -1.0
            }
        }
    }
}

/// Rotate `direction` by polar angle acos(cos_theta) and azimuth `phi`.
///
/// Uses the local spherical frame of the current direction; close to the z
/// axis the frame is degenerate and the rotation is done about z directly.
pub fn rotate_direction(direction: &Vector3<f64>, cos_theta: f64, phi: f64) -> Vector3<f64> {
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (ux, uy, uz) = (direction.x, direction.y, direction.z);

    let rotated = if uz.abs() > 1.0 - 1e-10 {
        Vector3::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta * uz.signum())
    } else {
        let temp = (1.0 - uz * uz).sqrt();
        Vector3::new(
            sin_theta * (ux * uz * cos_phi - uy * sin_phi) / temp + ux * cos_theta,
            sin_theta * (uy * uz * cos_phi + ux * sin_phi) / temp + uy * cos_theta,
            -sin_theta * cos_phi * temp + uz * cos_theta,
        )
    };
    // keep |u| = 1 against drift over long histories
    rotated.normalize()
}

/// Scatter `direction` into a new direction for anisotropy `g`.
pub fn scatter(
    phase: PhaseFunctionType,
    direction: &Vector3<f64>,
    g: f64,
    rng: &mut SimulationRng,
) -> Vector3<f64> {
    let cos_theta = sample_cos_theta(phase, g, rng);
    let phi = 2.0 * PI * rng.uniform();
    rotate_direction(direction, cos_theta, phi)
}
