use crate::random::SimulationRng;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Angular distribution of launched photons
#[derive(Debug, Clone, PartialEq)]
pub enum AngularDistribution {
    Isotropic,
    Monodirectional { reference_uvw: Vector3<f64> },
    /// Cosine-weighted over the +z hemisphere
    Lambertian,
}

impl AngularDistribution {
    /// Monodirectional distribution along (u, v, w); `None` for a zero vector.
    pub fn new_monodirectional(u: f64, v: f64, w: f64) -> Option<Self> {
        Vector3::new(u, v, w)
            .try_normalize(0.0)
            .map(|reference_uvw| Self::Monodirectional { reference_uvw })
    }

    /// Sample a unit direction from this distribution
    pub fn sample(&self, rng: &mut SimulationRng) -> Vector3<f64> {
        match self {
            AngularDistribution::Isotropic => {
                let mu = 2.0 * rng.uniform() - 1.0;
                let phi = 2.0 * PI * rng.uniform();
                let sin_theta = (1.0 - mu * mu).max(0.0).sqrt();
                Vector3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), mu)
            }
            AngularDistribution::Monodirectional { reference_uvw } => *reference_uvw,
            AngularDistribution::Lambertian => {
                // cos(theta) = sqrt(xi) gives a cosine-weighted hemisphere
                let mu = rng.uniform().sqrt();
                let phi = 2.0 * PI * rng.uniform();
                let sin_theta = (1.0 - mu * mu).max(0.0).sqrt();
                Vector3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), mu)
            }
        }
    }
}

/// Radial intensity profile of an extended beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BeamProfile {
    Flat,
    /// Gaussian truncated to the beam's radii; `fwhm` in mm
    Gaussian { fwhm: f64 },
}

impl BeamProfile {
    /// Sample a radius in [inner_radius, outer_radius] from the profile.
    pub fn sample_radius(&self, inner_radius: f64, outer_radius: f64, rng: &mut SimulationRng) -> f64 {
        match self {
            BeamProfile::Flat => {
                let ri2 = inner_radius * inner_radius;
                let ro2 = outer_radius * outer_radius;
                (ri2 + rng.uniform() * (ro2 - ri2)).sqrt()
            }
            BeamProfile::Gaussian { fwhm } => {
                // inverse CDF of the 2-D Gaussian radius, truncated to the annulus
                let sigma = fwhm / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt());
                let two_sigma2 = 2.0 * sigma * sigma;
                let a = (-inner_radius * inner_radius / two_sigma2).exp();
                let b = (-outer_radius * outer_radius / two_sigma2).exp();
                let u = a - rng.uniform() * (a - b);
                if u <= 0.0 {
                    outer_radius
                } else {
                    (-two_sigma2 * u.ln()).sqrt().clamp(inner_radius, outer_radius)
                }
            }
        }
    }
}

/// Uniform point on a circle of radius `r` in the z = 0 plane.
pub fn sample_on_circle(r: f64, rng: &mut SimulationRng) -> Vector3<f64> {
    let phi = 2.0 * PI * rng.uniform();
    Vector3::new(r * phi.cos(), r * phi.sin(), 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RandomNumberGeneratorType;

    fn rng() -> SimulationRng {
        SimulationRng::for_stream(RandomNumberGeneratorType::Pcg, 1, 0)
    }

    #[test]
    fn test_monodirectional_distribution() {
        let mono = AngularDistribution::new_monodirectional(0.0, 0.0, 2.0).unwrap();
        assert_eq!(mono.sample(&mut rng()), Vector3::z());
        assert!(AngularDistribution::new_monodirectional(0.0, 0.0, 0.0).is_none());
    }

    #[test]
    fn test_isotropic_randomness() {
        let iso = AngularDistribution::Isotropic;
        let mut rng = rng();
        let samples: Vec<Vector3<f64>> = (0..1000).map(|_| iso.sample(&mut rng)).collect();
        assert!(samples.iter().all(|s| (s.norm() - 1.0).abs() < 1e-10));
        let mean_z: f64 = samples.iter().map(|s| s.z).sum::<f64>() / 1000.0;
        assert!(mean_z.abs() < 0.1);
        assert!(!samples.iter().all(|s| *s == samples[0]), "Isotropic samples should vary");
    }

    #[test]
    fn test_lambertian_points_into_tissue() {
        let mut rng = rng();
        let n = 20000;
        let mean_mu: f64 = (0..n)
            .map(|_| AngularDistribution::Lambertian.sample(&mut rng).z)
            .inspect(|mu| assert!(*mu >= 0.0))
            .sum::<f64>()
            / n as f64;
        // <cos theta> = 2/3 for a cosine-weighted hemisphere
        assert!((mean_mu - 2.0 / 3.0).abs() < 0.01, "mean cosine {}", mean_mu);
    }

    #[test]
    fn test_flat_beam_fills_annulus_uniformly() {
        let mut rng = rng();
        let n = 20000;
        let radii: Vec<f64> = (0..n).map(|_| BeamProfile::Flat.sample_radius(1.0, 2.0, &mut rng)).collect();
        assert!(radii.iter().all(|r| (1.0..=2.0).contains(r)));
        // area fraction inside r = 1.5 is (1.5^2 - 1) / (4 - 1)
        let inside = radii.iter().filter(|r| **r < 1.5).count() as f64 / n as f64;
        assert!((inside - 1.25 / 3.0).abs() < 0.02);
    }

    #[test]
    fn test_gaussian_beam_stays_within_radius() {
        let mut rng = rng();
        let beam = BeamProfile::Gaussian { fwhm: 1.0 };
        for _ in 0..1000 {
            let r = beam.sample_radius(0.0, 0.5, &mut rng);
            assert!((0.0..=0.5).contains(&r));
        }
    }

    #[test]
    fn test_send_sync_bounds() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<AngularDistribution>();
        assert_sync::<AngularDistribution>();
    }
}
