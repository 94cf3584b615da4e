use crate::error::{Result, TurbidError};
use crate::optics::{fresnel, refract};
use crate::photon::Photon;
use crate::random::SimulationRng;
use crate::stats::{sample_on_circle, AngularDistribution, BeamProfile};
use crate::tissue::Tissue;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Photon source as read from the simulation input.
///
/// A source whose initial region is the ambient medium above the tissue
/// launches onto the top surface; see [`Source::launch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceInput {
    DirectionalPoint {
        position: [f64; 3],
        direction: [f64; 3],
        initial_tissue_region_index: usize,
    },
    IsotropicPoint {
        position: [f64; 3],
        initial_tissue_region_index: usize,
    },
    /// Collimated beam over an annulus centred on `translation`
    DirectionalCircular {
        translation: [f64; 3],
        direction: [f64; 3],
        outer_radius: f64,
        inner_radius: f64,
        beam: BeamProfile,
        initial_tissue_region_index: usize,
    },
    /// Cosine-weighted directions over a flat disk centred on `translation`
    Lambertian {
        translation: [f64; 3],
        radius: f64,
        initial_tissue_region_index: usize,
    },
}

impl Default for SourceInput {
    fn default() -> Self {
        SourceInput::DirectionalPoint {
            position: [0.0, 0.0, 0.0],
            direction: [0.0, 0.0, 1.0],
            initial_tissue_region_index: 0,
        }
    }
}

impl SourceInput {
    pub fn initial_tissue_region_index(&self) -> usize {
        match self {
            SourceInput::DirectionalPoint { initial_tissue_region_index, .. }
            | SourceInput::IsotropicPoint { initial_tissue_region_index, .. }
            | SourceInput::DirectionalCircular { initial_tissue_region_index, .. }
            | SourceInput::Lambertian { initial_tissue_region_index, .. } => *initial_tissue_region_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Footprint {
    Point(Vector3<f64>),
    Annulus {
        center: Vector3<f64>,
        inner_radius: f64,
        outer_radius: f64,
        beam: BeamProfile,
    },
}

/// A validated source bound to one tissue.
#[derive(Debug, Clone)]
pub struct Source {
    footprint: Footprint,
    angle: AngularDistribution,
    initial_region: usize,
    /// Launch onto the top surface through the ambient medium
    from_ambient: bool,
}

/// A launched photon plus the weight specularly reflected at entry.
#[derive(Debug, Clone)]
pub struct Launch {
    pub photon: Photon,
    pub specular_reflectance: f64,
}

impl Source {
    pub fn new(input: &SourceInput, tissue: &Tissue) -> Result<Self> {
        let initial_region = input.initial_tissue_region_index();
        if initial_region >= tissue.num_regions() {
            return Err(TurbidError::InvalidSource(format!(
                "initial tissue region {} does not exist (tissue has {} regions)",
                initial_region,
                tissue.num_regions()
            )));
        }
        if initial_region == tissue.bottom_ambient_index() {
            return Err(TurbidError::InvalidSource(
                "photons cannot start in the ambient medium below the tissue".to_string(),
            ));
        }
        let direction = |d: &[f64; 3]| {
            AngularDistribution::new_monodirectional(d[0], d[1], d[2])
                .ok_or_else(|| TurbidError::InvalidSource("direction must be a non-zero vector".to_string()))
        };
        let radii = |inner: f64, outer: f64| {
            if inner >= 0.0 && outer > inner {
                Ok(())
            } else {
                Err(TurbidError::InvalidSource(format!(
                    "need 0 <= inner radius < outer radius, got {} and {}",
                    inner, outer
                )))
            }
        };
        let (footprint, angle) = match input {
            SourceInput::DirectionalPoint { position, direction: d, .. } => {
                (Footprint::Point(Vector3::from(*position)), direction(d)?)
            }
            SourceInput::IsotropicPoint { position, .. } => {
                (Footprint::Point(Vector3::from(*position)), AngularDistribution::Isotropic)
            }
            SourceInput::DirectionalCircular {
                translation,
                direction: d,
                outer_radius,
                inner_radius,
                beam,
                ..
            } => {
                radii(*inner_radius, *outer_radius)?;
                if let BeamProfile::Gaussian { fwhm } = beam {
                    if !(*fwhm > 0.0) {
                        return Err(TurbidError::InvalidSource(format!("beam FWHM must be positive, got {}", fwhm)));
                    }
                }
                let footprint = Footprint::Annulus {
                    center: Vector3::from(*translation),
                    inner_radius: *inner_radius,
                    outer_radius: *outer_radius,
                    beam: *beam,
                };
                (footprint, direction(d)?)
            }
            SourceInput::Lambertian { translation, radius, .. } => {
                radii(0.0, *radius)?;
                let footprint = Footprint::Annulus {
                    center: Vector3::from(*translation),
                    inner_radius: 0.0,
                    outer_radius: *radius,
                    beam: BeamProfile::Flat,
                };
                (footprint, AngularDistribution::Lambertian)
            }
        };

        let from_ambient = initial_region == tissue.top_ambient_index();
        if from_ambient {
            let heading_in = match &angle {
                AngularDistribution::Monodirectional { reference_uvw } => reference_uvw.z > 0.0,
                AngularDistribution::Lambertian => true,
                AngularDistribution::Isotropic => false,
            };
            if !heading_in {
                return Err(TurbidError::InvalidSource(
                    "a source in the ambient medium must point into the tissue (+z)".to_string(),
                ));
            }
        } else if let Footprint::Point(p) = &footprint {
            if !tissue.region(initial_region).contains(p) {
                return Err(TurbidError::InvalidSource(format!(
                    "source position {:?} is not inside region {}",
                    p, initial_region
                )));
            }
            // inclusions nested in the region own the points they contain;
            // on a shared plane the region being headed into wins
            let headings = match &angle {
                AngularDistribution::Monodirectional { reference_uvw } => vec![*reference_uvw],
                _ => vec![Vector3::z(), -Vector3::z()],
            };
            let resolved: Vec<usize> = headings.iter().map(|d| tissue.region_index_at(p, d)).collect();
            if !resolved.contains(&initial_region) {
                return Err(TurbidError::InvalidSource(format!(
                    "source position {:?} lies in region {}, not in region {}",
                    p, resolved[0], initial_region
                )));
            }
        }

        Ok(Self {
            footprint,
            angle,
            initial_region,
            from_ambient,
        })
    }

    /// Sample a photon.
    ///
    /// Photons entering from the ambient medium are placed on the top surface,
    /// refracted, and have the Fresnel reflectance removed from their weight.
    pub fn launch(&self, tissue: &Tissue, record_history: bool, rng: &mut SimulationRng) -> Launch {
        let mut position = match &self.footprint {
            Footprint::Point(p) => *p,
            Footprint::Annulus {
                center,
                inner_radius,
                outer_radius,
                beam,
            } => {
                let r = beam.sample_radius(*inner_radius, *outer_radius, rng);
                center + sample_on_circle(r, rng)
            }
        };
        let mut direction = self.angle.sample(rng);
        let mut weight = 1.0;
        let mut specular_reflectance = 0.0;
        let region = if self.from_ambient {
            position.z = tissue.top_surface_z();
            let n1 = tissue.region(tissue.top_ambient_index()).ops.n;
            let entered = tissue.region_index_at(&position, &direction);
            let n2 = tissue.region(entered).ops.n;
            let (r, cos_t) = fresnel(n1, n2, direction.z);
            if n1 != n2 {
                direction = refract(&direction, &Vector3::z(), n1 / n2, cos_t);
            }
            specular_reflectance = r;
            weight -= r;
            entered
        } else {
            self.initial_region
        };
        Launch {
            photon: Photon::new(position, direction, weight, region, tissue.num_regions(), record_history),
            specular_reflectance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optical_properties::OpticalProperties;
    use crate::random::RandomNumberGeneratorType;
    use crate::region::{RegionShape, TissueRegion};
    use crate::tissue::TissueInput;

    fn tissue() -> Tissue {
        TissueInput::single_layer(OpticalProperties::new(0.01, 1.0, 0.8, 1.4), 10.0)
            .build()
            .unwrap()
    }

    fn rng() -> SimulationRng {
        SimulationRng::for_stream(RandomNumberGeneratorType::MersenneTwister, 1, 0)
    }

    #[test]
    fn test_ambient_launch_removes_specular() {
        let tissue = tissue();
        let source = Source::new(&SourceInput::default(), &tissue).unwrap();
        let launch = source.launch(&tissue, false, &mut rng());
        let rspec = ((1.0 - 1.4) / (1.0 + 1.4) as f64).powi(2);
        assert!((launch.specular_reflectance - rspec).abs() < 1e-15);
        assert!((launch.photon.weight - (1.0 - rspec)).abs() < 1e-15);
        assert_eq!(launch.photon.region, 1);
        assert!((launch.photon.direction - Vector3::z()).norm() < 1e-15);
    }

    #[test]
    fn test_point_source_inside_tissue() {
        let tissue = tissue();
        let input = SourceInput::DirectionalPoint {
            position: [0.0, 0.0, 0.0],
            direction: [0.0, 0.0, 1.0],
            initial_tissue_region_index: 1,
        };
        let source = Source::new(&input, &tissue).unwrap();
        let launch = source.launch(&tissue, false, &mut rng());
        assert_eq!(launch.specular_reflectance, 0.0);
        assert_eq!(launch.photon.weight, 1.0);
        assert_eq!(launch.photon.region, 1);
    }

    #[test]
    fn test_oblique_entry_is_refracted() {
        let tissue = tissue();
        let input = SourceInput::DirectionalPoint {
            position: [0.0, 0.0, 0.0],
            direction: [0.6, 0.0, 0.8],
            initial_tissue_region_index: 0,
        };
        let launch = Source::new(&input, &tissue).unwrap().launch(&tissue, false, &mut rng());
        let sin_t = (1.0 - launch.photon.direction.z.powi(2)).sqrt();
        assert!((1.4 * sin_t - 0.6).abs() < 1e-12);
        assert!(launch.specular_reflectance > 0.0);
    }

    #[test]
    fn test_circular_source_footprint() {
        let tissue = tissue();
        let input = SourceInput::DirectionalCircular {
            translation: [1.0, 0.0, 0.0],
            direction: [0.0, 0.0, 1.0],
            outer_radius: 2.0,
            inner_radius: 0.5,
            beam: BeamProfile::Flat,
            initial_tissue_region_index: 0,
        };
        let source = Source::new(&input, &tissue).unwrap();
        let mut rng = rng();
        for _ in 0..200 {
            let p = source.launch(&tissue, false, &mut rng).photon.position;
            let r = ((p.x - 1.0).powi(2) + p.y * p.y).sqrt();
            assert!(r >= 0.5 - 1e-12 && r <= 2.0 + 1e-12);
            assert_eq!(p.z, 0.0);
        }
    }

    #[test]
    fn test_invalid_sources() {
        let tissue = tissue();
        let bad_region = SourceInput::IsotropicPoint {
            position: [0.0, 0.0, 1.0],
            initial_tissue_region_index: 7,
        };
        assert!(Source::new(&bad_region, &tissue).is_err());
        let below = SourceInput::IsotropicPoint {
            position: [0.0, 0.0, 20.0],
            initial_tissue_region_index: 2,
        };
        assert!(Source::new(&below, &tissue).is_err());
        let isotropic_in_air = SourceInput::IsotropicPoint {
            position: [0.0, 0.0, -1.0],
            initial_tissue_region_index: 0,
        };
        assert!(Source::new(&isotropic_in_air, &tissue).is_err());
        let outside = SourceInput::IsotropicPoint {
            position: [0.0, 0.0, 20.0],
            initial_tissue_region_index: 1,
        };
        assert!(Source::new(&outside, &tissue).is_err());
        let zero = SourceInput::DirectionalPoint {
            position: [0.0, 0.0, 1.0],
            direction: [0.0, 0.0, 0.0],
            initial_tissue_region_index: 1,
        };
        assert!(matches!(Source::new(&zero, &tissue), Err(TurbidError::InvalidSource(_))));
    }

    #[test]
    fn test_point_source_inside_inclusion_must_name_it() {
        let ops = OpticalProperties::new(0.01, 1.0, 0.8, 1.4);
        let tissue = TissueInput::MultiLayerWithInclusions {
            layers: vec![
                TissueRegion::layer(f64::NEG_INFINITY, 0.0, OpticalProperties::air()),
                TissueRegion::layer(0.0, 10.0, ops),
                TissueRegion::layer(10.0, f64::INFINITY, OpticalProperties::air()),
            ],
            inclusions: vec![TissueRegion::new(
                RegionShape::Ellipsoid {
                    center: [0.0, 0.0, 5.0],
                    dx: 1.0,
                    dy: 1.0,
                    dz: 1.0,
                },
                ops,
            )],
        }
        .build()
        .unwrap();
        let at = |region: usize| SourceInput::DirectionalPoint {
            position: [0.0, 0.0, 5.0],
            direction: [0.0, 0.0, 1.0],
            initial_tissue_region_index: region,
        };
        assert!(matches!(Source::new(&at(1), &tissue), Err(TurbidError::InvalidSource(_))));
        let source = Source::new(&at(3), &tissue).unwrap();
        let launch = source.launch(&tissue, false, &mut rng());
        assert_eq!(launch.photon.region, 3);
        assert_eq!(tissue.region_index_at(&launch.photon.position, &launch.photon.direction), 3);

        // outside the inclusion the layer is still a valid start
        let beside = SourceInput::IsotropicPoint {
            position: [3.0, 0.0, 5.0],
            initial_tissue_region_index: 1,
        };
        assert!(Source::new(&beside, &tissue).is_ok());
    }
}
