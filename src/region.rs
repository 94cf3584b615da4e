use crate::bounding_box::BoundingBox;
use crate::error::{Result, TurbidError};
use crate::optical_properties::OpticalProperties;
use crate::surface::Surface;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Slack used when testing whether a boundary point satisfies the other
/// bounding surfaces of a region.
const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// Geometry of one tissue region. Lengths in mm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegionShape {
    /// Slab z_start <= z <= z_stop, unbounded in x and y. Either end may be
    /// infinite, written as "-inf" / "inf" in JSON.
    Layer {
        #[serde(with = "extended_f64")]
        z_start: f64,
        #[serde(with = "extended_f64")]
        z_stop: f64,
    },
    /// Axis-aligned box
    Voxel { x: [f64; 2], y: [f64; 2], z: [f64; 2] },
    /// Axis-aligned ellipsoid
    Ellipsoid { center: [f64; 3], dx: f64, dy: f64, dz: f64 },
    /// Infinite circular cylinder along `axis`
    InfiniteCylinder { center: [f64; 3], axis: [f64; 3], radius: f64 },
    /// Finite cylinder along z, capped at center.z ± height/2
    Cylinder { center: [f64; 3], radius: f64, height: f64 },
}

impl RegionShape {
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(TurbidError::InvalidTissue(msg));
        match self {
            RegionShape::Layer { z_start, z_stop } => {
                if z_start.is_nan() || z_stop.is_nan() || z_start >= z_stop {
                    return bad(format!("layer needs z_start < z_stop, got [{}, {}]", z_start, z_stop));
                }
            }
            RegionShape::Voxel { x, y, z } => {
                for (name, r) in [("x", x), ("y", y), ("z", z)] {
                    if !(r[0].is_finite() && r[1].is_finite() && r[0] < r[1]) {
                        return bad(format!("voxel {} range must be finite and increasing, got {:?}", name, r));
                    }
                }
            }
            RegionShape::Ellipsoid { center, dx, dy, dz } => {
                if !center.iter().all(|c| c.is_finite()) {
                    return bad("ellipsoid center must be finite".to_string());
                }
                if !(*dx > 0.0 && *dy > 0.0 && *dz > 0.0) {
                    return bad(format!("ellipsoid semi-axes must be positive, got ({}, {}, {})", dx, dy, dz));
                }
            }
            RegionShape::InfiniteCylinder { center, axis, radius } => {
                if !center.iter().all(|c| c.is_finite()) {
                    return bad("cylinder center must be finite".to_string());
                }
                let len = Vector3::from(*axis).norm();
                if !(len.is_finite() && len > 0.0) {
                    return bad(format!("cylinder axis must be a non-zero vector, got {:?}", axis));
                }
                if !(*radius > 0.0) {
                    return bad(format!("cylinder radius must be positive, got {}", radius));
                }
            }
            RegionShape::Cylinder { center, radius, height } => {
                if !center.iter().all(|c| c.is_finite()) {
                    return bad("cylinder center must be finite".to_string());
                }
                if !(*radius > 0.0 && *height > 0.0) {
                    return bad(format!("cylinder radius and height must be positive, got {} and {}", radius, height));
                }
            }
        }
        Ok(())
    }

    /// Bounding surfaces whose inside halves intersect to this shape.
    fn surfaces(&self) -> Vec<Surface> {
        match self {
            RegionShape::Layer { z_start, z_stop } => {
                let mut surfaces = Vec::with_capacity(2);
                if z_start.is_finite() {
                    surfaces.push(Surface::z_plane(*z_start, false));
                }
                if z_stop.is_finite() {
                    surfaces.push(Surface::z_plane(*z_stop, true));
                }
                surfaces
            }
            RegionShape::Voxel { x, y, z } => {
                let mut surfaces = Vec::with_capacity(6);
                for (axis, range) in [x, y, z].iter().enumerate() {
                    surfaces.push(Surface::axis_plane(axis, range[0], false));
                    surfaces.push(Surface::axis_plane(axis, range[1], true));
                }
                surfaces
            }
            RegionShape::Ellipsoid { center, dx, dy, dz } => vec![Surface::Ellipsoid {
                center: Vector3::from(*center),
                semi_axes: Vector3::new(*dx, *dy, *dz),
            }],
            RegionShape::InfiniteCylinder { center, axis, radius } => vec![Surface::Cylinder {
                axis: Vector3::from(*axis).normalize(),
                origin: Vector3::from(*center),
                radius: *radius,
            }],
            RegionShape::Cylinder { center, radius, height } => vec![
                Surface::Cylinder {
                    axis: Vector3::z(),
                    origin: Vector3::from(*center),
                    radius: *radius,
                },
                Surface::z_plane(center[2] - 0.5 * height, false),
                Surface::z_plane(center[2] + 0.5 * height, true),
            ],
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            RegionShape::Layer { z_start, z_stop } => BoundingBox::new(
                [f64::NEG_INFINITY, f64::NEG_INFINITY, *z_start],
                [f64::INFINITY, f64::INFINITY, *z_stop],
            ),
            RegionShape::Voxel { x, y, z } => BoundingBox::new([x[0], y[0], z[0]], [x[1], y[1], z[1]]),
            RegionShape::Ellipsoid { center, dx, dy, dz } => BoundingBox::new(
                [center[0] - dx, center[1] - dy, center[2] - dz],
                [center[0] + dx, center[1] + dy, center[2] + dz],
            ),
            RegionShape::InfiniteCylinder { center, axis, radius } => {
                let a = Vector3::from(*axis).normalize();
                let mut lower = [f64::NEG_INFINITY; 3];
                let mut upper = [f64::INFINITY; 3];
                // only axis-aligned cylinders get finite bounds across the axis
                for i in 0..3 {
                    if a[i].abs() < 1e-12 {
                        lower[i] = center[i] - radius;
                        upper[i] = center[i] + radius;
                    }
                }
                if (0..3).filter(|&i| a[i].abs() >= 1e-12).count() > 1 {
                    return BoundingBox::infinite();
                }
                BoundingBox::new(lower, upper)
            }
            RegionShape::Cylinder { center, radius, height } => BoundingBox::new(
                [center[0] - radius, center[1] - radius, center[2] - 0.5 * height],
                [center[0] + radius, center[1] + radius, center[2] + 0.5 * height],
            ),
        }
    }

    pub fn is_layer(&self) -> bool {
        matches!(self, RegionShape::Layer { .. })
    }
}

/// JSON has no infinities, so they travel as strings.
mod extended_f64 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_infinite() {
            let text = if *value > 0.0 { "inf" } else { "-inf" };
            Repr::Text(text.to_string()).serialize(serializer)
        } else {
            Repr::Number(*value).serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(t) => match t.as_str() {
                "inf" | "Infinity" => Ok(f64::INFINITY),
                "-inf" | "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(serde::de::Error::custom(format!("expected a number or +/-inf, got '{}'", other))),
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RegionSpec {
    shape: RegionShape,
    ops: OpticalProperties,
}

/// A tissue region: a closed primitive shape filled with one set of optical properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RegionSpec", into = "RegionSpec")]
pub struct TissueRegion {
    shape: RegionShape,
    pub ops: OpticalProperties,
    surfaces: Vec<Surface>,
}

impl From<RegionSpec> for TissueRegion {
    fn from(spec: RegionSpec) -> Self {
        TissueRegion::new(spec.shape, spec.ops)
    }
}

impl From<TissueRegion> for RegionSpec {
    fn from(region: TissueRegion) -> Self {
        RegionSpec {
            shape: region.shape,
            ops: region.ops,
        }
    }
}

impl TissueRegion {
    pub fn new(shape: RegionShape, ops: OpticalProperties) -> Self {
        let surfaces = shape.surfaces();
        Self { shape, ops, surfaces }
    }

    pub fn layer(z_start: f64, z_stop: f64, ops: OpticalProperties) -> Self {
        Self::new(RegionShape::Layer { z_start, z_stop }, ops)
    }

    pub fn shape(&self) -> &RegionShape {
        &self.shape
    }

    pub fn validate(&self) -> Result<()> {
        self.shape.validate()?;
        self.ops.validate()
    }

    /// Closed containment: points on the boundary count as inside.
    pub fn contains(&self, p: &Vector3<f64>) -> bool {
        match &self.shape {
            RegionShape::Layer { z_start, z_stop } => p.z >= *z_start && p.z <= *z_stop,
            _ => self.surfaces.iter().all(|s| s.evaluate(p) <= 0.0),
        }
    }

    /// Distance along `d` from `p` to the region's boundary, whether `p` is
    /// inside (exit) or outside (entry). `None` means no crossing.
    pub fn ray_intersect(&self, p: &Vector3<f64>, d: &Vector3<f64>) -> Option<f64> {
        match &self.shape {
            RegionShape::Layer { z_start, z_stop } => {
                // layer planes are crossed in the direction of travel only; a
                // photon sitting on a plane and heading out is at distance 0
                let plane = if d.z > 0.0 {
                    *z_stop
                } else if d.z < 0.0 {
                    *z_start
                } else {
                    return None;
                };
                if !plane.is_finite() {
                    return None;
                }
                Some(((plane - p.z) / d.z).max(0.0))
            }
            _ => {
                let mut nearest: Option<f64> = None;
                for (i, surface) in self.surfaces.iter().enumerate() {
                    for t in surface.intersections(p, d).iter().flatten() {
                        let q = p + d * *t;
                        let on_boundary = self
                            .surfaces
                            .iter()
                            .enumerate()
                            .all(|(j, other)| j == i || other.evaluate(&q) <= BOUNDARY_TOLERANCE);
                        if on_boundary {
                            if nearest.map_or(true, |best| *t < best) {
                                nearest = Some(*t);
                            }
                            break;
                        }
                    }
                }
                nearest
            }
        }
    }

    /// Outward unit normal at a boundary point.
    pub fn surface_normal(&self, p: &Vector3<f64>) -> Vector3<f64> {
        match &self.shape {
            RegionShape::Layer { z_start, z_stop } => {
                if (p.z - z_start).abs() < (p.z - z_stop).abs() {
                    -Vector3::z()
                } else {
                    Vector3::z()
                }
            }
            _ => self
                .surfaces
                .iter()
                .min_by(|a, b| a.evaluate(p).abs().total_cmp(&b.evaluate(p).abs()))
                .map(|s| s.normal(p))
                .unwrap_or_else(Vector3::z),
        }
    }
}
