use nalgebra::Vector3;

/// Roots closer than this to the ray origin are treated as the surface the
/// photon is already sitting on.
pub const SURFACE_TOLERANCE: f64 = 1e-10;

/// A bounding surface of a tissue region.
///
/// Every surface splits space into an inside half (`evaluate < 0`) and an
/// outside half (`evaluate > 0`); a region is the intersection of the inside
/// halves of its surfaces.
#[derive(Debug, Clone, PartialEq)]
pub enum Surface {
    /// ax + by + cz - d = 0 with (a, b, c) a unit outward normal
    Plane { a: f64, b: f64, c: f64, d: f64 },
    /// Axis-aligned ellipsoid with semi-axes (dx, dy, dz)
    Ellipsoid { center: Vector3<f64>, semi_axes: Vector3<f64> },
    /// Infinite circular cylinder along a unit axis through `origin`
    Cylinder { axis: Vector3<f64>, origin: Vector3<f64>, radius: f64 },
}

impl Surface {
    /// Plane z = z0 whose inside is z > z0 (`upper = false`) or z < z0 (`upper = true`).
    pub fn z_plane(z0: f64, upper: bool) -> Self {
        Self::axis_plane(2, z0, upper)
    }

    /// Plane perpendicular to `axis` at `value`; `upper` marks the plane bounding
    /// the region from above along that axis.
    pub fn axis_plane(axis: usize, value: f64, upper: bool) -> Self {
        let sign = if upper { 1.0 } else { -1.0 };
        let mut n = [0.0; 3];
        n[axis] = sign;
        Surface::Plane {
            a: n[0],
            b: n[1],
            c: n[2],
            d: sign * value,
        }
    }

    /// Signed distance-like value: negative inside, positive outside.
    ///
    /// Exact for planes and cylinders; for ellipsoids it is scaled by the
    /// smallest semi-axis so values are comparable across surfaces.
    pub fn evaluate(&self, p: &Vector3<f64>) -> f64 {
        match self {
            Surface::Plane { a, b, c, d } => a * p.x + b * p.y + c * p.z - d,
            Surface::Ellipsoid { center, semi_axes } => {
                let q = (p - center).component_div(semi_axes);
                (q.norm() - 1.0) * semi_axes.min()
            }
            Surface::Cylinder { axis, origin, radius } => {
                let v = p - origin;
                let radial = v - axis * v.dot(axis);
                radial.norm() - radius
            }
        }
    }

    /// Outward unit normal at (or near) `p`.
    pub fn normal(&self, p: &Vector3<f64>) -> Vector3<f64> {
        match self {
            Surface::Plane { a, b, c, .. } => Vector3::new(*a, *b, *c),
            Surface::Ellipsoid { center, semi_axes } => {
                let q = p - center;
                let grad = Vector3::new(
                    q.x / (semi_axes.x * semi_axes.x),
                    q.y / (semi_axes.y * semi_axes.y),
                    q.z / (semi_axes.z * semi_axes.z),
                );
                grad.try_normalize(0.0).unwrap_or_else(|| Vector3::z())
            }
            Surface::Cylinder { axis, origin, .. } => {
                let v = p - origin;
                let radial = v - axis * v.dot(axis);
                radial.try_normalize(0.0).unwrap_or_else(|| Vector3::z())
            }
        }
    }

    /// All crossings of the ray with the surface beyond the tolerance, nearest first.
    pub fn intersections(&self, p: &Vector3<f64>, d: &Vector3<f64>) -> [Option<f64>; 2] {
        match self {
            Surface::Plane { a, b, c, d: offset } => {
                let denom = a * d.x + b * d.y + c * d.z;
                if denom.abs() < 1e-12 {
                    // parallel, no intersection
                    return [None, None];
                }
                let t = (offset - (a * p.x + b * p.y + c * p.z)) / denom;
                [positive(t), None]
            }
            Surface::Ellipsoid { center, semi_axes } => {
                let o = (p - center).component_div(semi_axes);
                let v = d.component_div(semi_axes);
                solve_quadratic(v.dot(&v), 2.0 * o.dot(&v), o.dot(&o) - 1.0)
            }
            Surface::Cylinder { axis, origin, radius } => {
                // project out the axial component of both the ray and its origin
                let dir_perp = d - axis * d.dot(axis);
                let delta = p - origin;
                let m = delta - axis * delta.dot(axis);
                solve_quadratic(
                    dir_perp.dot(&dir_perp),
                    2.0 * dir_perp.dot(&m),
                    m.dot(&m) - radius * radius,
                )
            }
        }
    }

    /// Nearest crossing beyond the tolerance.
    pub fn distance_to_surface(&self, p: &Vector3<f64>, d: &Vector3<f64>) -> Option<f64> {
        self.intersections(p, d)[0]
    }
}

fn positive(t: f64) -> Option<f64> {
    if t > SURFACE_TOLERANCE && t.is_finite() {
        Some(t)
    } else {
        None
    }
}

/// Positive roots of a t^2 + b t + c = 0, nearest first.
fn solve_quadratic(a: f64, b: f64, c: f64) -> [Option<f64>; 2] {
    if a.abs() < 1e-12 {
        return [None, None];
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return [None, None];
    }
    let sqrt_disc = disc.sqrt();
    let t1 = (-b - sqrt_disc) / (2.0 * a);
    let t2 = (-b + sqrt_disc) / (2.0 * a);
    match (positive(t1), positive(t2)) {
        (Some(x), Some(y)) => [Some(x), Some(y)],
        (None, Some(y)) => [Some(y), None],
        (Some(x), None) => [Some(x), None],
        (None, None) => [None, None],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64, y: f64, z: f64) -> Vector3<f64> {
        Vector3::new(x, y, z)
    }

    #[test]
    fn test_plane_distance() {
        let plane = Surface::axis_plane(0, 5.0, true);
        assert_eq!(plane.distance_to_surface(&v(0.0, 0.0, 0.0), &v(1.0, 0.0, 0.0)), Some(5.0));
        assert_eq!(plane.distance_to_surface(&v(0.0, 0.0, 0.0), &v(-1.0, 0.0, 0.0)), None);
        assert_eq!(plane.distance_to_surface(&v(10.0, 0.0, 0.0), &v(-1.0, 0.0, 0.0)), Some(5.0));
        // parallel
        assert_eq!(plane.distance_to_surface(&v(0.0, 0.0, 0.0), &v(0.0, 1.0, 0.0)), None);
        // on the plane heading out
        assert_eq!(plane.distance_to_surface(&v(5.0, 0.0, 0.0), &v(1.0, 0.0, 0.0)), None);
        assert!(plane.evaluate(&v(4.0, 0.0, 0.0)) < 0.0);
        assert_eq!(plane.normal(&v(5.0, 1.0, 1.0)), v(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_lower_plane_inside_is_above() {
        let plane = Surface::z_plane(2.0, false);
        assert!(plane.evaluate(&v(0.0, 0.0, 3.0)) < 0.0);
        assert!(plane.evaluate(&v(0.0, 0.0, 1.0)) > 0.0);
        assert_eq!(plane.normal(&v(0.0, 0.0, 2.0)), v(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_sphere_distance() {
        let sphere = Surface::Ellipsoid {
            center: v(0.0, 0.0, 0.0),
            semi_axes: v(1.0, 1.0, 1.0),
        };
        let d = sphere.distance_to_surface(&v(2.0, 0.0, 0.0), &v(-1.0, 0.0, 0.0));
        assert!((d.unwrap() - 1.0).abs() < 1e-10);
        let d2 = sphere.distance_to_surface(&v(0.0, 0.0, 0.0), &v(1.0, 0.0, 0.0));
        assert!((d2.unwrap() - 1.0).abs() < 1e-10);
        assert_eq!(sphere.distance_to_surface(&v(2.0, 0.0, 0.0), &v(1.0, 0.0, 0.0)), None);
        assert_eq!(sphere.distance_to_surface(&v(1.0, 0.0, 0.0), &v(1.0, 0.0, 0.0)), None);
        let both = sphere.intersections(&v(-3.0, 0.0, 0.0), &v(1.0, 0.0, 0.0));
        assert!((both[0].unwrap() - 2.0).abs() < 1e-10);
        assert!((both[1].unwrap() - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_ellipsoid_normal() {
        let e = Surface::Ellipsoid {
            center: v(0.0, 0.0, 5.0),
            semi_axes: v(2.0, 1.0, 1.0),
        };
        let n = e.normal(&v(2.0, 0.0, 5.0));
        assert!((n - v(1.0, 0.0, 0.0)).norm() < 1e-12);
        let n = e.normal(&v(0.0, 0.0, 4.0));
        assert!((n - v(0.0, 0.0, -1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_cylinder_distance() {
        let cyl = Surface::Cylinder {
            axis: v(0.0, 0.0, 1.0),
            origin: v(0.0, 0.0, 0.0),
            radius: 1.0,
        };
        let d = cyl.distance_to_surface(&v(2.0, 0.0, 0.0), &v(-1.0, 0.0, 0.0));
        assert!((d.unwrap() - 1.0).abs() < 1e-10);
        let d3 = cyl.distance_to_surface(&v(0.0, 0.0, 0.0), &v(1.0, 0.0, 0.0));
        assert!((d3.unwrap() - 1.0).abs() < 1e-10);
        assert_eq!(cyl.distance_to_surface(&v(2.0, 0.0, 0.0), &v(1.0, 0.0, 0.0)), None);
        // along the axis never hits the wall
        assert_eq!(cyl.distance_to_surface(&v(0.0, 0.0, 0.0), &v(0.0, 0.0, 1.0)), None);
    }

    #[test]
    fn test_horizontal_cylinder() {
        let cyl = Surface::Cylinder {
            axis: v(0.0, 1.0, 0.0),
            origin: v(0.0, 0.0, 3.0),
            radius: 1.0,
        };
        let d = cyl.distance_to_surface(&v(0.0, 7.0, 0.0), &v(0.0, 0.0, 1.0));
        assert!((d.unwrap() - 2.0).abs() < 1e-10);
        let n = cyl.normal(&v(0.0, 7.0, 2.0));
        assert!((n - v(0.0, 0.0, -1.0)).norm() < 1e-12);
    }
}
