use nalgebra::Vector3;

/// Fresnel reflectance for unpolarised light going from index `n1` to `n2`.
///
/// `cos_i` is the cosine of the angle of incidence (taken as |cos|).
/// Returns `(reflectance, cos_t)` where `cos_t` is the cosine of the
/// transmitted angle; total internal reflection gives `(1.0, 0.0)`.
pub fn fresnel(n1: f64, n2: f64, cos_i: f64) -> (f64, f64) {
    let cos_i = cos_i.abs().min(1.0);
    if n1 == n2 {
        return (0.0, cos_i);
    }
    if cos_i > 1.0 - 1e-12 {
        // normal incidence
        let r = (n1 - n2) / (n1 + n2);
        return (r * r, cos_i);
    }
    if cos_i < 1e-6 {
        // grazing incidence
        return (1.0, 0.0);
    }
    let sin_i = (1.0 - cos_i * cos_i).sqrt();
    let sin_t = n1 / n2 * sin_i;
    if sin_t >= 1.0 {
        return (1.0, 0.0);
    }
    let cos_t = (1.0 - sin_t * sin_t).sqrt();
    let cos_ap = cos_i * cos_t - sin_i * sin_t; // cos(a + t)
    let cos_am = cos_i * cos_t + sin_i * sin_t; // cos(a - t)
    let sin_ap = sin_i * cos_t + cos_i * sin_t;
    let sin_am = sin_i * cos_t - cos_i * sin_t;
    let r = 0.5 * sin_am * sin_am * (cos_am * cos_am + cos_ap * cos_ap) / (sin_ap * sin_ap * cos_am * cos_am);
    (r.clamp(0.0, 1.0), cos_t)
}

/// Specular reflectance at normal incidence.
pub fn specular_reflectance(n1: f64, n2: f64) -> f64 {
    let r = (n1 - n2) / (n1 + n2);
    r * r
}

/// Mirror `d` about the plane with unit normal `n`.
pub fn reflect(d: &Vector3<f64>, n: &Vector3<f64>) -> Vector3<f64> {
    d - n * (2.0 * d.dot(n))
}

/// Bend `d` through a boundary with unit normal `n` oriented along the
/// direction of travel, given the index ratio `eta = n1 / n2` and the
/// transmitted cosine from [`fresnel`].
pub fn refract(d: &Vector3<f64>, n: &Vector3<f64>, eta: f64, cos_t: f64) -> Vector3<f64> {
    let cos_i = d.dot(n);
    let t = d * eta + n * (cos_t - eta * cos_i);
    t.try_normalize(0.0).unwrap_or(*d)
}
