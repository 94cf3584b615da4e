use super::histogram::Histogram;
use super::input::{DetectorInput, DetectorKind};
use super::result::DetectorResult;
use crate::absorption::AbsorptionWeightingType;
use crate::error::{Result, TurbidError};
use crate::optical_properties::OpticalProperties;
use crate::photon::{CollisionInfo, Photon, PhotonDataPoint, PhotonEvent, PhotonStatus, SPEED_OF_LIGHT};
use crate::pmc::PerturbationWeighting;
use crate::ranges::DoubleRange;
use crate::tissue::Tissue;
use crate::virtual_boundary::VirtualBoundaryType;
use log::warn;
use nalgebra::{Complex, Vector3};
use std::f64::consts::PI;

/// Tissue facts detectors depend on.
///
/// Built from a live tissue or from a pMC database header.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorContext {
    /// Indexed by tissue region
    pub optical_properties: Vec<OpticalProperties>,
    pub top_ambient_n: f64,
    pub bottom_ambient_n: f64,
    pub absorption_weighting_type: AbsorptionWeightingType,
}

impl DetectorContext {
    pub fn from_tissue(tissue: &Tissue, awt: AbsorptionWeightingType) -> Self {
        Self {
            optical_properties: tissue.optical_properties(),
            top_ambient_n: tissue.region(tissue.top_ambient_index()).ops.n,
            bottom_ambient_n: tissue.region(tissue.bottom_ambient_index()).ops.n,
            absorption_weighting_type: awt,
        }
    }

    pub fn num_regions(&self) -> usize {
        self.optical_properties.len()
    }
}

/// State of a photon as it leaves through a virtual boundary.
///
/// Live runs build it from the terminated photon; post-processing builds
/// it from a database record.
#[derive(Debug, Clone, Copy)]
pub struct PhotonExit<'a> {
    pub position: Vector3<f64>,
    pub direction: Vector3<f64>,
    pub weight: f64,
    pub time: f64,
    pub collision_info: &'a CollisionInfo,
    /// Last region inside the tissue, when known
    pub final_tissue_region: Option<usize>,
}

impl<'a> PhotonExit<'a> {
    pub fn from_photon(photon: &'a Photon) -> Self {
        Self {
            position: photon.position,
            direction: photon.direction,
            weight: photon.weight,
            time: photon.time,
            collision_info: &photon.collision_info,
            final_tissue_region: Some(photon.final_tissue_region()),
        }
    }

    pub fn rho(&self) -> f64 {
        self.position.x.hypot(self.position.y)
    }

    /// Polar angle of the exit direction from +z.
    pub fn angle(&self) -> f64 {
        self.direction.z.clamp(-1.0, 1.0).acos()
    }
}

/// One configured detector and its accumulators.
#[derive(Debug, Clone)]
pub struct Detector {
    name: String,
    kind: DetectorKind,
    final_tissue_region: Option<usize>,
    /// Smallest |uz| accepted by the numerical aperture
    min_abs_cos: Option<f64>,
    histogram: Histogram,
    fractional_mt: Option<Histogram>,
    perturbation: Option<PerturbationWeighting>,
    optical_properties: Vec<OpticalProperties>,
    awt: AbsorptionWeightingType,
    rejected: u64,
}

impl Detector {
    pub fn new(input: &DetectorInput, context: &DetectorContext) -> Result<Self> {
        let num_regions = context.num_regions();
        input.validate(num_regions)?;
        let name = input.name();
        let kind = input.kind.clone();

        let min_abs_cos = input.numerical_aperture.map(|na| {
            let n = match kind.virtual_boundary() {
                VirtualBoundaryType::DiffuseTransmittance => context.bottom_ambient_n,
                _ => context.top_ambient_n,
            };
            (1.0 - (na / n).powi(2)).max(0.0).sqrt()
        });

        let perturbation = match kind.perturbation() {
            Some(p) => Some(
                PerturbationWeighting::new(
                    context.optical_properties.clone(),
                    p.perturbed_ops.clone(),
                    p.perturbed_regions_indices.clone(),
                )
                .map_err(|e| TurbidError::InvalidDetector {
                    name: name.clone(),
                    reason: e.to_string(),
                })?,
            ),
            None => None,
        };

        let fractional_mt = match &kind {
            DetectorKind::ReflectedMTOfRhoAndSubregionHist { rho, mt, fractional_mt } => Some(Histogram::new(
                vec![rho.num_bins(), mt.num_bins(), num_regions, fractional_mt.num_bins()],
                input.tally_second_moment,
            )),
            _ => None,
        };

        Ok(Self {
            histogram: Histogram::new(kind.dims(num_regions), input.tally_second_moment),
            name,
            kind,
            final_tissue_region: input.final_tissue_region_index,
            min_abs_cos,
            fractional_mt,
            perturbation,
            optical_properties: context.optical_properties.clone(),
            awt: context.absorption_weighting_type,
            rejected: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &DetectorKind {
        &self.kind
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// pMC/dMC contributions dropped so far.
    pub fn rejected_contributions(&self) -> u64 {
        self.rejected
    }

    fn accepts(&self, exit: &PhotonExit) -> bool {
        if let Some(region) = self.final_tissue_region {
            if exit.final_tissue_region != Some(region) {
                return false;
            }
        }
        match self.min_abs_cos {
            Some(min) => exit.direction.z.abs() >= min,
            None => true,
        }
    }

    /// Tally a photon leaving through this detector's boundary.
    pub fn tally_exit(&mut self, exit: &PhotonExit) {
        if !self.accepts(exit) {
            return;
        }
        if self.perturbation.is_some() {
            self.tally_perturbed(exit);
            return;
        }
        let w = exit.weight;
        let h = &mut self.histogram;
        match &self.kind {
            DetectorKind::RDiffuse | DetectorKind::TDiffuse | DetectorKind::ATotalBoundingVolume => h.add(&[0], w),
            DetectorKind::SurfaceFiber { center, radius } => {
                let dx = exit.position.x - center[0];
                let dy = exit.position.y - center[1];
                if dx * dx + dy * dy <= radius * radius {
                    h.add(&[0], w);
                }
            }
            DetectorKind::ROfRho { rho } | DetectorKind::TOfRho { rho } => {
                if let Some(i) = rho.get_bin(exit.rho()) {
                    h.add(&[i], w);
                }
            }
            DetectorKind::ROfAngle { angle } | DetectorKind::TOfAngle { angle } => {
                if let Some(i) = angle.get_bin(exit.angle()) {
                    h.add(&[i], w);
                }
            }
            DetectorKind::ROfRhoAndAngle { rho, angle } | DetectorKind::TOfRhoAndAngle { rho, angle } => {
                if let (Some(i), Some(j)) = (rho.get_bin(exit.rho()), angle.get_bin(exit.angle())) {
                    h.add(&[i, j], w);
                }
            }
            DetectorKind::ROfRhoAndTime { rho, time } => {
                if let (Some(i), Some(j)) = (rho.get_bin(exit.rho()), time.get_bin(exit.time)) {
                    h.add(&[i, j], w);
                }
            }
            DetectorKind::ROfRhoAndOmega { rho, omega } => {
                if let Some(i) = rho.get_bin(exit.rho()) {
                    for (j, f) in omega.edges().into_iter().enumerate() {
                        h.add_complex(&[i, j], phasor(w, f * exit.time));
                    }
                }
            }
            DetectorKind::ROfXAndY { x, y } | DetectorKind::TOfXAndY { x, y } => {
                if let (Some(i), Some(j)) = (x.get_bin(exit.position.x), y.get_bin(exit.position.y)) {
                    h.add(&[i, j], w);
                }
            }
            DetectorKind::ROfFx { fx } => {
                for (i, f) in fx.edges().into_iter().enumerate() {
                    h.add_complex(&[i], phasor(w, f * exit.position.x));
                }
            }
            DetectorKind::ROfFxAndTime { fx, time } => {
                if let Some(j) = time.get_bin(exit.time) {
                    for (i, f) in fx.edges().into_iter().enumerate() {
                        h.add_complex(&[i, j], phasor(w, f * exit.position.x));
                    }
                }
            }
            _ => {}
        }
    }

    fn tally_perturbed(&mut self, exit: &PhotonExit) {
        let Some(pw) = &self.perturbation else {
            return;
        };
        let info = exit.collision_info;
        let factor = pw.factor(info);
        let value = match &self.kind {
            DetectorKind::DMCdROfRhodMua { .. } => exit.weight * factor * pw.dmua_log_derivative(info),
            DetectorKind::DMCdROfRhodMus { .. } => exit.weight * factor * pw.dmus_log_derivative(info),
            _ => exit.weight * factor,
        };
        // derivatives may be negative, perturbed weights may not
        let derivative = matches!(
            self.kind,
            DetectorKind::DMCdROfRhodMua { .. } | DetectorKind::DMCdROfRhodMus { .. }
        );
        if !factor.is_finite() || factor < 0.0 || !value.is_finite() || (!derivative && value < 0.0) {
            self.rejected += 1;
            return;
        }
        let h = &mut self.histogram;
        match &self.kind {
            DetectorKind::PMCROfRho { rho, .. }
            | DetectorKind::DMCdROfRhodMua { rho, .. }
            | DetectorKind::DMCdROfRhodMus { rho, .. } => {
                if let Some(i) = rho.get_bin(exit.rho()) {
                    h.add(&[i], value);
                }
            }
            DetectorKind::PMCROfRhoAndTime { rho, time, .. } => {
                if let (Some(i), Some(j)) = (rho.get_bin(exit.rho()), time.get_bin(exit.time)) {
                    h.add(&[i, j], value);
                }
            }
            DetectorKind::PMCROfFx { fx, .. } => {
                for (i, f) in fx.edges().into_iter().enumerate() {
                    h.add_complex(&[i], phasor(value, f * exit.position.x));
                }
            }
            _ => {}
        }
    }

    /// Tally a terminated photon from its recorded trajectory.
    pub fn tally_history(&mut self, photon: &Photon) {
        match &self.kind {
            DetectorKind::ATotal => {
                if photon.absorbed_weight > 0.0 {
                    self.histogram.add(&[0], photon.absorbed_weight);
                }
            }
            DetectorKind::ReflectedMTOfRhoAndSubregionHist { .. } => self.tally_momentum_transfer(photon),
            DetectorKind::ReflectedTimeOfRhoAndSubregionHist { .. } => self.tally_subregion_time(photon),
            _ => {
                for segment in photon.history.windows(2) {
                    self.tally_segment(&segment[0], &segment[1]);
                }
            }
        }
    }

    fn tally_segment(&mut self, prev: &PhotonDataPoint, cur: &PhotonDataPoint) {
        let h = &mut self.histogram;
        match &self.kind {
            DetectorKind::AOfRhoAndZ { rho, z } => {
                if cur.absorbed_weight > 0.0 {
                    let p = deposition_point(self.awt, prev, cur);
                    if let (Some(i), Some(k)) = (rho.get_bin(p.x.hypot(p.y)), z.get_bin(p.z)) {
                        h.add(&[i, k], cur.absorbed_weight);
                    }
                }
            }
            DetectorKind::AOfXAndYAndZ { x, y, z } => {
                if cur.absorbed_weight > 0.0 {
                    let p = deposition_point(self.awt, prev, cur);
                    if let (Some(i), Some(j), Some(k)) = (x.get_bin(p.x), y.get_bin(p.y), z.get_bin(p.z)) {
                        h.add(&[i, j, k], cur.absorbed_weight);
                    }
                }
            }
            DetectorKind::FluenceOfRhoAndZ { rho, z } => {
                if let Some((p, _, value)) = fluence_contribution(self.awt, &self.optical_properties, prev, cur) {
                    if let (Some(i), Some(k)) = (rho.get_bin(p.x.hypot(p.y)), z.get_bin(p.z)) {
                        h.add(&[i, k], value);
                    }
                }
            }
            DetectorKind::FluenceOfRhoAndZAndTime { rho, z, time } => {
                if let Some((p, t, value)) = fluence_contribution(self.awt, &self.optical_properties, prev, cur) {
                    if let (Some(i), Some(k), Some(l)) = (rho.get_bin(p.x.hypot(p.y)), z.get_bin(p.z), time.get_bin(t)) {
                        h.add(&[i, k, l], value);
                    }
                }
            }
            DetectorKind::FluenceOfXAndYAndZ { x, y, z } => {
                if let Some((p, _, value)) = fluence_contribution(self.awt, &self.optical_properties, prev, cur) {
                    if let (Some(i), Some(j), Some(k)) = (x.get_bin(p.x), y.get_bin(p.y), z.get_bin(p.z)) {
                        h.add(&[i, j, k], value);
                    }
                }
            }
            DetectorKind::RadianceOfRhoAndZAndAngle { rho, z, angle } => {
                if let Some((p, _, value)) = fluence_contribution(self.awt, &self.optical_properties, prev, cur) {
                    // direction the photon travelled along the segment
                    let theta = prev.direction.z.clamp(-1.0, 1.0).acos();
                    if let (Some(i), Some(k), Some(l)) = (rho.get_bin(p.x.hypot(p.y)), z.get_bin(p.z), angle.get_bin(theta)) {
                        h.add(&[i, k, l], value);
                    }
                }
            }
            _ => {}
        }
    }

    fn tally_momentum_transfer(&mut self, photon: &Photon) {
        let DetectorKind::ReflectedMTOfRhoAndSubregionHist { rho, mt, fractional_mt } = &self.kind else {
            return;
        };
        if photon.status != PhotonStatus::ExitedTop || !self.accepts(&PhotonExit::from_photon(photon)) {
            return;
        }
        let mut per_region = vec![0.0; self.optical_properties.len()];
        for segment in photon.history.windows(2) {
            if segment[1].event == PhotonEvent::Collision {
                per_region[segment[1].region] += 1.0 - segment[0].direction.dot(&segment[1].direction);
            }
        }
        let total: f64 = per_region.iter().sum();
        let rho_bin = rho.get_bin(photon.position.x.hypot(photon.position.y));
        let (Some(i), Some(j)) = (rho_bin, mt.get_bin(total)) else {
            return;
        };
        self.histogram.add(&[i, j], photon.weight);
        if let Some(fractions) = &mut self.fractional_mt {
            if total > 0.0 {
                for (r, region_mt) in per_region.iter().enumerate() {
                    if let Some(k) = fractional_mt.get_bin(region_mt / total) {
                        fractions.add(&[i, j, r, k], photon.weight);
                    }
                }
            }
        }
    }

    fn tally_subregion_time(&mut self, photon: &Photon) {
        let DetectorKind::ReflectedTimeOfRhoAndSubregionHist { rho, time } = &self.kind else {
            return;
        };
        if photon.status != PhotonStatus::ExitedTop || !self.accepts(&PhotonExit::from_photon(photon)) {
            return;
        }
        let Some(i) = rho.get_bin(photon.position.x.hypot(photon.position.y)) else {
            return;
        };
        for (r, sub) in photon.collision_info.regions.iter().enumerate() {
            if sub.path_length > 0.0 {
                let t = sub.path_length * self.optical_properties[r].n / SPEED_OF_LIGHT;
                if let Some(k) = time.get_bin(t) {
                    self.histogram.add(&[i, r, k], photon.weight);
                }
            }
        }
    }

    /// Tally the weight reflected at the surface when a photon is launched.
    pub fn tally_specular(&mut self, specular_reflectance: f64) {
        if self.kind == DetectorKind::RSpecular && specular_reflectance > 0.0 {
            self.histogram.add(&[0], specular_reflectance);
        }
    }

    /// Close the current photon's second-moment sample.
    pub fn commit_photon(&mut self) {
        self.histogram.commit_photon();
        if let Some(fractions) = &mut self.fractional_mt {
            fractions.commit_photon();
        }
    }

    pub fn merge(&mut self, other: &Detector) {
        self.histogram.merge(&other.histogram);
        if let (Some(a), Some(b)) = (&mut self.fractional_mt, &other.fractional_mt) {
            a.merge(b);
        }
        self.rejected += other.rejected;
    }

    /// Normalize by the photon count and the bin geometry.
    ///
    /// Momentum-transfer detectors also return `<name>FractionalMT`.
    pub fn finalize(&self, photons_launched: u64) -> Vec<DetectorResult> {
        if self.rejected > 0 {
            warn!(
                "detector {}: {} perturbed contributions were non-finite or negative and were dropped",
                self.name, self.rejected
            );
        }
        let num_regions = self.optical_properties.len();
        let mut results = vec![normalize(
            self.name.clone(),
            &self.histogram,
            &axis_norms(&self.kind, num_regions),
            photons_launched,
            self.kind.is_complex(),
            self.rejected,
        )];
        if let (Some(fractions), DetectorKind::ReflectedMTOfRhoAndSubregionHist { rho, mt, fractional_mt }) =
            (&self.fractional_mt, &self.kind)
        {
            let norms = vec![ring_areas(rho), widths(mt), vec![1.0; num_regions], vec![1.0; fractional_mt.num_bins()]];
            results.push(normalize(
                format!("{}FractionalMT", self.name),
                fractions,
                &norms,
                photons_launched,
                false,
                0,
            ));
        }
        results
    }
}

/// w * exp(-i 2 pi phase)
fn phasor(weight: f64, phase: f64) -> Complex<f64> {
    let angle = 2.0 * PI * phase;
    Complex::new(weight * angle.cos(), -weight * angle.sin())
}

/// Where the weight absorbed over a segment is deposited.
fn deposition_point(awt: AbsorptionWeightingType, prev: &PhotonDataPoint, cur: &PhotonDataPoint) -> Vector3<f64> {
    match awt {
        AbsorptionWeightingType::Continuous => (prev.position + cur.position) * 0.5,
        _ => cur.position,
    }
}

/// Fluence estimate `(position, time, value)` for one trajectory segment.
///
/// Collision estimator w/mut at real collisions for analog and discrete
/// weighting; track-length estimator over the segment for continuous.
fn fluence_contribution(
    awt: AbsorptionWeightingType,
    optical_properties: &[OpticalProperties],
    prev: &PhotonDataPoint,
    cur: &PhotonDataPoint,
) -> Option<(Vector3<f64>, f64, f64)> {
    let ops = &optical_properties[cur.region];
    match awt {
        AbsorptionWeightingType::Continuous => {
            let length = (cur.position - prev.position).norm();
            if length <= 0.0 {
                return None;
            }
            let value = if ops.mua > 0.0 {
                cur.absorbed_weight / ops.mua
            } else {
                prev.weight * length
            };
            Some(((prev.position + cur.position) * 0.5, 0.5 * (prev.time + cur.time), value))
        }
        _ => {
            let mut_total = ops.mut_total();
            if cur.event != PhotonEvent::Collision || mut_total <= 0.0 {
                return None;
            }
            Some((cur.position, cur.time, (cur.weight + cur.absorbed_weight) / mut_total))
        }
    }
}

fn ring_areas(rho: &DoubleRange) -> Vec<f64> {
    rho.edges().windows(2).map(|e| PI * (e[1] * e[1] - e[0] * e[0])).collect()
}

fn solid_angles(angle: &DoubleRange) -> Vec<f64> {
    angle
        .edges()
        .windows(2)
        .map(|e| 2.0 * PI * (e[0].cos() - e[1].cos()).abs())
        .collect()
}

fn widths(range: &DoubleRange) -> Vec<f64> {
    vec![range.delta(); range.num_bins()]
}

/// Per-axis normalization factors, one vector per histogram dimension.
fn axis_norms(kind: &DetectorKind, num_regions: usize) -> Vec<Vec<f64>> {
    use DetectorKind::*;
    match kind {
        RDiffuse | TDiffuse | RSpecular | ATotal | ATotalBoundingVolume | SurfaceFiber { .. } => vec![vec![1.0]],
        ROfRho { rho } | TOfRho { rho } => vec![ring_areas(rho)],
        PMCROfRho { rho, .. } | DMCdROfRhodMua { rho, .. } | DMCdROfRhodMus { rho, .. } => vec![ring_areas(rho)],
        ROfAngle { angle } | TOfAngle { angle } => vec![solid_angles(angle)],
        ROfRhoAndAngle { rho, angle } | TOfRhoAndAngle { rho, angle } => vec![ring_areas(rho), solid_angles(angle)],
        ROfRhoAndTime { rho, time } | PMCROfRhoAndTime { rho, time, .. } => vec![ring_areas(rho), widths(time)],
        ROfRhoAndOmega { rho, omega } => vec![ring_areas(rho), vec![1.0; omega.count]],
        ROfXAndY { x, y } | TOfXAndY { x, y } => vec![widths(x), widths(y)],
        ROfFx { fx } | PMCROfFx { fx, .. } => vec![vec![1.0; fx.count]],
        ROfFxAndTime { fx, time } => vec![vec![1.0; fx.count], widths(time)],
        AOfRhoAndZ { rho, z } | FluenceOfRhoAndZ { rho, z } => vec![ring_areas(rho), widths(z)],
        AOfXAndYAndZ { x, y, z } | FluenceOfXAndYAndZ { x, y, z } => vec![widths(x), widths(y), widths(z)],
        FluenceOfRhoAndZAndTime { rho, z, time } => vec![ring_areas(rho), widths(z), widths(time)],
        RadianceOfRhoAndZAndAngle { rho, z, angle } => vec![ring_areas(rho), widths(z), solid_angles(angle)],
        ReflectedMTOfRhoAndSubregionHist { rho, mt, .. } => vec![ring_areas(rho), widths(mt)],
        ReflectedTimeOfRhoAndSubregionHist { rho, time } => vec![ring_areas(rho), vec![1.0; num_regions], widths(time)],
    }
}

/// Row-major product of the per-axis factors.
fn bin_norms(axes: &[Vec<f64>]) -> Vec<f64> {
    axes.iter().fold(vec![1.0], |acc, axis| {
        acc.iter().flat_map(|a| axis.iter().map(move |b| a * b)).collect()
    })
}

fn normalize(
    name: String,
    histogram: &Histogram,
    axes: &[Vec<f64>],
    photons_launched: u64,
    complex: bool,
    rejected: u64,
) -> DetectorResult {
    let n = photons_launched.max(1) as f64;
    let norms = bin_norms(axes);
    let mean: Vec<f64> = histogram.mean().iter().zip(&norms).map(|(m, g)| m.re / (g * n)).collect();
    let mean_imaginary =
        complex.then(|| histogram.mean().iter().zip(&norms).map(|(m, g)| m.im / (g * n)).collect::<Vec<f64>>());
    let (second_moment, second_moment_imaginary, standard_deviation) = if histogram.tracks_second_moment() {
        let sm: Vec<f64> = histogram
            .second_moment()
            .iter()
            .zip(&norms)
            .map(|(s, g)| s.re / (g * g * n))
            .collect();
        let sm_im = complex.then(|| {
            histogram
                .second_moment()
                .iter()
                .zip(&norms)
                .map(|(s, g)| s.im / (g * g * n))
                .collect::<Vec<f64>>()
        });
        let sd = sm
            .iter()
            .zip(&mean)
            .map(|(s, m)| ((s - m * m).max(0.0) / n).sqrt())
            .collect();
        (Some(sm), sm_im, Some(sd))
    } else {
        (None, None, None)
    };
    DetectorResult {
        name,
        dims: histogram.dims().to_vec(),
        mean,
        mean_imaginary,
        second_moment,
        second_moment_imaginary,
        standard_deviation,
        tally_count: histogram.tally_count().to_vec(),
        rejected_contributions: rejected,
    }
}
