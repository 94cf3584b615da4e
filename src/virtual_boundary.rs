use crate::absorption::AbsorptionWeightingType;
use crate::detectors::{Detector, DetectorContext, DetectorInput, DetectorResult, PhotonExit};
use crate::error::{Result, TurbidError};
use crate::photon::{Photon, PhotonStatus};
use crate::tissue::Tissue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Surface or volume a group of detectors is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VirtualBoundaryType {
    /// Top surface, photons leaving upwards
    DiffuseReflectance,
    /// Bottom surface, photons leaving downwards
    DiffuseTransmittance,
    /// Weight reflected at launch
    SpecularReflectance,
    /// Whole tissue volume, tallied from the recorded trajectory
    GenericVolume,
    /// Fiber face on the top surface
    SurfaceFiber,
    /// Lateral wall of a bounding cylinder
    BoundingVolume,
    /// Top surface, tallied through perturbation weights
    #[serde(rename = "pMCDiffuseReflectance")]
    PMCDiffuseReflectance,
}

impl VirtualBoundaryType {
    /// Whether a photon terminating with `status` crosses this boundary.
    pub fn is_crossed_by(&self, status: PhotonStatus) -> bool {
        match self {
            VirtualBoundaryType::DiffuseReflectance
            | VirtualBoundaryType::SurfaceFiber
            | VirtualBoundaryType::PMCDiffuseReflectance => status == PhotonStatus::ExitedTop,
            VirtualBoundaryType::DiffuseTransmittance => status == PhotonStatus::ExitedBottom,
            VirtualBoundaryType::BoundingVolume => status == PhotonStatus::ExitedBoundingVolume,
            VirtualBoundaryType::SpecularReflectance | VirtualBoundaryType::GenericVolume => false,
        }
    }
}

/// Detectors sharing one virtual boundary.
#[derive(Debug, Clone)]
pub struct VirtualBoundary {
    boundary_type: VirtualBoundaryType,
    /// (position in the input list, detector)
    detectors: Vec<(usize, Detector)>,
}

impl VirtualBoundary {
    pub fn boundary_type(&self) -> VirtualBoundaryType {
        self.boundary_type
    }

    pub fn detectors(&self) -> impl Iterator<Item = &Detector> {
        self.detectors.iter().map(|(_, d)| d)
    }

    fn tally(&mut self, photon: &Photon) {
        match self.boundary_type {
            VirtualBoundaryType::GenericVolume => {
                for (_, detector) in &mut self.detectors {
                    detector.tally_history(photon);
                }
            }
            VirtualBoundaryType::SpecularReflectance => {}
            other => {
                if other.is_crossed_by(photon.status) {
                    let exit = PhotonExit::from_photon(photon);
                    for (_, detector) in &mut self.detectors {
                        detector.tally_exit(&exit);
                    }
                }
            }
        }
    }
}

/// Routes finished photons to the boundaries they crossed.
///
/// Every worker owns one controller; controllers built from the same
/// inputs can be merged.
#[derive(Debug, Clone)]
pub struct VirtualBoundaryController {
    boundaries: Vec<VirtualBoundary>,
    needs_history: bool,
}

impl VirtualBoundaryController {
    pub fn new(inputs: &[DetectorInput], tissue: &Tissue, awt: AbsorptionWeightingType) -> Result<Self> {
        let context = DetectorContext::from_tissue(tissue, awt);
        let mut names = HashSet::new();
        let mut boundaries: Vec<VirtualBoundary> = Vec::new();
        for (index, input) in inputs.iter().enumerate() {
            let name = input.name();
            if !names.insert(name.clone()) {
                return Err(TurbidError::InvalidDetector {
                    name,
                    reason: "detector names must be unique".to_string(),
                });
            }
            let boundary_type = input.kind.virtual_boundary();
            if boundary_type == VirtualBoundaryType::BoundingVolume && !tissue.has_bounding_volume() {
                return Err(TurbidError::InvalidDetector {
                    name,
                    reason: "tissue has no bounding volume".to_string(),
                });
            }
            let detector = Detector::new(input, &context)?;
            match boundaries.iter_mut().find(|b| b.boundary_type == boundary_type) {
                Some(boundary) => boundary.detectors.push((index, detector)),
                None => boundaries.push(VirtualBoundary {
                    boundary_type,
                    detectors: vec![(index, detector)],
                }),
            }
        }
        let needs_history = inputs.iter().any(|i| i.kind.needs_history());
        Ok(Self {
            boundaries,
            needs_history,
        })
    }

    pub fn boundaries(&self) -> &[VirtualBoundary] {
        &self.boundaries
    }

    /// Whether photons must record their trajectory.
    pub fn needs_history(&self) -> bool {
        self.needs_history
    }

    /// Tally the weight specularly reflected when a photon is launched.
    pub fn tally_specular(&mut self, specular_reflectance: f64) {
        for boundary in &mut self.boundaries {
            if boundary.boundary_type == VirtualBoundaryType::SpecularReflectance {
                for (_, detector) in &mut boundary.detectors {
                    detector.tally_specular(specular_reflectance);
                }
            }
        }
    }

    /// Tally a terminated photon and close its second-moment sample.
    pub fn tally_photon(&mut self, photon: &Photon) {
        for boundary in &mut self.boundaries {
            boundary.tally(photon);
            for (_, detector) in &mut boundary.detectors {
                detector.commit_photon();
            }
        }
    }

    /// Add another worker's accumulators.
    pub fn merge(&mut self, other: &VirtualBoundaryController) {
        for (mine, theirs) in self.boundaries.iter_mut().zip(&other.boundaries) {
            for ((_, a), (_, b)) in mine.detectors.iter_mut().zip(&theirs.detectors) {
                a.merge(b);
            }
        }
    }

    /// Normalized results in detector input order.
    pub fn finalize(&self, photons_launched: u64) -> Vec<DetectorResult> {
        let mut indexed: Vec<(usize, &Detector)> = self
            .boundaries
            .iter()
            .flat_map(|b| b.detectors.iter().map(|(i, d)| (*i, d)))
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        indexed
            .into_iter()
            .flat_map(|(_, d)| d.finalize(photons_launched))
            .collect()
    }
}
