use crate::error::{Result, TurbidError};
use crate::optical_properties::OpticalProperties;
use crate::ranges::DoubleRange;
use crate::virtual_boundary::VirtualBoundaryType;
use serde::{Deserialize, Serialize};

/// What a detector measures and how it bins it.
///
/// Angles are polar angles of the exit direction from +z in radians, so
/// reflected photons have angles in (pi/2, pi]. Times are in ns, spatial
/// frequencies `fx` in 1/mm and temporal frequencies `omega` in GHz.
/// Frequency ranges are sampled at each of their `count` points rather
/// than binned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DetectorKind {
    RDiffuse,
    ROfRho { rho: DoubleRange },
    ROfAngle { angle: DoubleRange },
    ROfRhoAndAngle { rho: DoubleRange, angle: DoubleRange },
    ROfRhoAndTime { rho: DoubleRange, time: DoubleRange },
    ROfRhoAndOmega { rho: DoubleRange, omega: DoubleRange },
    ROfXAndY { x: DoubleRange, y: DoubleRange },
    ROfFx { fx: DoubleRange },
    ROfFxAndTime { fx: DoubleRange, time: DoubleRange },
    /// Reflectance collected by a circular fiber face on the top surface
    SurfaceFiber { center: [f64; 2], radius: f64 },

    TDiffuse,
    TOfRho { rho: DoubleRange },
    TOfAngle { angle: DoubleRange },
    TOfRhoAndAngle { rho: DoubleRange, angle: DoubleRange },
    TOfXAndY { x: DoubleRange, y: DoubleRange },

    RSpecular,

    ATotal,
    AOfRhoAndZ { rho: DoubleRange, z: DoubleRange },
    AOfXAndYAndZ { x: DoubleRange, y: DoubleRange, z: DoubleRange },
    FluenceOfRhoAndZ { rho: DoubleRange, z: DoubleRange },
    FluenceOfRhoAndZAndTime { rho: DoubleRange, z: DoubleRange, time: DoubleRange },
    FluenceOfXAndYAndZ { x: DoubleRange, y: DoubleRange, z: DoubleRange },
    RadianceOfRhoAndZAndAngle { rho: DoubleRange, z: DoubleRange, angle: DoubleRange },
    /// Momentum transfer of reflected photons; also reports the fraction
    /// of each photon's momentum transfer spent in every region.
    ReflectedMTOfRhoAndSubregionHist {
        rho: DoubleRange,
        mt: DoubleRange,
        fractional_mt: DoubleRange,
    },
    /// Time reflected photons spent in every region
    ReflectedTimeOfRhoAndSubregionHist { rho: DoubleRange, time: DoubleRange },

    ATotalBoundingVolume,

    #[serde(rename = "pMCROfRho")]
    PMCROfRho { rho: DoubleRange, perturbation: PerturbationInput },
    #[serde(rename = "pMCROfRhoAndTime")]
    PMCROfRhoAndTime {
        rho: DoubleRange,
        time: DoubleRange,
        perturbation: PerturbationInput,
    },
    #[serde(rename = "pMCROfFx")]
    PMCROfFx { fx: DoubleRange, perturbation: PerturbationInput },
    #[serde(rename = "dMCdROfRhodMua")]
    DMCdROfRhodMua { rho: DoubleRange, perturbation: PerturbationInput },
    #[serde(rename = "dMCdROfRhodMus")]
    DMCdROfRhodMus { rho: DoubleRange, perturbation: PerturbationInput },
}

/// Perturbed optical properties for a pMC/dMC detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationInput {
    /// One entry per tissue region
    pub perturbed_ops: Vec<OpticalProperties>,
    /// Regions whose properties differ from the reference run
    pub perturbed_regions_indices: Vec<usize>,
}

/// Detector configuration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorInput {
    /// Output name; defaults to the kind name.
    #[serde(default)]
    pub name: Option<String>,
    pub kind: DetectorKind,
    #[serde(default)]
    pub tally_second_moment: bool,
    /// Numerical aperture of the collecting optics, for exit-based detectors.
    #[serde(default)]
    pub numerical_aperture: Option<f64>,
    /// Only count photons whose last tissue region was this one.
    #[serde(default)]
    pub final_tissue_region_index: Option<usize>,
}

impl DetectorInput {
    pub fn new(kind: DetectorKind) -> Self {
        Self {
            name: None,
            kind,
            tally_second_moment: false,
            numerical_aperture: None,
            final_tissue_region_index: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_second_moment(mut self) -> Self {
        self.tally_second_moment = true;
        self
    }

    pub fn with_numerical_aperture(mut self, na: f64) -> Self {
        self.numerical_aperture = Some(na);
        self
    }

    pub fn with_final_tissue_region(mut self, region: usize) -> Self {
        self.final_tissue_region_index = Some(region);
        self
    }

    pub fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.kind.type_name().to_string())
    }

    /// Check ranges and filters against a tissue with `num_regions` regions.
    pub fn validate(&self, num_regions: usize) -> Result<()> {
        let name = self.name();
        let invalid = |reason: String| TurbidError::InvalidDetector {
            name: name.clone(),
            reason,
        };
        for (label, range) in self.kind.ranges() {
            range.validate(label).map_err(|e| invalid(e.to_string()))?;
        }
        if let Some(na) = self.numerical_aperture {
            if !(na >= 0.0) {
                return Err(invalid(format!("numerical aperture must be non-negative, got {}", na)));
            }
            if !self.kind.is_exit_based() {
                return Err(invalid("numerical aperture only applies to detectors tallying exiting photons".to_string()));
            }
        }
        if let Some(region) = self.final_tissue_region_index {
            if region >= num_regions {
                return Err(invalid(format!("final tissue region {} does not exist", region)));
            }
            if !self.kind.is_exit_based() || self.kind.is_perturbation() {
                return Err(invalid(
                    "final tissue region filter only applies to live exit-based detectors".to_string(),
                ));
            }
        }
        if let DetectorKind::SurfaceFiber { radius, .. } = &self.kind {
            if !(*radius > 0.0) {
                return Err(invalid(format!("fiber radius must be positive, got {}", radius)));
            }
        }
        if let Some(perturbation) = self.kind.perturbation() {
            if perturbation.perturbed_ops.len() != num_regions {
                return Err(invalid(format!(
                    "{} perturbed optical properties given for {} regions",
                    perturbation.perturbed_ops.len(),
                    num_regions
                )));
            }
        }
        Ok(())
    }
}

impl DetectorKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            DetectorKind::RDiffuse => "RDiffuse",
            DetectorKind::ROfRho { .. } => "ROfRho",
            DetectorKind::ROfAngle { .. } => "ROfAngle",
            DetectorKind::ROfRhoAndAngle { .. } => "ROfRhoAndAngle",
            DetectorKind::ROfRhoAndTime { .. } => "ROfRhoAndTime",
            DetectorKind::ROfRhoAndOmega { .. } => "ROfRhoAndOmega",
            DetectorKind::ROfXAndY { .. } => "ROfXAndY",
            DetectorKind::ROfFx { .. } => "ROfFx",
            DetectorKind::ROfFxAndTime { .. } => "ROfFxAndTime",
            DetectorKind::SurfaceFiber { .. } => "SurfaceFiber",
            DetectorKind::TDiffuse => "TDiffuse",
            DetectorKind::TOfRho { .. } => "TOfRho",
            DetectorKind::TOfAngle { .. } => "TOfAngle",
            DetectorKind::TOfRhoAndAngle { .. } => "TOfRhoAndAngle",
            DetectorKind::TOfXAndY { .. } => "TOfXAndY",
            DetectorKind::RSpecular => "RSpecular",
            DetectorKind::ATotal => "ATotal",
            DetectorKind::AOfRhoAndZ { .. } => "AOfRhoAndZ",
            DetectorKind::AOfXAndYAndZ { .. } => "AOfXAndYAndZ",
            DetectorKind::FluenceOfRhoAndZ { .. } => "FluenceOfRhoAndZ",
            DetectorKind::FluenceOfRhoAndZAndTime { .. } => "FluenceOfRhoAndZAndTime",
            DetectorKind::FluenceOfXAndYAndZ { .. } => "FluenceOfXAndYAndZ",
            DetectorKind::RadianceOfRhoAndZAndAngle { .. } => "RadianceOfRhoAndZAndAngle",
            DetectorKind::ReflectedMTOfRhoAndSubregionHist { .. } => "ReflectedMTOfRhoAndSubregionHist",
            DetectorKind::ReflectedTimeOfRhoAndSubregionHist { .. } => "ReflectedTimeOfRhoAndSubregionHist",
            DetectorKind::ATotalBoundingVolume => "ATotalBoundingVolume",
            DetectorKind::PMCROfRho { .. } => "pMCROfRho",
            DetectorKind::PMCROfRhoAndTime { .. } => "pMCROfRhoAndTime",
            DetectorKind::PMCROfFx { .. } => "pMCROfFx",
            DetectorKind::DMCdROfRhodMua { .. } => "dMCdROfRhodMua",
            DetectorKind::DMCdROfRhodMus { .. } => "dMCdROfRhodMus",
        }
    }

    /// Virtual boundary the detector is attached to.
    pub fn virtual_boundary(&self) -> VirtualBoundaryType {
        use DetectorKind::*;
        match self {
            RDiffuse | ROfRho { .. } | ROfAngle { .. } | ROfRhoAndAngle { .. } | ROfRhoAndTime { .. }
            | ROfRhoAndOmega { .. } | ROfXAndY { .. } | ROfFx { .. } | ROfFxAndTime { .. } => {
                VirtualBoundaryType::DiffuseReflectance
            }
            SurfaceFiber { .. } => VirtualBoundaryType::SurfaceFiber,
            TDiffuse | TOfRho { .. } | TOfAngle { .. } | TOfRhoAndAngle { .. } | TOfXAndY { .. } => {
                VirtualBoundaryType::DiffuseTransmittance
            }
            RSpecular => VirtualBoundaryType::SpecularReflectance,
            ATotal
            | AOfRhoAndZ { .. }
            | AOfXAndYAndZ { .. }
            | FluenceOfRhoAndZ { .. }
            | FluenceOfRhoAndZAndTime { .. }
            | FluenceOfXAndYAndZ { .. }
            | RadianceOfRhoAndZAndAngle { .. }
            | ReflectedMTOfRhoAndSubregionHist { .. }
            | ReflectedTimeOfRhoAndSubregionHist { .. } => VirtualBoundaryType::GenericVolume,
            ATotalBoundingVolume => VirtualBoundaryType::BoundingVolume,
            PMCROfRho { .. } | PMCROfRhoAndTime { .. } | PMCROfFx { .. } | DMCdROfRhodMua { .. }
            | DMCdROfRhodMus { .. } => VirtualBoundaryType::PMCDiffuseReflectance,
        }
    }

    /// Detectors tallied from the state of a photon leaving the tissue.
    pub fn is_exit_based(&self) -> bool {
        !matches!(
            self,
            DetectorKind::RSpecular
                | DetectorKind::ATotal
                | DetectorKind::AOfRhoAndZ { .. }
                | DetectorKind::AOfXAndYAndZ { .. }
                | DetectorKind::FluenceOfRhoAndZ { .. }
                | DetectorKind::FluenceOfRhoAndZAndTime { .. }
                | DetectorKind::FluenceOfXAndYAndZ { .. }
                | DetectorKind::RadianceOfRhoAndZAndAngle { .. }
                | DetectorKind::ATotalBoundingVolume
        )
    }

    /// Detectors that need the photon's recorded trajectory.
    pub fn needs_history(&self) -> bool {
        self.virtual_boundary() == VirtualBoundaryType::GenericVolume
    }

    pub fn is_perturbation(&self) -> bool {
        self.perturbation().is_some()
    }

    pub fn perturbation(&self) -> Option<&PerturbationInput> {
        match self {
            DetectorKind::PMCROfRho { perturbation, .. }
            | DetectorKind::PMCROfRhoAndTime { perturbation, .. }
            | DetectorKind::PMCROfFx { perturbation, .. }
            | DetectorKind::DMCdROfRhodMua { perturbation, .. }
            | DetectorKind::DMCdROfRhodMus { perturbation, .. } => Some(perturbation),
            _ => None,
        }
    }

    /// Every range the detector is configured with, labelled for messages.
    pub fn ranges(&self) -> Vec<(&'static str, &DoubleRange)> {
        use DetectorKind::*;
        match self {
            RDiffuse | TDiffuse | RSpecular | ATotal | ATotalBoundingVolume | SurfaceFiber { .. } => vec![],
            ROfRho { rho } | TOfRho { rho } => vec![("rho", rho)],
            ROfAngle { angle } | TOfAngle { angle } => vec![("angle", angle)],
            ROfRhoAndAngle { rho, angle } | TOfRhoAndAngle { rho, angle } => vec![("rho", rho), ("angle", angle)],
            ROfRhoAndTime { rho, time } => vec![("rho", rho), ("time", time)],
            ROfRhoAndOmega { rho, omega } => vec![("rho", rho), ("omega", omega)],
            ROfXAndY { x, y } | TOfXAndY { x, y } => vec![("x", x), ("y", y)],
            ROfFx { fx } => vec![("fx", fx)],
            ROfFxAndTime { fx, time } => vec![("fx", fx), ("time", time)],
            AOfRhoAndZ { rho, z } | FluenceOfRhoAndZ { rho, z } => vec![("rho", rho), ("z", z)],
            AOfXAndYAndZ { x, y, z } | FluenceOfXAndYAndZ { x, y, z } => vec![("x", x), ("y", y), ("z", z)],
            FluenceOfRhoAndZAndTime { rho, z, time } => vec![("rho", rho), ("z", z), ("time", time)],
            RadianceOfRhoAndZAndAngle { rho, z, angle } => vec![("rho", rho), ("z", z), ("angle", angle)],
            ReflectedMTOfRhoAndSubregionHist { rho, mt, fractional_mt } => {
                vec![("rho", rho), ("mt", mt), ("fractional_mt", fractional_mt)]
            }
            ReflectedTimeOfRhoAndSubregionHist { rho, time } => vec![("rho", rho), ("time", time)],
            PMCROfRho { rho, .. } | DMCdROfRhodMua { rho, .. } | DMCdROfRhodMus { rho, .. } => vec![("rho", rho)],
            PMCROfRhoAndTime { rho, time, .. } => vec![("rho", rho), ("time", time)],
            PMCROfFx { fx, .. } => vec![("fx", fx)],
        }
    }

    /// Histogram shape of the primary output.
    pub fn dims(&self, num_regions: usize) -> Vec<usize> {
        use DetectorKind::*;
        match self {
            RDiffuse | TDiffuse | RSpecular | ATotal | ATotalBoundingVolume | SurfaceFiber { .. } => vec![1],
            ROfRho { rho } | TOfRho { rho } => vec![rho.num_bins()],
            PMCROfRho { rho, .. } | DMCdROfRhodMua { rho, .. } | DMCdROfRhodMus { rho, .. } => vec![rho.num_bins()],
            ROfAngle { angle } | TOfAngle { angle } => vec![angle.num_bins()],
            ROfRhoAndAngle { rho, angle } | TOfRhoAndAngle { rho, angle } => vec![rho.num_bins(), angle.num_bins()],
            ROfRhoAndTime { rho, time } | PMCROfRhoAndTime { rho, time, .. } => vec![rho.num_bins(), time.num_bins()],
            ROfRhoAndOmega { rho, omega } => vec![rho.num_bins(), omega.count],
            ROfXAndY { x, y } | TOfXAndY { x, y } => vec![x.num_bins(), y.num_bins()],
            ROfFx { fx } | PMCROfFx { fx, .. } => vec![fx.count],
            ROfFxAndTime { fx, time } => vec![fx.count, time.num_bins()],
            AOfRhoAndZ { rho, z } | FluenceOfRhoAndZ { rho, z } => vec![rho.num_bins(), z.num_bins()],
            AOfXAndYAndZ { x, y, z } | FluenceOfXAndYAndZ { x, y, z } => vec![x.num_bins(), y.num_bins(), z.num_bins()],
            FluenceOfRhoAndZAndTime { rho, z, time } => vec![rho.num_bins(), z.num_bins(), time.num_bins()],
            RadianceOfRhoAndZAndAngle { rho, z, angle } => vec![rho.num_bins(), z.num_bins(), angle.num_bins()],
            ReflectedMTOfRhoAndSubregionHist { rho, mt, .. } => vec![rho.num_bins(), mt.num_bins()],
            ReflectedTimeOfRhoAndSubregionHist { rho, time } => vec![rho.num_bins(), num_regions, time.num_bins()],
        }
    }

    /// Whether the detector accumulates complex values.
    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            DetectorKind::ROfRhoAndOmega { .. }
                | DetectorKind::ROfFx { .. }
                | DetectorKind::ROfFxAndTime { .. }
                | DetectorKind::PMCROfFx { .. }
        )
    }
}
