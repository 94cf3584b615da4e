use crate::error::{Result, TurbidError};
use crate::optical_properties::OpticalProperties;
use crate::region::{RegionShape, TissueRegion};
use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Tissue description as read from the simulation input.
///
/// Layers are listed top to bottom; the first and last must be the
/// semi-infinite ambient media above and below the tissue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TissueInput {
    MultiLayer {
        layers: Vec<TissueRegion>,
    },
    /// Layers plus embedded regions. An inclusion lying inside another
    /// inclusion is nested in it, which gives concentric compositions.
    MultiLayerWithInclusions {
        layers: Vec<TissueRegion>,
        inclusions: Vec<TissueRegion>,
    },
    /// Layers truncated laterally by a z-aligned cylinder; photons leaving
    /// through its wall are killed and tallied to the bounding volume.
    BoundingCylinder {
        layers: Vec<TissueRegion>,
        bounding: RegionShape,
    },
}

impl TissueInput {
    /// Air / tissue / air with the tissue between `z = 0` and `z = thickness`.
    pub fn single_layer(ops: OpticalProperties, thickness: f64) -> Self {
        TissueInput::MultiLayer {
            layers: vec![
                TissueRegion::layer(f64::NEG_INFINITY, 0.0, OpticalProperties::air()),
                TissueRegion::layer(0.0, thickness, ops),
                TissueRegion::layer(thickness, f64::INFINITY, OpticalProperties::air()),
            ],
        }
    }

    pub fn build(&self) -> Result<Tissue> {
        match self {
            TissueInput::MultiLayer { layers } => Tissue::new(layers.clone(), Vec::new(), None),
            TissueInput::MultiLayerWithInclusions { layers, inclusions } => {
                Tissue::new(layers.clone(), inclusions.clone(), None)
            }
            TissueInput::BoundingCylinder { layers, bounding } => {
                Tissue::new(layers.clone(), Vec::new(), Some(bounding.clone()))
            }
        }
    }
}

impl Default for TissueInput {
    fn default() -> Self {
        TissueInput::single_layer(OpticalProperties::from_reduced_scattering(0.01, 1.0, 0.8, 1.4), 100.0)
    }
}

/// Where a photon ends up if it crosses the boundary it is heading for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// Leave the current region through its own boundary into `to`.
    Exit { to: usize },
    /// Enter the inclusion `to` nested in the current region.
    Enter { to: usize },
    /// Leave the lateral wall of the bounding cylinder.
    BoundingVolume,
}

/// Nearest boundary along a ray from inside a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryHit {
    pub distance: f64,
    pub crossing: Crossing,
}

/// Ordered, space-partitioning set of tissue regions.
///
/// Region indices are the layers top to bottom followed by the inclusions
/// in input order. Index 0 is the ambient medium above the tissue and
/// `layer_count - 1` the ambient medium below it.
#[derive(Debug, Clone)]
pub struct Tissue {
    regions: Vec<TissueRegion>,
    layer_count: usize,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    bounding: Option<TissueRegion>,
}

impl Tissue {
    pub fn new(
        layers: Vec<TissueRegion>,
        inclusions: Vec<TissueRegion>,
        bounding: Option<RegionShape>,
    ) -> Result<Self> {
        validate_layers(&layers)?;
        let layer_count = layers.len();
        let mut regions = layers;
        regions.extend(inclusions);
        for region in &regions[layer_count..] {
            region.validate()?;
            if region.shape().is_layer() {
                return Err(TurbidError::InvalidTissue(
                    "inclusions must be voxels, ellipsoids or cylinders, not layers".to_string(),
                ));
            }
        }

        let parents = assign_parents(&regions, layer_count)?;
        let mut children = vec![Vec::new(); regions.len()];
        for (i, parent) in parents.iter().enumerate() {
            if let Some(p) = parent {
                children[*p].push(i);
            }
        }
        check_siblings(&regions, &children)?;

        let bounding = match bounding {
            Some(shape) => Some(bounding_cylinder(shape, &regions[..layer_count])?),
            None => None,
        };

        debug!(
            "built tissue with {} layers and {} inclusions",
            layer_count,
            regions.len() - layer_count
        );
        Ok(Self {
            regions,
            layer_count,
            parents,
            children,
            bounding,
        })
    }

    pub fn regions(&self) -> &[TissueRegion] {
        &self.regions
    }

    pub fn region(&self, index: usize) -> &TissueRegion {
        &self.regions[index]
    }

    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    pub fn top_ambient_index(&self) -> usize {
        0
    }

    pub fn bottom_ambient_index(&self) -> usize {
        self.layer_count - 1
    }

    pub fn is_ambient(&self, index: usize) -> bool {
        index == 0 || index == self.layer_count - 1
    }

    pub fn has_bounding_volume(&self) -> bool {
        self.bounding.is_some()
    }

    /// Parent of an inclusion; `None` for layers.
    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents[index]
    }

    /// Optical properties of every region, indexed like [`Tissue::regions`].
    pub fn optical_properties(&self) -> Vec<OpticalProperties> {
        self.regions.iter().map(|r| r.ops).collect()
    }

    /// z of the tissue's top surface.
    pub fn top_surface_z(&self) -> f64 {
        layer_bounds(&self.regions[1]).0
    }

    /// z of the tissue's bottom surface.
    pub fn bottom_surface_z(&self) -> f64 {
        layer_bounds(&self.regions[self.layer_count - 2]).1
    }

    /// Region a photon at `p` travelling along `d` belongs to.
    ///
    /// The innermost inclusion containing `p` wins; on a plane shared by two
    /// layers the layer the photon is heading into is chosen.
    pub fn region_index_at(&self, p: &Vector3<f64>, d: &Vector3<f64>) -> usize {
        let mut layer = 0;
        for i in 0..self.layer_count {
            let (z_start, z_stop) = layer_bounds(&self.regions[i]);
            if p.z >= z_start && p.z <= z_stop {
                layer = i;
                // on the lower plane and heading down: belongs to the next layer
                if p.z == z_stop && d.z > 0.0 && i + 1 < self.layer_count {
                    layer = i + 1;
                }
                break;
            }
        }
        let mut current = layer;
        'descend: loop {
            for &child in &self.children[current] {
                if self.regions[child].contains(p) {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Nearest boundary crossing for a photon inside `region`.
    ///
    /// Entering a nested inclusion wins a tie with leaving the current region.
    /// `None` means the ray never leaves the region.
    pub fn distance_to_boundary(&self, p: &Vector3<f64>, d: &Vector3<f64>, region: usize) -> Option<BoundaryHit> {
        let mut best = self.regions[region].ray_intersect(p, d).and_then(|distance| {
            self.exit_target(region, d).map(|to| BoundaryHit {
                distance,
                crossing: Crossing::Exit { to },
            })
        });
        for &child in &self.children[region] {
            if let Some(distance) = self.regions[child].ray_intersect(p, d) {
                if best.map_or(true, |b| distance <= b.distance) {
                    best = Some(BoundaryHit {
                        distance,
                        crossing: Crossing::Enter { to: child },
                    });
                }
            }
        }
        if let Some(bounding) = &self.bounding {
            if region < self.layer_count && !self.is_ambient(region) {
                if let Some(distance) = bounding.ray_intersect(p, d) {
                    if best.map_or(true, |b| distance < b.distance) {
                        best = Some(BoundaryHit {
                            distance,
                            crossing: Crossing::BoundingVolume,
                        });
                    }
                }
            }
        }
        best
    }

    /// Unit normal of the boundary being crossed at `p`, oriented along `d`.
    pub fn boundary_normal(&self, p: &Vector3<f64>, d: &Vector3<f64>, region: usize, crossing: Crossing) -> Vector3<f64> {
        let n = match crossing {
            Crossing::Exit { .. } => self.regions[region].surface_normal(p),
            Crossing::Enter { to } => -self.regions[to].surface_normal(p),
            Crossing::BoundingVolume => match &self.bounding {
                Some(b) => b.surface_normal(p),
                None => Vector3::z(),
            },
        };
        if n.dot(d) < 0.0 {
            -n
        } else {
            n
        }
    }

    /// Region on the far side of `region`'s own boundary.
    fn exit_target(&self, region: usize, d: &Vector3<f64>) -> Option<usize> {
        if let Some(parent) = self.parents[region] {
            return Some(parent);
        }
        if d.z > 0.0 && region + 1 < self.layer_count {
            Some(region + 1)
        } else if d.z < 0.0 && region > 0 {
            Some(region - 1)
        } else {
            None
        }
    }
}

fn layer_bounds(region: &TissueRegion) -> (f64, f64) {
    match region.shape() {
        RegionShape::Layer { z_start, z_stop } => (*z_start, *z_stop),
        _ => (f64::NAN, f64::NAN),
    }
}

fn validate_layers(layers: &[TissueRegion]) -> Result<()> {
    if layers.len() < 3 {
        return Err(TurbidError::InvalidTissue(format!(
            "need ambient layers above and below at least one tissue layer, got {} layers",
            layers.len()
        )));
    }
    for (i, layer) in layers.iter().enumerate() {
        if !layer.shape().is_layer() {
            return Err(TurbidError::InvalidTissue(format!("layer {} is not a layer shape", i)));
        }
        layer.validate()?;
    }
    let first = layer_bounds(&layers[0]);
    let last = layer_bounds(&layers[layers.len() - 1]);
    if first.0 != f64::NEG_INFINITY || last.1 != f64::INFINITY {
        return Err(TurbidError::InvalidTissue(
            "first and last layers must extend to -inf and +inf".to_string(),
        ));
    }
    for i in 1..layers.len() {
        let above = layer_bounds(&layers[i - 1]);
        let below = layer_bounds(&layers[i]);
        if (above.1 - below.0).abs() > 1e-12 {
            return Err(TurbidError::InvalidTissue(format!(
                "layers {} and {} are not contiguous: {} != {}",
                i - 1,
                i,
                above.1,
                below.0
            )));
        }
        if !below.1.is_finite() && i != layers.len() - 1 {
            return Err(TurbidError::InvalidTissue(format!("inner layer {} is unbounded", i)));
        }
    }
    Ok(())
}

fn volume(region: &TissueRegion) -> f64 {
    region.shape().bounding_box().width().iter().product()
}

/// Every inclusion's parent is the smallest region enclosing it.
fn assign_parents(regions: &[TissueRegion], layer_count: usize) -> Result<Vec<Option<usize>>> {
    let mut parents = vec![None; regions.len()];
    for i in layer_count..regions.len() {
        let bb = regions[i].shape().bounding_box();
        let mut parent: Option<usize> = None;
        for j in layer_count..regions.len() {
            if j == i {
                continue;
            }
            let other = regions[j].shape().bounding_box();
            if other.encloses(&bb) && other != bb && parent.map_or(true, |p| volume(&regions[j]) < volume(&regions[p])) {
                parent = Some(j);
            }
        }
        if parent.is_none() {
            parent = (1..layer_count - 1).find(|&j| regions[j].shape().bounding_box().encloses(&bb));
        }
        match parent {
            Some(p) => parents[i] = Some(p),
            None => {
                return Err(TurbidError::InvalidTissue(format!(
                    "inclusion {} is not enclosed by a single tissue layer or inclusion",
                    i
                )))
            }
        }
    }
    Ok(parents)
}

fn check_siblings(regions: &[TissueRegion], children: &[Vec<usize>]) -> Result<()> {
    for siblings in children {
        for (k, &a) in siblings.iter().enumerate() {
            for &b in &siblings[k + 1..] {
                if regions[a].shape().bounding_box().overlaps(&regions[b].shape().bounding_box()) {
                    return Err(TurbidError::InvalidTissue(format!("inclusions {} and {} overlap", a, b)));
                }
            }
        }
    }
    Ok(())
}

fn bounding_cylinder(shape: RegionShape, layers: &[TissueRegion]) -> Result<TissueRegion> {
    shape.validate()?;
    match shape {
        RegionShape::Cylinder { center, height, .. } => {
            let top = layer_bounds(&layers[1]).0;
            let bottom = layer_bounds(&layers[layers.len() - 2]).1;
            let z_min = center[2] - 0.5 * height;
            let z_max = center[2] + 0.5 * height;
            if (z_min - top).abs() > 1e-9 || (z_max - bottom).abs() > 1e-9 {
                return Err(TurbidError::InvalidTissue(format!(
                    "bounding cylinder spans z [{}, {}] but the tissue spans [{}, {}]",
                    z_min, z_max, top, bottom
                )));
            }
            Ok(TissueRegion::new(shape, OpticalProperties::air()))
        }
        other => Err(TurbidError::InvalidTissue(format!(
            "bounding volume must be a cylinder, got {:?}",
            other
        ))),
    }
}
