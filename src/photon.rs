use crate::absorption::{AbsorptionWeightingType, CollisionOutcome};
use crate::optical_properties::OpticalProperties;
use crate::optics::{fresnel, reflect, refract};
use crate::phase_function::scatter;
use crate::random::SimulationRng;
use crate::settings::SimulationOptions;
use crate::tissue::{BoundaryHit, Crossing, Tissue};
use log::{debug, warn};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Speed of light in vacuum in mm/ns.
pub const SPEED_OF_LIGHT: f64 = 299.792458;

/// Consecutive zero-length boundary steps after which a photon is declared lost.
const MAX_ZERO_LENGTH_CROSSINGS: u32 = 100;

/// Life cycle state of a photon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhotonStatus {
    Alive,
    /// Left through the top surface (diffuse reflectance)
    ExitedTop,
    /// Left through the bottom surface (diffuse transmittance)
    ExitedBottom,
    /// Left through the lateral wall of a bounding cylinder
    ExitedBoundingVolume,
    /// Absorbed at a collision (analog weighting, or zero albedo)
    Absorbed,
    KilledRussianRoulette,
    KilledOverMaximumCollisions,
    KilledOverMaximumPathLength,
    /// No boundary and no finite free path along the current direction
    Lost,
}

impl PhotonStatus {
    pub fn is_alive(&self) -> bool {
        matches!(self, PhotonStatus::Alive)
    }
}

/// What happened at a recorded point of a photon's trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotonEvent {
    Launch,
    Collision,
    /// Transmitted into a neighbouring region
    Crossing,
    /// Fresnel reflected back into the current region
    Reflection,
    /// Left the tissue
    Exit,
    /// Survived roulette; the point carries the raised weight
    RouletteSurvival,
    /// Killed by roulette or a transport limit
    Killed,
}

/// State of a photon at the end of one trajectory segment.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotonDataPoint {
    pub position: Vector3<f64>,
    /// Direction after the event
    pub direction: Vector3<f64>,
    /// Weight after the event
    pub weight: f64,
    pub time: f64,
    /// Region the segment ending here was travelled in
    pub region: usize,
    pub event: PhotonEvent,
    /// Weight deposited along the segment and at the event
    pub absorbed_weight: f64,
}

/// Path length and real-collision count in one region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubRegionCollisionInfo {
    pub path_length: f64,
    pub collision_count: i64,
}

/// Per-region accounting of one photon, indexed like the tissue regions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollisionInfo {
    pub regions: Vec<SubRegionCollisionInfo>,
}

impl CollisionInfo {
    pub fn new(num_regions: usize) -> Self {
        Self {
            regions: vec![SubRegionCollisionInfo::default(); num_regions],
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn total_path_length(&self) -> f64 {
        self.regions.iter().map(|r| r.path_length).sum()
    }

    pub fn total_collisions(&self) -> i64 {
        self.regions.iter().map(|r| r.collision_count).sum()
    }
}

/// A photon packet and its random walk.
#[derive(Debug, Clone)]
pub struct Photon {
    pub position: Vector3<f64>,
    pub direction: Vector3<f64>,
    pub weight: f64,
    /// Time since launch in ns
    pub time: f64,
    pub region: usize,
    pub status: PhotonStatus,
    pub collision_info: CollisionInfo,
    /// Recorded trajectory; empty unless history recording is on.
    pub history: Vec<PhotonDataPoint>,
    /// Weight deposited in the tissue so far
    pub absorbed_weight: f64,
    last_tissue_region: usize,
    total_path_length: f64,
    total_collisions: u64,
    /// Optical depth left in the current free flight
    s_left: f64,
    zero_length_crossings: u32,
    record_history: bool,
}

impl Photon {
    pub fn new(
        position: Vector3<f64>,
        direction: Vector3<f64>,
        weight: f64,
        region: usize,
        num_regions: usize,
        record_history: bool,
    ) -> Self {
        let mut photon = Self {
            position,
            direction,
            weight,
            time: 0.0,
            region,
            status: PhotonStatus::Alive,
            collision_info: CollisionInfo::new(num_regions),
            history: Vec::new(),
            absorbed_weight: 0.0,
            last_tissue_region: region,
            total_path_length: 0.0,
            total_collisions: 0,
            s_left: 0.0,
            zero_length_crossings: 0,
            record_history,
        };
        photon.record(PhotonEvent::Launch, 0.0);
        photon
    }

    /// Last region inside the tissue the photon travelled in before terminating.
    pub fn final_tissue_region(&self) -> usize {
        self.last_tissue_region
    }

    pub fn total_path_length(&self) -> f64 {
        self.total_path_length
    }

    /// Run the random walk until the photon terminates.
    pub fn transport(&mut self, tissue: &Tissue, options: &SimulationOptions, rng: &mut SimulationRng) {
        while self.status.is_alive() {
            self.step(tissue, options, rng);
            if self.status.is_alive() {
                self.test_termination(options, rng);
            }
        }
    }

    /// One free flight ending at either a real collision or a boundary.
    pub fn step(&mut self, tissue: &Tissue, options: &SimulationOptions, rng: &mut SimulationRng) {
        let awt = options.absorption_weighting_type;
        let ops = tissue.region(self.region).ops;
        let mu = ops.interaction_coefficient(awt);
        let s = self.step_size(mu, rng);

        match tissue.distance_to_boundary(&self.position, &self.direction, self.region) {
            Some(hit) if hit.distance <= s => {
                // carry the unused optical depth into the next region
                if mu > 0.0 {
                    self.s_left = (self.s_left - hit.distance * mu).max(0.0);
                }
                if hit.distance > 0.0 {
                    self.zero_length_crossings = 0;
                } else {
                    self.zero_length_crossings += 1;
                    if self.zero_length_crossings > MAX_ZERO_LENGTH_CROSSINGS {
                        warn!("photon stuck on a boundary at {:?}, marking it lost", self.position);
                        self.status = PhotonStatus::Lost;
                        self.record(PhotonEvent::Killed, 0.0);
                        return;
                    }
                }
                let absorbed = self.advance(hit.distance, &ops, awt);
                self.cross_boundary(tissue, hit, absorbed, rng);
            }
            _ if !s.is_finite() => {
                warn!(
                    "photon in region {} has neither a boundary nor a finite free path, marking it lost",
                    self.region
                );
                self.status = PhotonStatus::Lost;
                self.record(PhotonEvent::Killed, 0.0);
            }
            _ => {
                self.zero_length_crossings = 0;
                self.s_left = 0.0;
                let absorbed = self.advance(s, &ops, awt);
                self.collide(&ops, options, absorbed, rng);
            }
        }
    }

    /// Free path for this step. A new optical depth is drawn only when
    /// nothing was carried over from the previous region.
    fn step_size(&mut self, mu: f64, rng: &mut SimulationRng) -> f64 {
        if self.s_left == 0.0 {
            self.s_left = -rng.uniform_open().ln();
        }
        self.s_left / mu
    }

    /// Move along the current direction, returning the weight absorbed on the way.
    fn advance(&mut self, distance: f64, ops: &OpticalProperties, awt: AbsorptionWeightingType) -> f64 {
        self.position += self.direction * distance;
        self.time += distance * ops.n / SPEED_OF_LIGHT;
        self.collision_info.regions[self.region].path_length += distance;
        self.total_path_length += distance;
        let (weight, absorbed) = awt.attenuate_along_path(self.weight, ops, distance);
        self.weight = weight;
        self.absorbed_weight += absorbed;
        absorbed
    }

    fn collide(&mut self, ops: &OpticalProperties, options: &SimulationOptions, absorbed: f64, rng: &mut SimulationRng) {
        self.collision_info.regions[self.region].collision_count += 1;
        self.total_collisions += 1;
        match options.absorption_weighting_type.collide(self.weight, ops, rng) {
            CollisionOutcome::Scattered { weight, absorbed: deposited } => {
                self.weight = weight;
                self.absorbed_weight += deposited;
                if self.weight <= 0.0 {
                    self.status = PhotonStatus::Absorbed;
                } else {
                    self.direction = scatter(options.phase_function_type, &self.direction, ops.g, rng);
                }
                self.record(PhotonEvent::Collision, absorbed + deposited);
            }
            CollisionOutcome::Absorbed { absorbed: deposited } => {
                self.weight = 0.0;
                self.absorbed_weight += deposited;
                self.status = PhotonStatus::Absorbed;
                self.record(PhotonEvent::Collision, absorbed + deposited);
            }
        }
    }

    /// Fresnel reflect or transmit at the boundary the photon has just reached.
    fn cross_boundary(&mut self, tissue: &Tissue, hit: BoundaryHit, absorbed: f64, rng: &mut SimulationRng) {
        let to = match hit.crossing {
            Crossing::BoundingVolume => {
                self.status = PhotonStatus::ExitedBoundingVolume;
                self.record(PhotonEvent::Exit, absorbed);
                return;
            }
            Crossing::Exit { to } | Crossing::Enter { to } => to,
        };
        let n1 = tissue.region(self.region).ops.n;
        let n2 = tissue.region(to).ops.n;
        let normal = tissue.boundary_normal(&self.position, &self.direction, self.region, hit.crossing);
        let (reflectance, cos_t) = fresnel(n1, n2, self.direction.dot(&normal));

        if reflectance > 0.0 && rng.uniform() < reflectance {
            self.direction = reflect(&self.direction, &normal);
            self.record(PhotonEvent::Reflection, absorbed);
            return;
        }
        if n1 != n2 {
            self.direction = refract(&self.direction, &normal, n1 / n2, cos_t);
        }
        let from = self.region;
        self.region = to;
        if to == tissue.top_ambient_index() {
            self.status = PhotonStatus::ExitedTop;
        } else if to == tissue.bottom_ambient_index() {
            self.status = PhotonStatus::ExitedBottom;
        } else {
            self.last_tissue_region = to;
        }
        let event = if self.status.is_alive() {
            PhotonEvent::Crossing
        } else {
            PhotonEvent::Exit
        };
        // the segment was travelled in the region just left
        self.record_in(event, absorbed, from);
    }

    fn test_termination(&mut self, options: &SimulationOptions, rng: &mut SimulationRng) {
        if self.total_collisions > options.max_collisions {
            warn!("photon exceeded {} collisions, killing it", options.max_collisions);
            self.status = PhotonStatus::KilledOverMaximumCollisions;
            self.record(PhotonEvent::Killed, 0.0);
            return;
        }
        if self.total_path_length > options.max_path_length {
            warn!("photon exceeded path length {} mm, killing it", options.max_path_length);
            self.status = PhotonStatus::KilledOverMaximumPathLength;
            self.record(PhotonEvent::Killed, 0.0);
            return;
        }
        let threshold = options.russian_roulette_weight_threshold;
        if options.absorption_weighting_type != AbsorptionWeightingType::Analog
            && threshold > 0.0
            && self.weight < threshold
        {
            let chance = options.russian_roulette_survival_probability;
            if rng.uniform() < chance {
                self.weight /= chance;
                // the event that triggered roulette keeps its own weight
                self.record(PhotonEvent::RouletteSurvival, 0.0);
            } else {
                debug!("photon with weight {:e} lost at roulette", self.weight);
                self.weight = 0.0;
                self.status = PhotonStatus::KilledRussianRoulette;
                self.record(PhotonEvent::Killed, 0.0);
            }
        }
    }

    fn record(&mut self, event: PhotonEvent, absorbed_weight: f64) {
        self.record_in(event, absorbed_weight, self.region);
    }

    fn record_in(&mut self, event: PhotonEvent, absorbed_weight: f64, region: usize) {
        if !self.record_history {
            return;
        }
        self.history.push(PhotonDataPoint {
            position: self.position,
            direction: self.direction,
            weight: self.weight,
            time: self.time,
            region,
            event,
            absorbed_weight,
        });
    }
}
