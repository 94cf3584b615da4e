use crate::error::Result;
use crate::input::SimulationInput;
use crate::output::SimulationOutput;
use crate::photon::{Photon, PhotonStatus};
use crate::pmc::PhotonDatabase;
use crate::random::SimulationRng;
use crate::settings::DatabaseType;
use crate::source::{Launch, Source};
use crate::tissue::Tissue;
use crate::virtual_boundary::VirtualBoundaryController;
use log::{debug, info};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop signal, checked before every photon launch.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything one worker accumulates over its share of photons.
struct WorkerTally {
    controller: VirtualBoundaryController,
    databases: Vec<PhotonDatabase>,
    status_counts: BTreeMap<PhotonStatus, u64>,
    launched: u64,
    rd: f64,
    td: f64,
    atot: f64,
    rspec: f64,
    bounding_volume_loss: f64,
}

impl WorkerTally {
    fn record(&mut self, photon: &Photon, specular_reflectance: f64) {
        self.launched += 1;
        self.rspec += specular_reflectance;
        self.atot += photon.absorbed_weight;
        match photon.status {
            PhotonStatus::ExitedTop => self.rd += photon.weight,
            PhotonStatus::ExitedBottom => self.td += photon.weight,
            PhotonStatus::ExitedBoundingVolume => self.bounding_volume_loss += photon.weight,
            _ => {}
        }
        *self.status_counts.entry(photon.status).or_insert(0) += 1;
        self.controller.tally_photon(photon);
        for db in &mut self.databases {
            let wanted = match db.database_type() {
                DatabaseType::DiffuseReflectance => PhotonStatus::ExitedTop,
                DatabaseType::DiffuseTransmittance => PhotonStatus::ExitedBottom,
            };
            if photon.status == wanted {
                db.push(photon);
            }
        }
    }

    fn merge(&mut self, other: WorkerTally) {
        self.controller.merge(&other.controller);
        for (mine, theirs) in self.databases.iter_mut().zip(other.databases) {
            mine.append(theirs);
        }
        for (status, count) in other.status_counts {
            *self.status_counts.entry(status).or_insert(0) += count;
        }
        self.launched += other.launched;
        self.rd += other.rd;
        self.td += other.td;
        self.atot += other.atot;
        self.rspec += other.rspec;
        self.bounding_volume_loss += other.bounding_volume_loss;
    }
}

/// A validated simulation ready to run.
#[derive(Debug, Clone)]
pub struct MonteCarloSimulation {
    input: SimulationInput,
    tissue: Tissue,
    source: Source,
    controller: VirtualBoundaryController,
}

impl MonteCarloSimulation {
    /// Validate the input and build tissue, source and detectors.
    pub fn new(input: SimulationInput) -> Result<Self> {
        input.validate()?;
        let tissue = input.tissue.build()?;
        let source = Source::new(&input.source, &tissue)?;
        let controller = VirtualBoundaryController::new(
            &input.detectors,
            &tissue,
            input.options.absorption_weighting_type,
        )?;
        Ok(Self {
            input,
            tissue,
            source,
            controller,
        })
    }

    pub fn input(&self) -> &SimulationInput {
        &self.input
    }

    pub fn tissue(&self) -> &Tissue {
        &self.tissue
    }

    pub fn run(&self) -> SimulationOutput {
        self.run_with_cancellation(&CancellationToken::new())
    }

    /// Run until done or until `token` is cancelled; results are normalized
    /// by the photons actually launched.
    pub fn run_with_cancellation(&self, token: &CancellationToken) -> SimulationOutput {
        self.run_with_databases(token).0
    }

    /// Run and write the configured pMC databases into `dir`.
    pub fn run_and_write_databases(&self, dir: &Path) -> Result<SimulationOutput> {
        let (output, databases) = self.run_with_databases(&CancellationToken::new());
        std::fs::create_dir_all(dir)?;
        for db in &databases {
            db.write(dir)?;
        }
        Ok(output)
    }

    /// Run and keep the configured pMC databases in memory.
    pub fn run_with_databases(&self, token: &CancellationToken) -> (SimulationOutput, Vec<PhotonDatabase>) {
        let options = &self.input.options;
        let workers = options.resolved_workers();
        info!(
            "launching {} photons on {} workers ({:?} weighting, {} detectors)",
            self.input.n,
            workers,
            options.absorption_weighting_type,
            self.input.detectors.len()
        );

        let tallies: Vec<WorkerTally> = (0..workers)
            .into_par_iter()
            .map(|worker| self.run_worker(worker, workers, token))
            .collect();

        // fixed worker order keeps the sums reproducible
        let mut tallies = tallies.into_iter();
        let mut total = match tallies.next() {
            Some(first) => first,
            None => self.new_worker_tally(),
        };
        for tally in tallies {
            total.merge(tally);
        }

        let launched = total.launched;
        if token.is_cancelled() {
            info!("run cancelled after {} of {} photons", launched, self.input.n);
        }
        for db in &mut total.databases {
            db.set_photons_launched(launched);
        }
        let n = launched.max(1) as f64;
        let output = SimulationOutput {
            output_name: self.input.output_name.clone(),
            photons_launched: launched,
            detectors: total.controller.finalize(launched),
            rd: total.rd / n,
            td: total.td / n,
            atot: total.atot / n,
            rspec: total.rspec / n,
            bounding_volume_loss: total.bounding_volume_loss / n,
            status_counts: total.status_counts,
        };
        info!(
            "finished {} photons: Rd {:.6} Td {:.6} Atot {:.6} Rspec {:.6}",
            launched, output.rd, output.td, output.atot, output.rspec
        );
        (output, total.databases)
    }

    fn new_worker_tally(&self) -> WorkerTally {
        let awt = self.input.options.absorption_weighting_type;
        WorkerTally {
            controller: self.controller.clone(),
            databases: self
                .input
                .options
                .databases
                .iter()
                .map(|t| PhotonDatabase::new(*t, &self.tissue, awt))
                .collect(),
            status_counts: BTreeMap::new(),
            launched: 0,
            rd: 0.0,
            td: 0.0,
            atot: 0.0,
            rspec: 0.0,
            bounding_volume_loss: 0.0,
        }
    }

    fn run_worker(&self, worker: usize, workers: usize, token: &CancellationToken) -> WorkerTally {
        let options = &self.input.options;
        let (start, end) = photon_range(self.input.n, worker, workers);
        let mut rng = SimulationRng::for_stream(options.random_number_generator_type, options.seed, worker as u64);
        let record_history = self.controller.needs_history() || options.track_statistics;
        let mut tally = self.new_worker_tally();
        debug!("worker {} transporting photons {}..{}", worker, start, end);

        for _ in start..end {
            if token.is_cancelled() {
                break;
            }
            let Launch {
                mut photon,
                specular_reflectance,
            } = self.source.launch(&self.tissue, record_history, &mut rng);
            tally.controller.tally_specular(specular_reflectance);
            photon.transport(&self.tissue, options, &mut rng);
            tally.record(&photon, specular_reflectance);
        }
        debug!("worker {} done after {} photons", worker, tally.launched);
        tally
    }
}

/// Contiguous share of `n` photons for `worker` out of `workers`.
fn photon_range(n: u64, worker: usize, workers: usize) -> (u64, u64) {
    let share = |i: usize| (u128::from(n) * i as u128 / workers as u128) as u64;
    (share(worker), share(worker + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::{DetectorInput, DetectorKind};

    #[test]
    fn test_photon_ranges_cover_everything() {
        let ranges: Vec<(u64, u64)> = (0..3).map(|w| photon_range(10, w, 3)).collect();
        assert_eq!(ranges, vec![(0, 3), (3, 6), (6, 10)]);
        assert_eq!(photon_range(2, 3, 4), (1, 2));
    }

    #[test]
    fn test_invalid_input_fails_before_running() {
        let mut input = SimulationInput::default();
        input.detectors.push(DetectorInput::new(DetectorKind::ROfRho {
            rho: crate::ranges::DoubleRange::new(0.0, 1.0, 1),
        }));
        assert!(MonteCarloSimulation::new(input).is_err());
    }

    #[test]
    fn test_small_run_summary() {
        let input = SimulationInput {
            n: 200,
            ..SimulationInput::default()
        };
        let output = MonteCarloSimulation::new(input).unwrap().run();
        assert_eq!(output.photons_launched, 200);
        assert_eq!(output.status_counts.values().sum::<u64>(), 200);
        assert!(output.rd > 0.0 && output.rd < 1.0);
        let rd = output.detector("RDiffuse").unwrap().mean[0];
        assert!((rd - output.rd).abs() < 1e-12);
    }

    #[test]
    fn test_cancelled_run_launches_nothing() {
        let sim = MonteCarloSimulation::new(SimulationInput::default()).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let output = sim.run_with_cancellation(&token);
        assert_eq!(output.photons_launched, 0);
        assert_eq!(output.rd, 0.0);
    }
}
