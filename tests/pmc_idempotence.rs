// Post-processing a stored database must reproduce the live run

use tempfile::TempDir;
use turbid::{
    DatabaseType, DetectorInput, DetectorKind, DoubleRange, MonteCarloSimulation, OpticalProperties,
    PerturbationInput, PhotonDatabasePostProcessor, SimulationInput, TissueInput,
};

fn tissue_ops() -> OpticalProperties {
    OpticalProperties::from_reduced_scattering(0.01, 1.0, 0.8, 1.4)
}

fn rho() -> DoubleRange {
    DoubleRange::new(0.0, 10.0, 21)
}

fn reference_ops() -> Vec<OpticalProperties> {
    vec![OpticalProperties::air(), tissue_ops(), OpticalProperties::air()]
}

fn perturbation(mua: f64) -> PerturbationInput {
    let mut ops = reference_ops();
    ops[1].mua = mua;
    PerturbationInput {
        perturbed_ops: ops,
        perturbed_regions_indices: vec![1],
    }
}

fn input(workers: usize) -> SimulationInput {
    let mut input = SimulationInput {
        n: 500,
        tissue: TissueInput::single_layer(tissue_ops(), 20.0),
        detectors: vec![
            DetectorInput::new(DetectorKind::ROfRho { rho: rho() }),
            DetectorInput::new(DetectorKind::PMCROfRho {
                rho: rho(),
                perturbation: perturbation(0.01),
            })
            .with_name("live pMC"),
        ],
        ..SimulationInput::default()
    };
    input.options.number_of_workers = workers;
    input.options.databases = vec![DatabaseType::DiffuseReflectance];
    input
}

#[test]
fn test_zero_perturbation_reproduces_live_tally() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let sim = MonteCarloSimulation::new(input(2)).unwrap();
    let output = sim.run_and_write_databases(dir.path()).unwrap();
    let live = output.detector("ROfRho").unwrap();

    let post = PhotonDatabasePostProcessor::from_dir(dir.path(), DatabaseType::DiffuseReflectance).unwrap();
    assert_eq!(post.database().header().photons_launched, 500);
    let results = post
        .run(&[DetectorInput::new(DetectorKind::PMCROfRho {
            rho: rho(),
            perturbation: perturbation(0.01),
        })])
        .unwrap();
    for (a, b) in live.mean.iter().zip(&results[0].mean) {
        assert!((a - b).abs() < 1e-10, "live {} vs post-processed {}", a, b);
    }
    assert_eq!(results[0].rejected_contributions, 0);

    // the live pMC detector agrees too
    let live_pmc = output.detector("live pMC").unwrap();
    for (a, b) in live.mean.iter().zip(&live_pmc.mean) {
        assert!((a - b).abs() < 1e-10);
    }
}

#[test]
fn test_in_memory_database_matches_file() {
    let dir = TempDir::new().unwrap();
    let sim = MonteCarloSimulation::new(input(1)).unwrap();
    sim.run_and_write_databases(dir.path()).unwrap();
    let (_, databases) = sim.run_with_databases(&turbid::CancellationToken::new());
    let from_file = turbid::PhotonDatabase::read(dir.path(), DatabaseType::DiffuseReflectance).unwrap();
    assert_eq!(databases.len(), 1);
    let db = &databases[0];
    assert!(!db.is_empty());
    assert_eq!(db.header().record_count, from_file.header().record_count);
    assert_eq!(db.header().photons_launched, from_file.header().photons_launched);
    assert_eq!(db.records(), from_file.records());
    assert_eq!(db.collision_info(), from_file.collision_info());
}

#[test]
fn test_dmc_matches_finite_difference_of_pmc() {
    let dir = TempDir::new().unwrap();
    MonteCarloSimulation::new(input(1))
        .unwrap()
        .run_and_write_databases(dir.path())
        .unwrap();
    let post = PhotonDatabasePostProcessor::from_dir(dir.path(), DatabaseType::DiffuseReflectance).unwrap();
    let delta = 1e-5;
    let results = post
        .run(&[
            DetectorInput::new(DetectorKind::PMCROfRho {
                rho: rho(),
                perturbation: perturbation(0.01 + delta),
            })
            .with_name("plus"),
            DetectorInput::new(DetectorKind::PMCROfRho {
                rho: rho(),
                perturbation: perturbation(0.01 - delta),
            })
            .with_name("minus"),
            DetectorInput::new(DetectorKind::DMCdROfRhodMua {
                rho: rho(),
                perturbation: perturbation(0.01),
            }),
        ])
        .unwrap();
    for i in 0..rho().num_bins() {
        let fd = (results[0].mean[i] - results[1].mean[i]) / (2.0 * delta);
        let dmc = results[2].mean[i];
        assert!(dmc <= 0.0);
        assert!((fd - dmc).abs() <= 1e-3 * dmc.abs() + 1e-12, "bin {}: fd {} vs dMC {}", i, fd, dmc);
    }
}

#[test]
fn test_more_absorption_lowers_reflectance() {
    let dir = TempDir::new().unwrap();
    MonteCarloSimulation::new(input(1))
        .unwrap()
        .run_and_write_databases(dir.path())
        .unwrap();
    let post = PhotonDatabasePostProcessor::from_dir(dir.path(), DatabaseType::DiffuseReflectance).unwrap();
    let results = post
        .run(&[
            DetectorInput::new(DetectorKind::PMCROfRho {
                rho: rho(),
                perturbation: perturbation(0.01),
            })
            .with_name("reference"),
            DetectorInput::new(DetectorKind::PMCROfRho {
                rho: rho(),
                perturbation: perturbation(0.05),
            })
            .with_name("absorbing"),
        ])
        .unwrap();
    for (reference, absorbing) in results[0].mean.iter().zip(&results[1].mean) {
        assert!(absorbing <= reference);
    }
}
