// Weight launched must equal weight reflected, transmitted and absorbed

use turbid::{
    AbsorptionWeightingType, DetectorInput, DetectorKind, DoubleRange, MonteCarloSimulation, OpticalProperties,
    SimulationInput, TissueInput,
};

fn slab_input(awt: AbsorptionWeightingType, thickness: f64) -> SimulationInput {
    let mut input = SimulationInput {
        n: 1000,
        tissue: TissueInput::single_layer(OpticalProperties::from_reduced_scattering(0.1, 1.0, 0.8, 1.4), thickness),
        ..SimulationInput::default()
    };
    input.options.absorption_weighting_type = awt;
    input.options.seed = 11;
    input
}

#[test]
fn test_analog_conserves_weight_exactly() {
    let _ = env_logger::builder().is_test(true).try_init();
    let output = MonteCarloSimulation::new(slab_input(AbsorptionWeightingType::Analog, 5.0))
        .unwrap()
        .run();
    assert!((output.total_weight() - 1.0).abs() < 1e-9, "total {}", output.total_weight());
    assert!(output.rspec > 0.0);
}

#[test]
fn test_discrete_weighting_conserves_weight() {
    let output = MonteCarloSimulation::new(slab_input(AbsorptionWeightingType::Discrete, 5.0))
        .unwrap()
        .run();
    assert!((output.total_weight() - 1.0).abs() < 0.01, "total {}", output.total_weight());
}

#[test]
fn test_continuous_weighting_conserves_weight() {
    let output = MonteCarloSimulation::new(slab_input(AbsorptionWeightingType::Continuous, 5.0))
        .unwrap()
        .run();
    assert!((output.total_weight() - 1.0).abs() < 0.01, "total {}", output.total_weight());
}

#[test]
fn test_summary_matches_detectors() {
    let output = MonteCarloSimulation::new(slab_input(AbsorptionWeightingType::Discrete, 5.0))
        .unwrap()
        .run();
    let rd = output.detector("RDiffuse").unwrap().mean[0];
    let td = output.detector("TDiffuse").unwrap().mean[0];
    let atot = output.detector("ATotal").unwrap().mean[0];
    assert!((rd - output.rd).abs() < 1e-12);
    assert!((td - output.td).abs() < 1e-12);
    assert!((atot - output.atot).abs() < 1e-12);
}

#[test]
fn test_radial_integral_matches_total_reflectance() {
    let mut input = slab_input(AbsorptionWeightingType::Discrete, 5.0);
    input.detectors = vec![
        DetectorInput::new(DetectorKind::RDiffuse),
        DetectorInput::new(DetectorKind::ROfRho {
            rho: DoubleRange::new(0.0, 500.0, 5001),
        }),
    ];
    let output = MonteCarloSimulation::new(input).unwrap().run();
    let rd = output.detector("RDiffuse").unwrap().mean[0];
    let rho = DoubleRange::new(0.0, 500.0, 5001);
    let edges = rho.edges();
    let integral: f64 = output
        .detector("ROfRho")
        .unwrap()
        .mean
        .iter()
        .zip(edges.windows(2))
        .map(|(r, e)| r * std::f64::consts::PI * (e[1] * e[1] - e[0] * e[0]))
        .sum();
    assert!((integral - rd).abs() < 1e-9, "integral {} vs Rd {}", integral, rd);
}

#[test]
fn test_absorption_map_integrates_to_total() {
    let mut input = slab_input(AbsorptionWeightingType::Discrete, 5.0);
    let rho = DoubleRange::new(0.0, 1000.0, 101);
    let z = DoubleRange::new(0.0, 5.0, 11);
    input.detectors = vec![
        DetectorInput::new(DetectorKind::ATotal),
        DetectorInput::new(DetectorKind::AOfRhoAndZ { rho, z }),
    ];
    let output = MonteCarloSimulation::new(input).unwrap().run();
    let atot = output.detector("ATotal").unwrap().mean[0];
    let map = output.detector("AOfRhoAndZ").unwrap();
    let edges = rho.edges();
    let mut integral = 0.0;
    for (i, e) in edges.windows(2).enumerate() {
        let ring = std::f64::consts::PI * (e[1] * e[1] - e[0] * e[0]);
        for k in 0..10 {
            integral += map.get(&[i, k]).unwrap() * ring * z.delta();
        }
    }
    assert!((integral - atot).abs() < 1e-9 * atot.max(1.0), "integral {} vs Atot {}", integral, atot);
}

#[test]
fn test_fluence_times_absorption_matches_total_under_roulette() {
    let mut input = slab_input(AbsorptionWeightingType::Discrete, 5.0);
    input.tissue = TissueInput::single_layer(OpticalProperties::new(0.5, 1.0, 0.8, 1.4), 5.0);
    input.options.russian_roulette_weight_threshold = 0.09;
    input.options.russian_roulette_survival_probability = 0.1;
    let rho = DoubleRange::new(0.0, 1000.0, 101);
    let z = DoubleRange::new(0.0, 5.0, 11);
    input.detectors = vec![
        DetectorInput::new(DetectorKind::ATotal),
        DetectorInput::new(DetectorKind::FluenceOfRhoAndZ { rho, z }),
    ];
    let output = MonteCarloSimulation::new(input).unwrap().run();
    assert!(output.status_count(turbid::PhotonStatus::KilledRussianRoulette) > 0);
    let atot = output.detector("ATotal").unwrap().mean[0];
    let fluence = output.detector("FluenceOfRhoAndZ").unwrap();
    let edges = rho.edges();
    let mut integral = 0.0;
    for (i, e) in edges.windows(2).enumerate() {
        let ring = std::f64::consts::PI * (e[1] * e[1] - e[0] * e[0]);
        for k in 0..10 {
            integral += fluence.get(&[i, k]).unwrap() * ring * z.delta();
        }
    }
    let absorbed = 0.5 * integral;
    assert!((absorbed - atot).abs() < 1e-9 * atot.max(1.0), "mua * fluence {} vs Atot {}", absorbed, atot);
}
