// Inclusions and bounding volumes keep the weight books balanced

use turbid::{
    AbsorptionWeightingType, DetectorInput, DetectorKind, MonteCarloSimulation, OpticalProperties, PhotonStatus,
    RegionShape, SimulationInput, TissueInput, TissueRegion,
};

fn layers(thickness: f64) -> Vec<TissueRegion> {
    vec![
        TissueRegion::layer(f64::NEG_INFINITY, 0.0, OpticalProperties::air()),
        TissueRegion::layer(0.0, thickness, OpticalProperties::from_reduced_scattering(0.05, 1.0, 0.8, 1.4)),
        TissueRegion::layer(thickness, f64::INFINITY, OpticalProperties::air()),
    ]
}

fn analog(tissue: TissueInput, detectors: Vec<DetectorInput>) -> SimulationInput {
    let mut input = SimulationInput {
        n: 1000,
        tissue,
        detectors,
        ..SimulationInput::default()
    };
    input.options.absorption_weighting_type = AbsorptionWeightingType::Analog;
    input.options.seed = 17;
    input
}

#[test]
fn test_ellipsoid_inclusion_conserves_weight() {
    let _ = env_logger::builder().is_test(true).try_init();
    let tissue = TissueInput::MultiLayerWithInclusions {
        layers: layers(10.0),
        inclusions: vec![TissueRegion::new(
            RegionShape::Ellipsoid {
                center: [0.0, 0.0, 5.0],
                dx: 2.0,
                dy: 2.0,
                dz: 1.0,
            },
            OpticalProperties::from_reduced_scattering(0.5, 2.0, 0.8, 1.4),
        )],
    };
    let output = MonteCarloSimulation::new(analog(tissue, SimulationInput::default().detectors))
        .unwrap()
        .run();
    assert!((output.total_weight() - 1.0).abs() < 1e-9, "total {}", output.total_weight());
}

#[test]
fn test_bounding_cylinder_loss_is_tallied() {
    let tissue = TissueInput::BoundingCylinder {
        layers: layers(10.0),
        bounding: RegionShape::Cylinder {
            center: [0.0, 0.0, 5.0],
            radius: 3.0,
            height: 10.0,
        },
    };
    let detectors = vec![
        DetectorInput::new(DetectorKind::RDiffuse),
        DetectorInput::new(DetectorKind::ATotalBoundingVolume),
    ];
    let output = MonteCarloSimulation::new(analog(tissue, detectors)).unwrap().run();
    let loss = output.detector("ATotalBoundingVolume").unwrap().mean[0];
    assert!(loss > 0.0);
    assert!((loss - output.bounding_volume_loss).abs() < 1e-12);
    assert!(output.status_count(PhotonStatus::ExitedBoundingVolume) > 0);
    assert!((output.total_weight() - 1.0).abs() < 1e-9, "total {}", output.total_weight());
}

#[test]
fn test_bounding_volume_detector_needs_a_bounding_volume() {
    let input = analog(
        TissueInput::MultiLayer { layers: layers(10.0) },
        vec![DetectorInput::new(DetectorKind::ATotalBoundingVolume)],
    );
    assert!(MonteCarloSimulation::new(input).is_err());
}
