use crate::nyx::linalg::DVector;
use crate::nyx::od::prelude::*;
use crate::{
    perturbed_parameters, position_link, test_estimator, test_schedule, test_station, test_weights,
    tracking_link, truth_parameters, vehicle_parameters, LinearMotionProvider, VEHICLE,
};
use rstest::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[fixture]
fn bls() -> BatchLeastSquares<LinearMotionProvider> {
    test_estimator(vehicle_parameters())
}

#[fixture]
fn observations(bls: BatchLeastSquares<LinearMotionProvider>) -> ObservationBatch {
    bls.simulator()
        .simulate_observations(&truth_parameters(), &test_schedule(&test_station()), None)
        .unwrap()
}

fn checker() -> ConvergenceChecker {
    ConvergenceChecker::builder()
        .max_iterations(10)
        .min_rms_improvement(1e-9)
        .build()
}

fn range_bias() -> EstimableParameter {
    EstimableParameter::ObservationBias {
        observable: ObservableType::OneWayRange,
        link_ends: tracking_link(&test_station()),
        kind: BiasKind::Absolute,
    }
}

#[rstest]
fn tight_apriori_pins_the_reference(bls: BatchLeastSquares<LinearMotionProvider>, observations: ObservationBatch) {
    let _ = pretty_env_logger::try_init();

    let initial = perturbed_parameters();
    let apriori = AprioriInformation::from_sigmas(&DVector::from_element(9, 1e-9));
    let input = EstimationInput::new(
        &bls.parameters,
        observations.clone(),
        initial.clone(),
        test_weights(),
        Some(apriori.clone()),
        EstimationOptions::default(),
    )
    .unwrap();
    let output = bls.estimate_parameters(&input, &checker()).unwrap();
    let moved = (&output.parameter_estimate - &initial).norm();
    assert!(
        moved < 1e-3 * (truth_parameters() - &initial).norm(),
        "estimate moved by {moved}"
    );

    // The same prior, centered on the truth instead, pulls the estimate to the truth
    let offset = &initial - truth_parameters();
    let input = EstimationInput::new(
        &bls.parameters,
        observations,
        initial,
        test_weights(),
        Some(apriori.with_offset(offset)),
        EstimationOptions::default(),
    )
    .unwrap();
    let output = bls.estimate_parameters(&input, &checker()).unwrap();
    let err = &output.parameter_estimate - truth_parameters();
    assert!(err.rows(0, 3).norm() < 1e-3, "position error {}", err.rows(0, 3).norm());
}

#[test]
fn estimates_range_bias() {
    let _ = pretty_env_logger::try_init();

    // Initial states are always first in the parameter vector
    let parameters = ParameterSet::new(vec![
        EstimableParameter::ConstantEmpiricalAcceleration {
            body: VEHICLE.to_string(),
        },
        range_bias(),
        EstimableParameter::InitialState {
            body: VEHICLE.to_string(),
        },
    ])
    .unwrap();
    assert_eq!(parameters.len(), 10);
    let bls = test_estimator(parameters);

    let mut truth = truth_parameters().push(5.0);
    let observations = bls
        .simulator()
        .simulate_observations(&truth, &test_schedule(&test_station()), None)
        .unwrap();

    let initial = perturbed_parameters().push(0.0);
    let input = EstimationInput::new(
        &bls.parameters,
        observations,
        initial,
        test_weights(),
        None,
        EstimationOptions::default(),
    )
    .unwrap();
    let output = bls.estimate_parameters(&input, &checker()).unwrap();
    println!("{output}");

    assert!((output.parameter_estimate[9] - 5.0).abs() < 1e-6);
    truth[9] = output.parameter_estimate[9];
    assert!((&output.parameter_estimate - &truth).rows(0, 3).norm() < 1e-3);
    assert_eq!(output.parameter_names.len(), 10);
}

#[rstest]
#[case(1)]
#[case(2)]
fn noisy_estimate_within_formal_errors(bls: BatchLeastSquares<LinearMotionProvider>, #[case] seed: u64) {
    let _ = pretty_env_logger::try_init();

    let mut noise = SimulationNoise::with_seed(seed)
        .with(ObservableType::Position, WhiteNoise::constant_white_noise(5.0))
        .and_then(|n| n.with(ObservableType::OneWayRange, WhiteNoise::constant_white_noise(2.0)))
        .and_then(|n| n.with(ObservableType::AngularPosition, WhiteNoise::constant_white_noise(1e-3)))
        .unwrap();
    let weights = WeightSpecification::from_noise(noise.noises());
    let observations = bls
        .simulator()
        .simulate_observations(&truth_parameters(), &test_schedule(&test_station()), Some(&mut noise))
        .unwrap();

    let input = EstimationInput::new(
        &bls.parameters,
        observations,
        perturbed_parameters(),
        weights,
        None,
        EstimationOptions::default(),
    )
    .unwrap();
    let output = bls.estimate_parameters(&input, &checker()).unwrap();
    println!("{output}");

    assert!(output.is_converged());
    // Weighted residuals are of the order of one
    let wrms = output.final_weighted_rms();
    assert!(wrms > 0.5 && wrms < 1.5, "weighted RMS {wrms}");

    let sigmas = output.formal_errors().unwrap();
    let err = &output.parameter_estimate - truth_parameters();
    for i in 0..9 {
        assert!(err[i].abs() < 6.0 * sigmas[i], "parameter {i}: error {} with sigma {}", err[i], sigmas[i]);
    }
}

#[rstest]
fn runs_are_deterministic(bls: BatchLeastSquares<LinearMotionProvider>, observations: ObservationBatch) {
    let input = EstimationInput::new(
        &bls.parameters,
        observations,
        perturbed_parameters(),
        test_weights(),
        None,
        EstimationOptions::default(),
    )
    .unwrap();
    let first = bls.estimate_parameters(&input, &checker()).unwrap();
    let second = bls.estimate_parameters(&input, &checker()).unwrap();
    assert_eq!(first.parameter_estimate, second.parameter_estimate);
    assert_eq!(first.weighted_rms_history(), second.weighted_rms_history());
}

#[rstest]
fn empty_batch_is_rejected(bls: BatchLeastSquares<LinearMotionProvider>) {
    assert!(matches!(
        EstimationInput::new(
            &bls.parameters,
            ObservationBatch::new(),
            perturbed_parameters(),
            test_weights(),
            None,
            EstimationOptions::default(),
        ),
        Err(ODError::EmptyBatch)
    ));
}

#[rstest]
fn mismatched_input_is_rejected(bls: BatchLeastSquares<LinearMotionProvider>, observations: ObservationBatch) {
    let mut input = EstimationInput::new(
        &bls.parameters,
        observations,
        perturbed_parameters(),
        test_weights(),
        None,
        EstimationOptions::default(),
    )
    .unwrap();
    input.initial_parameters = DVector::zeros(6);
    assert!(matches!(
        bls.estimate_parameters(&input, &checker()),
        Err(BLSError::InvalidInput {
            source: ODError::DimensionMismatch { .. }
        })
    ));

    input.initial_parameters = perturbed_parameters();
    input.weights = WeightSpecification::PerObservable {
        weights: [(ObservableType::Position, 1.0)].into_iter().collect(),
    };
    assert!(matches!(
        bls.estimate_parameters(&input, &checker()),
        Err(BLSError::InvalidInput {
            source: ODError::WeightNotConfigured { .. }
        })
    ));
    // Everything checked when building the input is checked again by the estimator
    input.weights = WeightSpecification::Constant { weight: -1.0 };
    assert!(matches!(
        bls.estimate_parameters(&input, &checker()),
        Err(BLSError::InvalidInput {
            source: ODError::InvalidWeight { .. }
        })
    ));

    input.weights = test_weights();
    let mut asymmetric = AprioriInformation::none(9);
    asymmetric.inverse_covariance[(0, 1)] = 1.0;
    input.apriori = asymmetric;
    assert!(matches!(
        bls.estimate_parameters(&input, &checker()),
        Err(BLSError::InvalidInput {
            source: ODError::AsymmetricApriori
        })
    ));

    input.apriori = AprioriInformation::none(9);
    input.observations = ObservationBatch::new();
    assert!(matches!(
        bls.estimate_parameters(&input, &checker()),
        Err(BLSError::InvalidInput {
            source: ODError::EmptyBatch
        })
    ));
}

#[rstest]
fn unobservable_parameter_is_singular(observations: ObservationBatch) {
    let _ = pretty_env_logger::try_init();

    // No observation of this link, so its bias is not observable
    let other = LinkEnds::one_way(LinkEndId::station("Earth", "Other"), LinkEndId::body(VEHICLE));
    let parameters = ParameterSet::new(vec![
        EstimableParameter::InitialState {
            body: VEHICLE.to_string(),
        },
        EstimableParameter::ConstantEmpiricalAcceleration {
            body: VEHICLE.to_string(),
        },
        EstimableParameter::ObservationBias {
            observable: ObservableType::OneWayRange,
            link_ends: other,
            kind: BiasKind::Absolute,
        },
    ])
    .unwrap();
    let bls = test_estimator(parameters);
    let input = EstimationInput::new(
        &bls.parameters,
        observations,
        perturbed_parameters().push(0.0),
        test_weights(),
        None,
        EstimationOptions::default(),
    )
    .unwrap();
    assert!(matches!(
        bls.estimate_parameters(&input, &checker()),
        Err(BLSError::SingularMatrix { iteration: 1, .. })
    ));
}

#[rstest]
fn no_viable_observation(observations: ObservationBatch) {
    let _ = pretty_env_logger::try_init();

    // Only keep the tracking data, and raise the mask so that none of it is viable
    let mut tracking = ObservationBatch::new();
    let link = tracking_link(&test_station());
    tracking
        .insert(
            ObservableType::OneWayRange,
            link.clone(),
            observations.get(ObservableType::OneWayRange, &link).unwrap().clone(),
        )
        .unwrap();

    let station = test_station().with_elevation_mask(90.0);
    let mut viability = ViabilityCalculatorSet::new();
    let mask: Arc<dyn ViabilityCalculator> = Arc::new(Arc::new(station.clone()).elevation_viability(0, 1));
    viability.register(link, vec![mask]).unwrap();

    let parameters = vehicle_parameters();
    let bls = BatchLeastSquares::builder()
        .provider(LinearMotionProvider::new(parameters.clone(), vec![station]))
        .models(ObservationModels::all_geometric())
        .viability(viability)
        .parameters(parameters)
        .build();

    let input = EstimationInput::new(
        &bls.parameters,
        tracking,
        perturbed_parameters(),
        test_weights(),
        None,
        EstimationOptions::default(),
    )
    .unwrap();
    assert!(matches!(
        bls.estimate_parameters(&input, &checker()),
        Err(BLSError::NoObservations { iteration: 1 })
    ));
}

#[rstest]
fn missing_model_reports_segment(observations: ObservationBatch) {
    let parameters = vehicle_parameters();
    let station = test_station();
    let bls = BatchLeastSquares::builder()
        .provider(LinearMotionProvider::new(parameters.clone(), vec![station]))
        .models(ObservationModels::geometric(&[ObservableType::Position]))
        .parameters(parameters)
        .build();

    let input = EstimationInput::new(
        &bls.parameters,
        observations,
        perturbed_parameters(),
        test_weights(),
        None,
        EstimationOptions::default(),
    )
    .unwrap();
    match bls.estimate_parameters(&input, &checker()) {
        Err(BLSError::SegmentFailure {
            iteration,
            observable,
            source,
            ..
        }) => {
            assert_eq!(iteration, 1);
            assert_ne!(observable, ObservableType::Position);
            assert!(matches!(source, ODError::ModelNotConfigured { .. }));
        }
        other => panic!("expected a segment failure, got {other:?}"),
    }
}

#[rstest]
fn cancelled_before_first_iteration(observations: ObservationBatch) {
    let parameters = vehicle_parameters();
    let cancel = Arc::new(AtomicBool::new(true));
    let bls = BatchLeastSquares::builder()
        .provider(LinearMotionProvider::new(parameters.clone(), vec![test_station()]))
        .models(ObservationModels::all_geometric())
        .parameters(parameters)
        .cancel(cancel)
        .build();

    let input = EstimationInput::new(
        &bls.parameters,
        observations,
        perturbed_parameters(),
        test_weights(),
        None,
        EstimationOptions::default(),
    )
    .unwrap();
    assert!(matches!(
        bls.estimate_parameters(&input, &checker()),
        Err(BLSError::Cancelled { iteration: 1 })
    ));
}

#[test]
fn position_only_tracking() {
    let _ = pretty_env_logger::try_init();

    let bls = test_estimator(vehicle_parameters());
    let mut schedule = ObservationSchedule::new();
    let start = crate::test_epoch();
    schedule
        .insert_inclusive(
            ObservableType::Position,
            position_link(),
            start,
            start + 10.minutes(),
            30.seconds(),
            LinkEndType::ObservedBody,
        )
        .unwrap();
    let observations = bls
        .simulator()
        .simulate_observations(&truth_parameters(), &schedule, None)
        .unwrap();

    let input = EstimationInput::new(
        &bls.parameters,
        observations,
        perturbed_parameters(),
        WeightSpecification::Constant { weight: 1.0 },
        None,
        EstimationOptions::default(),
    )
    .unwrap();
    // Position observations are linear in the parameters: a single correction recovers the truth
    let output = bls
        .estimate_parameters(&input, &ConvergenceChecker::with_max_iterations(1))
        .unwrap();
    let err = &output.parameter_estimate - truth_parameters();
    assert!(err.norm() < 1e-6, "error {}", err.norm());
    assert!(output.postfit_weighted_rms.unwrap() < 1e-6);
}
