use crate::nyx::linalg::{DVector, Vector3};
use crate::nyx::od::prelude::*;
use crate::{
    position_link, test_epoch, test_estimator, test_schedule, test_station,
    tracking_link, truth_parameters, vehicle_parameters, LinearMotionProvider,
};
use rstest::*;

#[fixture]
fn station() -> GroundStation {
    test_station()
}

/// Relative position of the vehicle with respect to the station in the truth scenario
fn truth_relative_position(station: &GroundStation, epoch: Epoch) -> Vector3<f64> {
    let dt = (epoch - test_epoch()).to_seconds();
    let gs = station.state_at(epoch);
    Vector3::new(7000e3 - gs[0], 7500.0 * dt, 0.5 * 1e-2 * dt * dt)
}

#[rstest]
fn elevation_mask_filters_tracking(station: GroundStation) {
    let _ = pretty_env_logger::try_init();

    let bls = test_estimator(vehicle_parameters());
    let schedule = test_schedule(&station);
    let batch = bls
        .simulator()
        .simulate_observations(&truth_parameters(), &schedule, None)
        .unwrap();

    // Positions are not constrained
    assert_eq!(
        batch.get(ObservableType::Position, &position_link()).unwrap().len(),
        11
    );

    let scheduled = &schedule
        .get(ObservableType::OneWayRange, &tracking_link(&station))
        .unwrap()
        .epochs;
    let ranges = batch
        .get(ObservableType::OneWayRange, &tracking_link(&station))
        .unwrap();

    // The vehicle sets below 10 degrees between 470 and 480 seconds
    assert_eq!(ranges.len(), 48);
    assert_eq!(ranges.epochs.last(), Some(&(test_epoch() + 470.seconds())));

    for epoch in scheduled {
        let rel = truth_relative_position(&station, *epoch);
        let elevation_deg = station.elevation_deg(&rel, *epoch);
        let kept = ranges.epochs.iter().position(|e| e == epoch);
        assert_eq!(kept.is_some(), elevation_deg > 10.0, "{epoch} at {elevation_deg} deg");
        if let Some(idx) = kept {
            // Values stay attached to their epochs
            assert!((ranges.values[idx][0] - rel.norm()).abs() < 1e-6);
        }
    }

    // Both observables of the tracking link share the constraint
    let angles = batch
        .get(ObservableType::AngularPosition, &tracking_link(&station))
        .unwrap();
    assert_eq!(angles.epochs, ranges.epochs);
    assert_eq!(batch.num_observations(), 11 * 3 + 48 + 48 * 2);
}

#[rstest]
fn unconstrained_simulation_keeps_all_epochs(station: GroundStation) {
    let _ = pretty_env_logger::try_init();

    let params = vehicle_parameters();
    let bls = BatchLeastSquares::builder()
        .provider(LinearMotionProvider::new(params.clone(), vec![station.clone()]))
        .models(ObservationModels::all_geometric())
        .parameters(params)
        .build();

    let schedule = test_schedule(&station);
    let batch = bls
        .simulator()
        .simulate_observations(&truth_parameters(), &schedule, None)
        .unwrap();
    assert_eq!(batch.num_epochs(), schedule.num_epochs());
}

#[rstest]
#[case(0)]
#[case(42)]
fn seeded_noise_is_reproducible(station: GroundStation, #[case] seed: u64) {
    let _ = pretty_env_logger::try_init();

    let bls = test_estimator(vehicle_parameters());
    let schedule = test_schedule(&station);
    let simulate = || {
        let mut noise = SimulationNoise::with_seed(seed)
            .with(ObservableType::Position, WhiteNoise::constant_white_noise(1.0))
            .and_then(|n| n.with(ObservableType::OneWayRange, WhiteNoise::constant_white_noise(2.0)))
            .unwrap();
        bls.simulator()
            .simulate_observations(&truth_parameters(), &schedule, Some(&mut noise))
            .unwrap()
    };

    let first = simulate();
    assert_eq!(first, simulate());

    let clean = bls
        .simulator()
        .simulate_observations(&truth_parameters(), &schedule, None)
        .unwrap();
    // Noise is added after the viability filtering, so the epochs are identical
    for (observable, link_ends, series) in clean.iter() {
        let noisy = first.get(observable, link_ends).unwrap();
        assert_eq!(noisy.epochs, series.epochs);
        if observable == ObservableType::AngularPosition {
            assert_eq!(noisy.values, series.values);
        } else {
            assert_ne!(noisy.values, series.values);
        }
    }
}

#[rstest]
fn parameter_vector_is_checked(station: GroundStation) {
    let bls = test_estimator(vehicle_parameters());
    assert!(matches!(
        bls.simulator()
            .simulate_observations(&DVector::zeros(6), &test_schedule(&station), None),
        Err(ODError::DimensionMismatch { expected: 9, got: 6, .. })
    ));
}
