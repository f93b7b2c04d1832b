use crate::nyx::linalg::Vector6;
use crate::nyx::od::prelude::*;
use crate::{test_epoch, test_station, tracking_link};
use rstest::*;
use std::sync::Arc;

#[fixture]
fn station() -> Arc<GroundStation> {
    Arc::new(test_station())
}

/// States of the station and of a target 1000 km away from it, at the provided elevation in its meridian plane.
fn geometry(station: &GroundStation, elevation_deg: f64) -> Vec<Vector6<f64>> {
    let gs = station.state_at(test_epoch());
    let (sin_el, cos_el) = elevation_deg.to_radians().sin_cos();
    let mut target = gs;
    target[0] += 1e6 * sin_el;
    target[1] += 1e6 * cos_el;
    vec![gs, target]
}

#[rstest]
fn unregistered_link_ends_are_viable(station: Arc<GroundStation>) {
    let _ = pretty_env_logger::try_init();

    let registry = ViabilityCalculatorSet::new();
    for elevation_deg in [-45.0, 0.0, 5.0, 89.0] {
        assert!(is_observation_viable(
            &geometry(&station, elevation_deg),
            &[test_epoch(); 2],
            &tracking_link(&station),
            &registry
        ));
    }
}

#[rstest]
#[case(5.0, false)]
#[case(9.99, false)]
#[case(15.0, true)]
#[case(80.0, true)]
fn elevation_above_mask(station: Arc<GroundStation>, #[case] elevation_deg: f64, #[case] viable: bool) {
    let _ = pretty_env_logger::try_init();

    let calc = MinimumElevationAngle::new(vec![(0, 1)], station.clone(), 10.0);
    let states = geometry(&station, elevation_deg);
    let epochs = [test_epoch(); 2];
    assert_eq!(calc.is_viable(&states, &epochs), viable);

    let calc: Arc<dyn ViabilityCalculator> = Arc::new(calc);
    let mut registry = ViabilityCalculatorSet::new();
    registry.register(tracking_link(&station), vec![calc]).unwrap();
    assert_eq!(
        is_observation_viable(&states, &epochs, &tracking_link(&station), &registry),
        viable
    );
    // Other link ends are not constrained
    let other = LinkEnds::one_way(LinkEndId::station("Earth", "Other"), LinkEndId::body("Vehicle"));
    assert!(is_observation_viable(&states, &epochs, &other, &registry));
}

#[rstest]
fn calculators_are_and_combined(station: Arc<GroundStation>) {
    let _ = pretty_env_logger::try_init();

    let low: Arc<dyn ViabilityCalculator> = Arc::new(MinimumElevationAngle::new(vec![(0, 1)], station.clone(), 10.0));
    let high: Arc<dyn ViabilityCalculator> = Arc::new(MinimumElevationAngle::new(vec![(0, 1)], station.clone(), 30.0));
    let epochs = [test_epoch(); 2];

    for elevation_deg in [5.0, 20.0, 45.0] {
        let states = geometry(&station, elevation_deg);
        let expected = elevation_deg > 30.0;
        assert_eq!(all_viable(&states, &epochs, &[low.clone(), high.clone()]), expected);
        // Order of the calculators does not change the outcome
        assert_eq!(all_viable(&states, &epochs, &[high.clone(), low.clone()]), expected);
    }
}

#[rstest]
fn registration_checks_indices(station: Arc<GroundStation>) {
    let mut registry = ViabilityCalculatorSet::new();
    let bad: Arc<dyn ViabilityCalculator> = Arc::new(station.clone().elevation_viability(0, 2));
    assert!(matches!(
        registry.register(tracking_link(&station), vec![bad]),
        Err(ODError::ViabilityIndex { index: 2, available: 2, .. })
    ));
    assert!(registry.is_empty());
}

#[test]
fn station_mask_from_configuration() {
    use crate::test_config;

    let stations = GroundStation::load_many(test_config("ground_stations.yaml")).unwrap();
    let station = Arc::new(stations[0].clone().non_rotating());
    let calc = station.clone().elevation_viability(0, 1);
    assert_eq!(calc.minimum_elevation_deg, 10.0);

    let epochs = [test_epoch(); 2];
    assert!(!calc.is_viable(&geometry(&station, 9.0), &epochs));
    assert!(calc.is_viable(&geometry(&station, 11.0), &epochs));
}

/// Two-way geometry of a rotating station: the station at the transmission epoch (#0), the vehicle (#1),
/// and the station again at the reception epoch (#2). The vehicle is fixed at twice the Earth radius on +X,
/// i.e. at zenith of the station at the reference epoch and below its horizon a quarter of a day later.
#[rstest]
#[case(false, false, true)]
#[case(true, false, false)]
#[case(false, true, false)]
#[case(true, true, false)]
fn each_pair_is_required(#[case] transmission_low: bool, #[case] reception_low: bool, #[case] viable: bool) {
    let _ = pretty_env_logger::try_init();

    let station = Arc::new(
        GroundStation::from_point("Station1".to_string(), 0.0, 0.0, 0.0, test_epoch()).with_elevation_mask(10.0),
    );
    let quarter_day = (90.0 / station.rotation_rate_deg_s).seconds();
    let epoch_of = |low: bool| if low { test_epoch() + quarter_day } else { test_epoch() + 10.seconds() };

    let epochs = [epoch_of(transmission_low), test_epoch(), epoch_of(reception_low)];
    let vehicle = Vector6::new(2.0 * station.body_radius_m, 0.0, 0.0, 0.0, 0.0, 0.0);
    let states = [station.state_at(epochs[0]), vehicle, station.state_at(epochs[2])];

    // Each pair taken alone follows its own geometry
    for (pair, low) in [((0, 1), transmission_low), ((2, 1), reception_low)] {
        let single = MinimumElevationAngle::new(vec![pair], station.clone(), 10.0);
        assert_eq!(single.is_viable(&states, &epochs), !low, "pair {pair:?}");
    }

    let both = MinimumElevationAngle::new(vec![(0, 1), (2, 1)], station.clone(), 10.0);
    assert_eq!(both.is_viable(&states, &epochs), viable);
}
