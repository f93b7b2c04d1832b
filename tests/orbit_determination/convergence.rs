use crate::nyx::linalg::{DMatrix, DVector, Vector6};
use crate::nyx::od::prelude::*;
use crate::{
    perturbed_parameters, position_link, test_epoch, test_estimator, test_schedule, test_station,
    test_weights, truth_parameters, vehicle_parameters, LinearMotionProvider, VEHICLE,
};
use rstest::*;

#[fixture]
fn bls() -> BatchLeastSquares<LinearMotionProvider> {
    test_estimator(vehicle_parameters())
}

/// Noiseless observations of the truth scenario
#[fixture]
fn observations(bls: BatchLeastSquares<LinearMotionProvider>) -> ObservationBatch {
    bls.simulator()
        .simulate_observations(&truth_parameters(), &test_schedule(&test_station()), None)
        .unwrap()
}

fn input(
    bls: &BatchLeastSquares<LinearMotionProvider>,
    observations: ObservationBatch,
    initial: DVector<f64>,
    options: EstimationOptions,
) -> EstimationInput {
    EstimationInput::new(&bls.parameters, observations, initial, test_weights(), None, options).unwrap()
}

fn checker() -> ConvergenceChecker {
    ConvergenceChecker::builder()
        .max_iterations(25)
        .min_rms_improvement(1e-9)
        .build()
}

/// Checks the error on the position, velocity and acceleration blocks.
fn assert_recovered(estimate: &DVector<f64>) {
    let err = estimate - truth_parameters();
    assert!(err.rows(0, 3).norm() < 1e-3, "position error {}", err.rows(0, 3).norm());
    assert!(err.rows(3, 3).norm() < 1e-6, "velocity error {}", err.rows(3, 3).norm());
    assert!(err.rows(6, 3).norm() < 1e-8, "acceleration error {}", err.rows(6, 3).norm());
}

#[rstest]
fn no_perturbation_no_correction(bls: BatchLeastSquares<LinearMotionProvider>, observations: ObservationBatch) {
    let _ = pretty_env_logger::try_init();

    let input = input(&bls, observations, truth_parameters(), EstimationOptions::default());
    let output = bls
        .estimate_parameters(&input, &ConvergenceChecker::default())
        .unwrap();
    println!("{output}");

    let first = &output.iterations[0];
    assert!(first.weighted_rms < 1e-6, "first weighted RMS {}", first.weighted_rms);
    assert!(first.correction.norm() < 1e-6, "first correction {}", first.correction.norm());
    assert_eq!(first.estimate, truth_parameters());
    assert_recovered(&output.parameter_estimate);
}

#[rstest]
#[case(BLSSolver::NormalEquations, ViabilityPolicy::Frozen)]
#[case(BLSSolver::NormalEquations, ViabilityPolicy::ReevaluateEachIteration)]
#[case(BLSSolver::LevenbergMarquardt, ViabilityPolicy::Frozen)]
#[case(BLSSolver::LevenbergMarquardt, ViabilityPolicy::ReevaluateEachIteration)]
fn perturbed_estimate_converges(
    mut bls: BatchLeastSquares<LinearMotionProvider>,
    observations: ObservationBatch,
    #[case] solver: BLSSolver,
    #[case] viability_policy: ViabilityPolicy,
) {
    let _ = pretty_env_logger::try_init();

    bls.solver = solver;
    let options = EstimationOptions::builder()
        .viability_policy(viability_policy)
        .save_partials(true)
        .build();
    let input = input(&bls, observations, perturbed_parameters(), options);
    let output = bls.estimate_parameters(&input, &checker()).unwrap();
    println!("{output}");

    assert!(output.is_converged());
    assert!(output.num_iterations() < 25);

    let history = output.weighted_rms_history();
    assert!(history[0] > 1.0);
    for pair in history.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-8, "weighted RMS increased: {history:?}");
    }
    assert!(output.final_weighted_rms() < 1e-6);
    assert_recovered(&output.parameter_estimate);

    if solver == BLSSolver::LevenbergMarquardt {
        assert!(output.iterations.iter().all(|it| it.damping.is_some()));
    } else {
        assert!(output.iterations.iter().all(|it| it.damping.is_none()));
    }
    if viability_policy == ViabilityPolicy::Frozen {
        let used = output.iterations[0].num_observations;
        assert!(output.iterations.iter().all(|it| it.num_observations == used));
    }

    // The partials and residuals stay aligned in every iteration
    for it in &output.iterations {
        assert_eq!(it.residuals.as_ref().unwrap().len(), it.num_observations);
    }
    let partials = output.partials.as_ref().unwrap();
    assert_eq!(partials.ncols(), 9);
    assert_eq!(partials.nrows(), output.weights.len());
    assert_eq!(partials.nrows(), output.iterations.last().unwrap().num_observations);
    assert_eq!(
        output.postfit_residuals.as_ref().unwrap().len(),
        output.iterations.last().unwrap().num_observations
    );

    let sigmas = output.formal_errors().unwrap();
    assert!(sigmas.iter().all(|s| s.is_finite() && *s > 0.0));
    let correlations = output.correlations().unwrap();
    assert!((correlations[(0, 0)] - 1.0).abs() < 1e-12);
}

#[rstest]
fn converged_estimate_is_a_fixed_point(bls: BatchLeastSquares<LinearMotionProvider>, observations: ObservationBatch) {
    let _ = pretty_env_logger::try_init();

    let first = input(&bls, observations.clone(), perturbed_parameters(), EstimationOptions::default());
    let converged = bls.estimate_parameters(&first, &checker()).unwrap();

    let again = input(
        &bls,
        observations,
        converged.parameter_estimate.clone(),
        EstimationOptions::default(),
    );
    let output = bls
        .estimate_parameters(&again, &ConvergenceChecker::with_max_iterations(1))
        .unwrap();
    assert_eq!(output.num_iterations(), 1);
    assert_eq!(output.status, EstimationStatus::MaxIterationsReached);
    let correction = &output.iterations[0].correction;
    assert!(correction.norm() < 1e-6, "correction {}", correction.norm());
}

#[rstest]
fn zero_iterations_yield_prefit_residuals(
    bls: BatchLeastSquares<LinearMotionProvider>,
    observations: ObservationBatch,
) {
    let _ = pretty_env_logger::try_init();

    let input = input(&bls, observations, perturbed_parameters(), EstimationOptions::default());
    let output = bls
        .estimate_parameters(&input, &ConvergenceChecker::with_max_iterations(0))
        .unwrap();

    assert_eq!(output.num_iterations(), 1);
    assert_eq!(output.status, EstimationStatus::MaxIterationsReached);
    assert_eq!(output.parameter_estimate, perturbed_parameters());

    let prefit = output.iterations[0].residuals.as_ref().unwrap();
    assert!(prefit.norm() > 1.0);
    // Nothing was applied, so the post-fit residuals are the pre-fit ones
    assert_eq!(output.postfit_residuals.as_ref(), Some(prefit));
    assert!(output.iterations[0].correction.norm() > 1.0);
}

#[rstest]
fn history_can_be_skipped(bls: BatchLeastSquares<LinearMotionProvider>, observations: ObservationBatch) {
    let options = EstimationOptions::builder()
        .save_residual_history(false)
        .save_covariance(false)
        .reintegrate_on_convergence(false)
        .build();
    let input = input(&bls, observations, perturbed_parameters(), options);
    let output = bls.estimate_parameters(&input, &checker()).unwrap();

    assert!(output.iterations.iter().all(|it| it.residuals.is_none()));
    assert!(output.covariance.is_none());
    assert!(output.partials.is_none());
    assert!(output.postfit_residuals.is_none());
    assert_eq!(output.final_weighted_rms(), output.iterations.last().unwrap().weighted_rms);
    assert_recovered(&output.parameter_estimate);
}

/// Vehicle on the X axis at atan(p), where p is the only estimated parameter.
struct ArctanProvider;

impl ReferenceProvider for ArctanProvider {
    type Trajectory = f64;

    fn propagate(&self, parameters: &DVector<f64>) -> Result<f64, ODError> {
        Ok(parameters[0])
    }

    fn state_at(&self, p: &f64, _id: &LinkEndId, _epoch: Epoch) -> Result<Vector6<f64>, ODError> {
        Ok(Vector6::new(p.atan(), 0.0, 0.0, 0.0, 0.0, 0.0))
    }

    fn state_partials(&self, p: &f64, _id: &LinkEndId, _epoch: Epoch) -> Result<DMatrix<f64>, ODError> {
        let mut partials = DMatrix::zeros(6, 1);
        partials[(0, 0)] = 1.0 / (1.0 + p * p);
        Ok(partials)
    }
}

/// Levenberg-Marquardt estimator of the arctan problem, with its noiseless observations of p = 0.
fn arctan_problem() -> (BatchLeastSquares<ArctanProvider>, EstimationInput) {
    let parameters = ParameterSet::new(vec![EstimableParameter::GravitationalParameter {
        body: VEHICLE.to_string(),
    }])
    .unwrap();
    let bls = BatchLeastSquares::builder()
        .provider(ArctanProvider)
        .models(ObservationModels::all_geometric())
        .parameters(parameters)
        .solver(BLSSolver::LevenbergMarquardt)
        .build();

    let mut schedule = ObservationSchedule::new();
    schedule
        .insert(
            ObservableType::Position,
            position_link(),
            (0..3_i64).map(|i| test_epoch() + i.minutes()).collect(),
            LinkEndType::ObservedBody,
        )
        .unwrap();
    let observations = bls
        .simulator()
        .simulate_observations(&DVector::zeros(1), &schedule, None)
        .unwrap();

    let options = EstimationOptions::builder().save_partials(true).build();
    // The full Gauss-Newton step from p = 2 overshoots to p = -3.5, where the residuals are larger
    let input = EstimationInput::new(
        &bls.parameters,
        observations,
        DVector::from_element(1, 2.0),
        WeightSpecification::Constant { weight: 1.0 },
        None,
        options,
    )
    .unwrap();
    (bls, input)
}

#[test]
fn rejected_final_step_keeps_accepted_estimate() {
    let _ = pretty_env_logger::try_init();

    let (bls, input) = arctan_problem();
    let output = bls
        .estimate_parameters(&input, &ConvergenceChecker::with_max_iterations(2))
        .unwrap();
    println!("{output}");

    let history = output.weighted_rms_history();
    assert!(history[1] > history[0], "second step must be rejected: {history:?}");
    assert_eq!(output.status, EstimationStatus::MaxIterationsReached);
    let damping = output.iterations[1].damping.unwrap();
    assert!((damping - 1e-2).abs() < 1e-15, "damping {damping}");

    // The estimate is the last accepted one, not the unevaluated retry
    assert_eq!(output.parameter_estimate, input.initial_parameters);
    let postfit = output.postfit_weighted_rms.unwrap();
    assert!(postfit <= history[0] + 1e-12, "post-fit {postfit} worse than {}", history[0]);

    // Information matrix, partials and weights all describe the accepted linearization
    let partials = output.partials.as_ref().unwrap();
    let information = partials.transpose() * DMatrix::from_diagonal(&output.weights) * partials;
    assert!((information - &output.information_matrix).norm() < 1e-12);
    assert!((output.information_matrix[(0, 0)] - 3.0 * 0.2_f64.powi(2)).abs() < 1e-12);
}

#[test]
fn rejected_steps_do_not_stop_the_estimation() {
    let _ = pretty_env_logger::try_init();

    let (bls, input) = arctan_problem();
    let output = bls.estimate_parameters(&input, &checker()).unwrap();
    println!("{output}");

    let history = output.weighted_rms_history();
    let rejected = history.iter().filter(|rms| **rms > history[0]).count();
    assert_eq!(rejected, 3, "{history:?}");
    assert!(output.is_converged());
    assert!(output.parameter_estimate[0].abs() < 1e-9);
    assert!(output.final_weighted_rms() < 1e-9);

    // Damping grows on each rejection and decreases once a step is accepted
    let damping: Vec<f64> = output.iterations.iter().map(|it| it.damping.unwrap()).collect();
    assert!(damping[1] > damping[0] && damping[2] > damping[1] && damping[3] > damping[2]);
    assert!(damping[4] < damping[3]);
}
