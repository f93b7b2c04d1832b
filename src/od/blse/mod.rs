/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::linalg::{DMatrix, DVector};
use crate::od::estimate::partials::stack_rows;
use crate::od::estimate::{
    EstimationInput, EstimationOutput, EstimationStatus, IterationRecord, ParameterSet,
    PartialsAssembler, ViabilityPolicy,
};
use crate::od::msr::{LinkEnds, ObservableType, ObservationModels, ObservationTimeSeries};
use crate::od::provider::ReferenceProvider;
use crate::od::simulator::ObservationSimulator;
use crate::od::viability::ViabilityCalculatorSet;
use crate::od::{
    DimensionMismatchSnafu as ODDimensionMismatchSnafu, EmptyBatchSnafu, InvalidParameterSnafu, ODError,
};
use rayon::prelude::*;
use snafu::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use typed_builder::TypedBuilder;

mod convergence;
mod normal;

pub use convergence::ConvergenceChecker;
pub use normal::NormalEquations;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BLSError {
    #[snafu(display("invalid estimation input: {source}"))]
    InvalidInput { source: ODError },

    #[snafu(display("iteration {iteration}: propagation failed: {source}"))]
    Propagation { iteration: usize, source: ODError },

    #[snafu(display("iteration {iteration}: {observable} of {link_ends} failed: {source}"))]
    SegmentFailure {
        iteration: usize,
        observable: ObservableType,
        link_ends: LinkEnds,
        source: ODError,
    },

    #[snafu(display("iteration {iteration}: singular matrix encountered: {details}"))]
    SingularMatrix { iteration: usize, details: String },

    #[snafu(display("iteration {iteration}: no viable observation left"))]
    NoObservations { iteration: usize },

    #[snafu(display(
        "iteration {iteration}: {rows} partials rows but {residuals} residuals"
    ))]
    DimensionMismatch {
        iteration: usize,
        rows: usize,
        residuals: usize,
    },

    #[snafu(display("estimation cancelled before iteration {iteration}"))]
    Cancelled { iteration: usize },
}

/// Solver choice for the Batch Least Squares estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BLSSolver {
    /// Standard Normal Equations: (H^T W H) dx = H^T W dy
    NormalEquations,
    /// Levenberg-Marquardt: (H^T W H + lambda * diag(H^T W H)) dx = H^T W dy
    LevenbergMarquardt,
}

/// Linearization of one (observable, link ends) entry of the observation batch
struct Segment {
    residuals: DVector<f64>,
    partials: DMatrix<f64>,
    weight: f64,
    /// Whether each epoch of the entry was used
    used: Vec<bool>,
    normal: NormalEquations,
}

/// Normal equations (including the a priori) about one estimate, with the partials and weights they were built from
struct LinearizationPoint {
    estimate: DVector<f64>,
    normal: NormalEquations,
    weighted_rms: f64,
    partials: DMatrix<f64>,
    weights: DVector<f64>,
}

/// Linearization of the whole observation batch about one estimate
struct Linearization {
    residuals: DVector<f64>,
    partials: DMatrix<f64>,
    weights: DVector<f64>,
    used: Vec<Vec<bool>>,
    normal: NormalEquations,
}

/// Iterative batch weighted least squares estimator.
///
/// The estimator owns its collaborators for its whole lifetime: they are only read during an estimation.
#[derive(TypedBuilder)]
#[builder(doc)]
pub struct BatchLeastSquares<P: ReferenceProvider> {
    /// Propagator and ephemerides of the reference trajectory
    pub provider: P,
    pub models: ObservationModels,
    /// Viability calculators consulted when simulating the observations
    #[builder(default)]
    pub viability: ViabilityCalculatorSet,
    /// Layout of the parameter vector
    pub parameters: ParameterSet,
    /// Solver method
    #[builder(default = BLSSolver::NormalEquations)]
    pub solver: BLSSolver,
    /// Initial damping factor for Levenberg-Marquardt
    #[builder(default = 1e-3)]
    pub lm_lambda_init: f64,
    /// Factor to decrease lambda by in LM
    #[builder(default = 10.0)]
    pub lm_lambda_decrease: f64,
    /// Factor to increase lambda by in LM
    #[builder(default = 10.0)]
    pub lm_lambda_increase: f64,
    /// Minimum value for LM lambda
    #[builder(default = 1e-12)]
    pub lm_lambda_min: f64,
    /// Maximum value for LM lambda
    #[builder(default = 1e12)]
    pub lm_lambda_max: f64,
    /// Checked before each iteration, the estimation stops if set
    #[builder(default, setter(strip_option))]
    pub cancel: Option<Arc<AtomicBool>>,
}

impl<P: ReferenceProvider> BatchLeastSquares<P> {
    /// Simulator using the collaborators of this estimator
    pub fn simulator(&self) -> ObservationSimulator<'_, P> {
        ObservationSimulator::new(&self.provider, &self.models, &self.viability, &self.parameters)
    }

    /// Estimates the parameters from the observations of the input, iterating until the checker stops.
    pub fn estimate_parameters(
        &self,
        input: &EstimationInput,
        checker: &ConvergenceChecker,
    ) -> Result<EstimationOutput, BLSError> {
        let n = self.parameters.len();
        if n == 0 {
            return InvalidParameterSnafu {
                name: "parameter set",
                reason: "nothing to estimate",
            }
            .fail()
            .context(InvalidInputSnafu);
        }
        self.parameters
            .check_vector("initial parameters", &input.initial_parameters)
            .context(InvalidInputSnafu)?;
        // Fields may have been changed since EstimationInput::new
        if input.observations.is_empty() {
            return EmptyBatchSnafu.fail().context(InvalidInputSnafu);
        }
        input.weights.validate().context(InvalidInputSnafu)?;
        input.apriori.validate(n).context(InvalidInputSnafu)?;

        let segments: Vec<(ObservableType, &LinkEnds, &ObservationTimeSeries)> =
            input.observations.iter().collect();
        let weights = segments
            .iter()
            .map(|(observable, link_ends, _)| input.weights.weight_of(*observable, link_ends))
            .collect::<Result<Vec<f64>, ODError>>()
            .context(InvalidInputSnafu)?;

        info!(
            "estimating {n} parameters from {} observations ({} entries), {:?} solver",
            input.observations.num_observations(),
            segments.len(),
            self.solver
        );

        let x_ref = input.apriori_reference();
        let mut estimate = input.initial_parameters.clone();
        let mut frozen: Option<Vec<Vec<bool>>> = None;
        let mut records: Vec<IterationRecord> = Vec::new();
        let mut history: Vec<f64> = Vec::new();

        let mut lambda = self.lm_lambda_init;
        // Weighted RMS of the linearizations accepted by Levenberg-Marquardt
        let mut accepted_history: Vec<f64> = Vec::new();
        let mut accepted: Option<LinearizationPoint> = None;

        let mut iteration = 0;
        let (status, base) = loop {
            iteration += 1;
            if let Some(cancel) = &self.cancel {
                ensure!(!cancel.load(Ordering::Relaxed), CancelledSnafu { iteration });
            }

            let lin = self.linearize(iteration, &estimate, &segments, &weights, frozen.as_deref())?;
            if frozen.is_none() && input.options.viability_policy == ViabilityPolicy::Frozen {
                debug!(
                    "freezing {} viable epochs of {} for the next iterations",
                    lin.used.iter().flatten().filter(|u| **u).count(),
                    input.observations.num_epochs()
                );
                frozen = Some(lin.used.clone());
            }

            let mut normal = lin.normal;
            normal.add_apriori(&input.apriori.inverse_covariance, &(&estimate - &x_ref));
            let weighted_rms = normal.weighted_rms();
            let rms = normal.rms();
            let residuals = input
                .options
                .save_residual_history
                .then(|| lin.residuals.clone());
            let num_observations = lin.residuals.len();

            if let Some(prev) = history.last() {
                if weighted_rms > *prev {
                    warn!("[{iteration}] weighted RMS increased from {prev:.6e} to {weighted_rms:.6e}");
                }
            }
            history.push(weighted_rms);

            let point = LinearizationPoint {
                estimate: estimate.clone(),
                normal,
                weighted_rms,
                partials: lin.partials,
                weights: lin.weights,
            };

            // Linearization the correction is solved from, and whether the step which led here was rejected
            let (base, damping, rejected) = match self.solver {
                BLSSolver::NormalEquations => (point, None, false),
                BLSSolver::LevenbergMarquardt => match accepted.take() {
                    Some(last) if weighted_rms > last.weighted_rms => {
                        lambda = (lambda * self.lm_lambda_increase).min(self.lm_lambda_max);
                        debug!(
                            "LM: weighted RMS increased ({:.6e} -> {weighted_rms:.6e}), rejecting step, lambda = {lambda:.3e}",
                            last.weighted_rms
                        );
                        (last, Some(lambda), true)
                    }
                    previous => {
                        if previous.is_some() {
                            lambda = (lambda / self.lm_lambda_decrease).max(self.lm_lambda_min);
                            debug!("LM: weighted RMS decreased, lambda = {lambda:.3e}");
                        }
                        accepted_history.push(weighted_rms);
                        (point, Some(lambda), false)
                    }
                },
            };

            let correction = base
                .normal
                .solve(damping.unwrap_or(0.0))
                .context(SingularMatrixSnafu {
                    iteration,
                    details: "normal equations are not positive definite".to_string(),
                })?;

            info!(
                "[{iteration}/{}] weighted RMS {weighted_rms:.6e}    |dx| {:.6e}    ({num_observations} obs.)",
                checker.max_iterations,
                correction.norm(),
            );

            records.push(IterationRecord {
                iteration,
                estimate: estimate.clone(),
                correction: correction.clone(),
                rms,
                weighted_rms,
                num_observations,
                damping,
                residuals,
            });

            let status = match self.solver {
                BLSSolver::NormalEquations => checker.status(iteration, &history),
                // Rejected steps are retried with more damping, they never count as convergence
                BLSSolver::LevenbergMarquardt => checker.status(iteration, &accepted_history),
            };

            if let Some(status) = status {
                if rejected {
                    // The damped step from the last accepted point was never evaluated
                    info!("last step rejected, keeping the last accepted estimate");
                    estimate = base.estimate.clone();
                } else if checker.allows_correction() {
                    estimate = &base.estimate + correction;
                }
                break (status, base);
            }

            if checker.allows_correction() {
                estimate = &base.estimate + correction;
            }
            if self.solver == BLSSolver::LevenbergMarquardt {
                accepted = Some(base);
            }
        };

        match status {
            EstimationStatus::Converged => info!("estimation converged after {iteration} iteration(s)"),
            EstimationStatus::MaxIterationsReached => {
                warn!("estimation stopped after the maximum of {iteration} iteration(s)")
            }
        }

        let (postfit_residuals, postfit_weighted_rms) = if input.options.reintegrate_on_convergence {
            let lin = self.linearize(iteration + 1, &estimate, &segments, &weights, frozen.as_deref())?;
            let wrms = lin.normal.weighted_rms();
            info!("post-fit weighted RMS {wrms:.6e}");
            (Some(lin.residuals), Some(wrms))
        } else {
            (None, None)
        };

        let covariance = if input.options.save_covariance {
            let covariance = base.normal.covariance();
            if covariance.is_none() {
                warn!("information matrix is not invertible, no covariance available");
            }
            covariance
        } else {
            None
        };

        let best_iteration = history
            .iter()
            .enumerate()
            .fold(0, |best, (i, rms)| if *rms < history[best] { i } else { best });

        Ok(EstimationOutput {
            status,
            parameter_estimate: estimate,
            parameter_names: self.parameters.names(),
            iterations: records,
            best_iteration,
            information_matrix: base.normal.information,
            covariance,
            partials: input.options.save_partials.then_some(base.partials),
            weights: base.weights,
            postfit_residuals,
            postfit_weighted_rms,
        })
    }

    /// Linearizes every entry of the batch about the provided estimate, in parallel, and stacks the results in batch order.
    fn linearize(
        &self,
        iteration: usize,
        estimate: &DVector<f64>,
        segments: &[(ObservableType, &LinkEnds, &ObservationTimeSeries)],
        weights: &[f64],
        frozen: Option<&[Vec<bool>]>,
    ) -> Result<Linearization, BLSError> {
        let n = self.parameters.len();
        let trajectory = self
            .provider
            .propagate(estimate)
            .context(PropagationSnafu { iteration })?;

        let linearized: Vec<Segment> = segments
            .par_iter()
            .enumerate()
            .map(|(i, (observable, link_ends, series))| {
                self.linearize_segment(
                    &trajectory,
                    estimate,
                    *observable,
                    link_ends,
                    series,
                    weights[i],
                    frozen.map(|masks| masks[i].as_slice()),
                )
                .context(SegmentFailureSnafu {
                    iteration,
                    observable: *observable,
                    link_ends: (*link_ends).clone(),
                })
            })
            .collect::<Result<Vec<Segment>, BLSError>>()?;

        // Sequential reduction, in batch order, so that results do not depend on the thread scheduling
        let mut normal = NormalEquations::zeros(n);
        for segment in &linearized {
            normal += &segment.normal;
        }

        let num_rows: usize = linearized.iter().map(|s| s.residuals.len()).sum();
        ensure!(num_rows > 0, NoObservationsSnafu { iteration });

        let residuals = DVector::from_iterator(
            num_rows,
            linearized.iter().flat_map(|s| s.residuals.iter().copied()),
        );
        let weights = DVector::from_iterator(
            num_rows,
            linearized
                .iter()
                .flat_map(|s| std::iter::repeat(s.weight).take(s.residuals.len())),
        );
        let blocks: Vec<DMatrix<f64>> = linearized.iter().map(|s| s.partials.clone()).collect();
        let partials = stack_rows(&blocks, n);

        ensure!(
            partials.nrows() == residuals.len(),
            DimensionMismatchSnafu {
                iteration,
                rows: partials.nrows(),
                residuals: residuals.len(),
            }
        );

        Ok(Linearization {
            residuals,
            partials,
            weights,
            used: linearized.into_iter().map(|s| s.used).collect(),
            normal,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn linearize_segment(
        &self,
        trajectory: &P::Trajectory,
        estimate: &DVector<f64>,
        observable: ObservableType,
        link_ends: &LinkEnds,
        series: &ObservationTimeSeries,
        weight: f64,
        frozen: Option<&[bool]>,
    ) -> Result<Segment, ODError> {
        let n = self.parameters.len();
        let simulator = self.simulator();
        let assembler = PartialsAssembler::new(&self.provider, &self.parameters);
        let model = self.models.get(observable)?;

        let mut residuals: Vec<f64> = Vec::with_capacity(series.len() * observable.size());
        let mut rows: Vec<DMatrix<f64>> = Vec::with_capacity(series.len());
        let mut used = Vec::with_capacity(series.len());

        for (i, (epoch, observed)) in series.iter().enumerate() {
            if frozen.map(|mask| !mask[i]).unwrap_or(false) {
                used.push(false);
                continue;
            }
            let computed =
                simulator.evaluate(trajectory, estimate, observable, link_ends, series.reference, *epoch)?;
            if frozen.is_none() && !simulator.is_viable(&computed, link_ends) {
                trace!("{observable} of {link_ends} at {epoch} not viable");
                used.push(false);
                continue;
            }
            used.push(true);

            let residual = model.residual(observed, &computed.value);
            let partials = assembler.observation_partials(
                trajectory,
                model.as_ref(),
                link_ends,
                &computed.link_end_states,
                &computed.ideal,
                estimate,
            )?;
            residuals.extend(residual.iter());
            rows.push(partials);
        }

        let residuals = DVector::from_vec(residuals);
        let partials = stack_rows(&rows, n);
        ensure!(
            partials.nrows() == residuals.len(),
            ODDimensionMismatchSnafu {
                what: "segment partials",
                expected: residuals.len(),
                got: partials.nrows(),
            }
        );

        let mut normal = NormalEquations::zeros(n);
        normal.accumulate(&partials, &residuals, weight);

        Ok(Segment {
            residuals,
            partials,
            weight,
            used,
            normal,
        })
    }
}
