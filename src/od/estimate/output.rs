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
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Terminal state of an estimation run
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimationStatus {
    Converged,
    MaxIterationsReached,
}

impl fmt::Display for EstimationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => write!(f, "converged"),
            Self::MaxIterationsReached => write!(f, "maximum iterations reached"),
        }
    }
}

/// Diagnostics of one iteration
#[derive(Clone, Debug, PartialEq)]
pub struct IterationRecord {
    /// Iteration number, starting at one
    pub iteration: usize,
    /// Estimate about which the observations were linearized
    pub estimate: DVector<f64>,
    /// Correction solved for in this iteration (not applied when corrections are disabled)
    pub correction: DVector<f64>,
    pub rms: f64,
    pub weighted_rms: f64,
    /// Number of scalar observations used
    pub num_observations: usize,
    /// Levenberg-Marquardt damping used to solve for the correction
    pub damping: Option<f64>,
    /// Residuals (observed minus computed), if saved
    pub residuals: Option<DVector<f64>>,
}

/// Result of an estimation run
#[derive(Clone, Debug, PartialEq)]
pub struct EstimationOutput {
    pub status: EstimationStatus,
    /// Final estimate of the parameter vector
    pub parameter_estimate: DVector<f64>,
    /// Name of each entry of the parameter vector
    pub parameter_names: Vec<String>,
    pub iterations: Vec<IterationRecord>,
    /// Index in `iterations` of the iteration with the lowest weighted RMS
    pub best_iteration: usize,
    /// Undamped H^T W H + P0^-1 of the last iteration
    pub information_matrix: DMatrix<f64>,
    /// Inverse of the information matrix, if saved
    pub covariance: Option<DMatrix<f64>>,
    /// Partials matrix of the last iteration, if saved
    pub partials: Option<DMatrix<f64>>,
    /// Diagonal of the weight matrix of the last iteration
    pub weights: DVector<f64>,
    /// Residuals of the observations about the final estimate, if reintegrated
    pub postfit_residuals: Option<DVector<f64>>,
    pub postfit_weighted_rms: Option<f64>,
}

impl EstimationOutput {
    pub fn num_iterations(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_converged(&self) -> bool {
        self.status == EstimationStatus::Converged
    }

    pub fn weighted_rms_history(&self) -> Vec<f64> {
        self.iterations.iter().map(|it| it.weighted_rms).collect()
    }

    pub fn final_weighted_rms(&self) -> f64 {
        self.postfit_weighted_rms
            .or_else(|| self.iterations.last().map(|it| it.weighted_rms))
            .unwrap_or(f64::NAN)
    }

    pub fn best(&self) -> Option<&IterationRecord> {
        self.iterations.get(self.best_iteration)
    }

    /// One-sigma formal errors, i.e. the square root of the covariance diagonal
    pub fn formal_errors(&self) -> Option<DVector<f64>> {
        self.covariance
            .as_ref()
            .map(|cov| cov.diagonal().map(|v| v.max(0.0).sqrt()))
    }

    /// Correlation coefficients of the estimated parameters
    pub fn correlations(&self) -> Option<DMatrix<f64>> {
        let cov = self.covariance.as_ref()?;
        let sigmas = self.formal_errors()?;
        Some(DMatrix::from_fn(cov.nrows(), cov.ncols(), |i, j| {
            let denom = sigmas[i] * sigmas[j];
            if denom > 0.0 {
                cov[(i, j)] / denom
            } else if i == j {
                1.0
            } else {
                0.0
            }
        }))
    }
}

impl fmt::Display for EstimationOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Status: {}", self.status)?;
        writeln!(f, "Iterations: {}", self.num_iterations())?;
        for it in &self.iterations {
            writeln!(
                f,
                "  #{}: RMS {:.6e}    weighted RMS {:.6e}    |dx| {:.6e}    ({} obs.)",
                it.iteration,
                it.rms,
                it.weighted_rms,
                it.correction.norm(),
                it.num_observations
            )?;
        }
        if let Some(rms) = self.postfit_weighted_rms {
            writeln!(f, "Post-fit weighted RMS: {rms:.6e}")?;
        }
        let sigmas = self.formal_errors();
        writeln!(f, "Estimate:")?;
        for (i, value) in self.parameter_estimate.iter().enumerate() {
            let name = self.parameter_names.get(i).map(|s| s.as_str()).unwrap_or("?");
            match &sigmas {
                Some(sigmas) => writeln!(f, "  {name}: {value:.9e} +/- {:.3e}", sigmas[i])?,
                None => writeln!(f, "  {name}: {value:.9e}")?,
            }
        }
        Ok(())
    }
}
