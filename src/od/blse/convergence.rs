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

use crate::io::ConfigRepr;
use crate::od::estimate::EstimationStatus;
use serde_derive::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

fn default_max_iterations() -> usize {
    5
}

fn default_without_improvement() -> Option<usize> {
    Some(2)
}

/// Stopping policy of the batch estimator, consulted after each iteration with the weighted RMS history.
///
/// A checker with zero iterations performs a single pass without applying the correction,
/// which yields the pre-fit residuals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
pub struct ConvergenceChecker {
    #[builder(default = default_max_iterations())]
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Stop once the decrease of the weighted RMS between two iterations is below this value
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub min_rms_improvement: Option<f64>,
    /// Stop once the weighted RMS is at or below this value
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub min_rms: Option<f64>,
    /// Stop after this many consecutive iterations without improving on the best weighted RMS
    #[builder(default = default_without_improvement())]
    #[serde(default = "default_without_improvement")]
    pub max_iterations_without_improvement: Option<usize>,
}

impl Default for ConvergenceChecker {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ConvergenceChecker {
    /// Checker which stops after the provided number of iterations, and only then
    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            min_rms_improvement: None,
            min_rms: None,
            max_iterations_without_improvement: None,
        }
    }

    /// Whether the estimator may apply the corrections it solves for
    pub fn allows_correction(&self) -> bool {
        self.max_iterations > 0
    }

    /// Returns the terminal status if the estimation must stop given the weighted RMS of every iteration so far.
    pub fn is_converged(&self, weighted_rms_history: &[f64]) -> Option<EstimationStatus> {
        self.status(weighted_rms_history.len(), weighted_rms_history)
    }

    /// Returns the terminal status after the provided number of iterations, where the convergence criteria
    /// only consider the provided weighted RMS history. That history may be shorter than the number of
    /// iterations, e.g. when it only holds the steps accepted by Levenberg-Marquardt.
    pub fn status(&self, iterations: usize, weighted_rms_history: &[f64]) -> Option<EstimationStatus> {
        if let Some(status) = self.converged(weighted_rms_history) {
            return Some(status);
        }
        if iterations >= self.max_iterations.max(1) {
            return Some(EstimationStatus::MaxIterationsReached);
        }
        None
    }

    fn converged(&self, weighted_rms_history: &[f64]) -> Option<EstimationStatus> {
        let last = *weighted_rms_history.last()?;
        let k = weighted_rms_history.len();

        if let Some(floor) = self.min_rms {
            if last <= floor {
                info!("weighted RMS {last:.6e} below {floor:.6e}");
                return Some(EstimationStatus::Converged);
            }
        }

        if let (Some(threshold), true) = (self.min_rms_improvement, k > 1) {
            let improvement = weighted_rms_history[k - 2] - last;
            if improvement < threshold {
                info!("weighted RMS improvement {improvement:.6e} below {threshold:.6e}");
                return Some(EstimationStatus::Converged);
            }
        }

        if let Some(max_stale) = self.max_iterations_without_improvement {
            let best = weighted_rms_history
                .iter()
                .enumerate()
                .fold(0, |best, (i, rms)| {
                    if *rms < weighted_rms_history[best] {
                        i
                    } else {
                        best
                    }
                });
            if k - 1 - best >= max_stale.max(1) {
                info!(
                    "no improvement on the best weighted RMS {:.6e} for {} iterations",
                    weighted_rms_history[best],
                    k - 1 - best
                );
                return Some(EstimationStatus::Converged);
            }
        }

        None
    }
}

impl ConfigRepr for ConvergenceChecker {}
