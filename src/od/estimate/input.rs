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

use super::ParameterSet;
use crate::io::ConfigRepr;
use crate::linalg::{DMatrix, DVector};
use crate::od::msr::{LinkEnds, ObservableType, ObservationBatch};
use crate::od::noise::WhiteNoise;
use crate::od::{
    AsymmetricAprioriSnafu, DimensionMismatchSnafu, EmptyBatchSnafu, IndefiniteAprioriSnafu,
    InvalidWeightSnafu, ODError, WeightNotConfiguredSnafu,
};
use crate::utils::is_symmetric;
use serde_derive::{Deserialize, Serialize};
use snafu::{ensure, OptionExt};
use std::collections::BTreeMap;
use typed_builder::TypedBuilder;

/// Weight of one observable of one link ends
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkWeight {
    pub observable: ObservableType,
    pub link_ends: LinkEnds,
    pub weight: f64,
}

/// Diagonal of the inverse of the observation covariance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WeightSpecification {
    /// Same weight for every observation
    Constant { weight: f64 },
    /// One weight per observable type
    PerObservable { weights: BTreeMap<ObservableType, f64> },
    /// One weight per observable type and link ends
    PerLink { weights: Vec<LinkWeight> },
}

impl WeightSpecification {
    /// Weights per observable type from the white noise of each observable, i.e. one over the variance.
    pub fn from_noise(noises: &BTreeMap<ObservableType, WhiteNoise>) -> Self {
        Self::PerObservable {
            weights: noises
                .iter()
                .map(|(observable, noise)| (*observable, noise.weight()))
                .collect(),
        }
    }

    /// Checks that all weights are strictly positive and finite.
    pub fn validate(&self) -> Result<(), ODError> {
        let check = |what: String, weight: f64| -> Result<(), ODError> {
            ensure!(weight.is_finite() && weight > 0.0, InvalidWeightSnafu { what, weight });
            Ok(())
        };
        match self {
            Self::Constant { weight } => check("all observations".to_string(), *weight),
            Self::PerObservable { weights } => weights
                .iter()
                .try_for_each(|(observable, w)| check(observable.to_string(), *w)),
            Self::PerLink { weights } => weights.iter().try_for_each(|lw| {
                check(format!("{} of {}", lw.observable, lw.link_ends), lw.weight)
            }),
        }
    }

    /// Weight of the observations of this observable and link ends
    pub fn weight_of(&self, observable: ObservableType, link_ends: &LinkEnds) -> Result<f64, ODError> {
        let weight = match self {
            Self::Constant { weight } => Some(*weight),
            Self::PerObservable { weights } => weights.get(&observable).copied(),
            Self::PerLink { weights } => weights
                .iter()
                .find(|lw| lw.observable == observable && &lw.link_ends == link_ends)
                .map(|lw| lw.weight),
        };
        weight.context(WeightNotConfiguredSnafu {
            observable,
            link_ends: link_ends.clone(),
        })
    }
}

impl ConfigRepr for WeightSpecification {}

/// Prior knowledge on the parameters
#[derive(Clone, Debug, PartialEq)]
pub struct AprioriInformation {
    /// Inverse of the a priori covariance, symmetric positive semi-definite (possibly zero)
    pub inverse_covariance: DMatrix<f64>,
    /// Offset of the initial estimate with respect to the a priori reference, i.e. x_ref = x_initial - offset
    pub offset: DVector<f64>,
}

impl AprioriInformation {
    /// No prior knowledge: zero inverse covariance and zero offset
    pub fn none(num_parameters: usize) -> Self {
        Self {
            inverse_covariance: DMatrix::zeros(num_parameters, num_parameters),
            offset: DVector::zeros(num_parameters),
        }
    }

    /// Prior with the provided one-sigma uncertainties, uncorrelated, centered on the initial estimate.
    pub fn from_sigmas(sigmas: &DVector<f64>) -> Self {
        Self {
            inverse_covariance: DMatrix::from_diagonal(&sigmas.map(|s| s.powi(-2))),
            offset: DVector::zeros(sigmas.len()),
        }
    }

    pub fn with_offset(mut self, offset: DVector<f64>) -> Self {
        self.offset = offset;
        self
    }

    /// Checks the dimensions, the symmetry and the positive semi-definiteness of the prior.
    pub fn validate(&self, num_parameters: usize) -> Result<(), ODError> {
        let p = &self.inverse_covariance;
        ensure!(
            p.nrows() == num_parameters && p.ncols() == num_parameters,
            DimensionMismatchSnafu {
                what: "a priori inverse covariance",
                expected: num_parameters,
                got: if p.nrows() == num_parameters { p.ncols() } else { p.nrows() },
            }
        );
        ensure!(
            self.offset.len() == num_parameters,
            DimensionMismatchSnafu {
                what: "a priori offset",
                expected: num_parameters,
                got: self.offset.len(),
            }
        );
        ensure!(is_symmetric(p, 1e-10), AsymmetricAprioriSnafu);

        if num_parameters > 0 {
            let eigenvalues = p.clone().symmetric_eigenvalues();
            let largest = eigenvalues.amax().max(1.0);
            ensure!(eigenvalues.min() >= -1e-12 * largest, IndefiniteAprioriSnafu);
        }
        Ok(())
    }
}

/// Whether the set of viable epochs may change across iterations
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViabilityPolicy {
    /// Viable epochs are determined on the reference of the first iteration and kept afterwards
    #[default]
    Frozen,
    /// Viability is evaluated anew on the reference of each iteration
    ReevaluateEachIteration,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
pub struct EstimationOptions {
    /// Propagate the final estimate and report its post-fit residuals
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub reintegrate_on_convergence: bool,
    /// Store the residuals of each iteration
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub save_residual_history: bool,
    /// Store the partials matrix of the last iteration
    #[builder(default = false)]
    #[serde(default)]
    pub save_partials: bool,
    /// Store the covariance (inverse of the information matrix)
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub save_covariance: bool,
    #[builder(default)]
    #[serde(default)]
    pub viability_policy: ViabilityPolicy,
}

fn default_true() -> bool {
    true
}

impl Default for EstimationOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ConfigRepr for EstimationOptions {}

/// Immutable snapshot of everything one estimation run consumes.
#[derive(Clone, Debug, PartialEq)]
pub struct EstimationInput {
    pub observations: ObservationBatch,
    /// Estimate at the start of the first iteration
    pub initial_parameters: DVector<f64>,
    pub weights: WeightSpecification,
    pub apriori: AprioriInformation,
    pub options: EstimationOptions,
}

impl EstimationInput {
    /// Builds the estimation input, checking it against the estimated parameters.
    pub fn new(
        parameters: &ParameterSet,
        observations: ObservationBatch,
        initial_parameters: DVector<f64>,
        weights: WeightSpecification,
        apriori: Option<AprioriInformation>,
        options: EstimationOptions,
    ) -> Result<Self, ODError> {
        ensure!(!observations.is_empty(), EmptyBatchSnafu);
        parameters.check_vector("initial parameters", &initial_parameters)?;

        weights.validate()?;
        for (observable, link_ends, _) in observations.iter() {
            weights.weight_of(observable, link_ends)?;
        }

        let apriori = apriori.unwrap_or_else(|| AprioriInformation::none(parameters.len()));
        apriori.validate(parameters.len())?;

        Ok(Self {
            observations,
            initial_parameters,
            weights,
            apriori,
            options,
        })
    }

    /// Reference of the a priori information
    pub fn apriori_reference(&self) -> DVector<f64> {
        &self.initial_parameters - &self.apriori.offset
    }
}
