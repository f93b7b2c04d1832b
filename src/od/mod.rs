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

use crate::time::Epoch;
use snafu::prelude::Snafu;

/// Provides the link end definitions, observable types, observation models and observation storage.
pub mod msr;

/// Provides the observation viability predicates and their registry.
pub mod viability;

/// Provides a ground station model which computes pointing angles.
pub mod ground_station;
pub use ground_station::GroundStation;

/// Provides the interface to the external propagator and ephemerides.
pub mod provider;

/// Provides all of the functionality to simulate observations of link ends.
pub mod simulator;

/// Provides noise modeling
pub mod noise;

/// Provides the estimated parameters, the estimation input and output, and the partial derivatives.
pub mod estimate;

/// Batch least squares estimator.
pub mod blse;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::blse::*;
    pub use super::estimate::*;
    pub use super::ground_station::*;
    pub use super::msr::*;
    pub use super::noise::{SimulationNoise, Stochastics, WhiteNoise};
    pub use super::provider::*;
    pub use super::simulator::*;
    pub use super::viability::*;
    pub use super::ODError;

    pub use crate::io::ConfigRepr;
    pub use crate::time::{Duration, Epoch, TimeUnits, Unit};
}

use msr::{LinkEndType, LinkEnds, ObservableType};

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ODError {
    #[snafu(display("{observable} requires a {role} link end, none in {link_ends}"))]
    MissingLinkEnd {
        observable: ObservableType,
        role: LinkEndType,
        link_ends: LinkEnds,
    },
    #[snafu(display("{observable} does not use a {role} link end, found in {link_ends}"))]
    UnexpectedLinkEnd {
        observable: ObservableType,
        role: LinkEndType,
        link_ends: LinkEnds,
    },
    #[snafu(display("{observable} observations have {expected} components, got {got}"))]
    ObservationSize {
        observable: ObservableType,
        expected: usize,
        got: usize,
    },
    #[snafu(display("{epochs} epochs but {values} observation values"))]
    EpochValueMismatch { epochs: usize, values: usize },
    #[snafu(display("observation epochs of {observable} for {link_ends} are not sorted"))]
    UnsortedEpochs {
        observable: ObservableType,
        link_ends: LinkEnds,
    },
    #[snafu(display("observation epoch #{index} is before the previous one"))]
    UnsortedTimeSeries { index: usize },
    #[snafu(display("non-finite state of {entity} at {epoch}"))]
    NonFiniteState { entity: String, epoch: Epoch },
    #[snafu(display("state provider failed for {entity} at {epoch}: {details}"))]
    ProviderFailure {
        entity: String,
        epoch: Epoch,
        details: String,
    },
    #[snafu(display("no observation model configured for {observable}"))]
    ModelNotConfigured { observable: ObservableType },
    #[snafu(display("{observable} model failed: {details}"))]
    ModelFailure {
        observable: ObservableType,
        details: String,
    },
    #[snafu(display(
        "viability calculator reads link end #{index} but {link_ends} only has {available}"
    ))]
    ViabilityIndex {
        index: usize,
        available: usize,
        link_ends: LinkEnds,
    },
    #[snafu(display("invalid weight {weight} for {what}: must be strictly positive and finite"))]
    InvalidWeight { what: String, weight: f64 },
    #[snafu(display("no weight configured for {observable} of {link_ends}"))]
    WeightNotConfigured {
        observable: ObservableType,
        link_ends: LinkEnds,
    },
    #[snafu(display("{what} has dimension {got} but {expected} was expected"))]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[snafu(display("a priori inverse covariance is not symmetric"))]
    AsymmetricApriori,
    #[snafu(display("a priori inverse covariance is not positive semi-definite"))]
    IndefiniteApriori,
    #[snafu(display("parameter {name} is estimated more than once"))]
    DuplicateParameter { name: String },
    #[snafu(display("invalid parameter {name}: {reason}"))]
    InvalidParameter { name: String, reason: String },
    #[snafu(display("observation batch is empty"))]
    EmptyBatch,
    #[snafu(display("invalid white noise (mean {mean}, sigma {sigma}): both must be finite, sigma non-negative"))]
    InvalidNoise { mean: f64, sigma: f64 },
}
