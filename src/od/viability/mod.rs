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

use crate::linalg::{Vector3, Vector6};
use crate::od::msr::{LinkEndId, LinkEnds, ObservableType};
use crate::od::{ODError, ViabilityIndexSnafu};
use crate::time::Epoch;
use snafu::ensure;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

mod avoidance;
mod elevation;
mod occultation;

pub use avoidance::BodyAvoidanceAngle;
pub use elevation::MinimumElevationAngle;
pub use occultation::BodyOccultation;

/// Computes pointing angles of a direction as seen from a reference point, typically a ground station.
pub trait PointingAngles: Send + Sync + fmt::Debug {
    /// Elevation in degrees of the provided relative position (target minus reference, inertial frame) at the provided epoch.
    fn elevation_deg(&self, relative_position: &Vector3<f64>, epoch: Epoch) -> f64;
}

/// Position of celestial bodies, expressed in the same frame as the link end states.
pub trait BodyEphemeris: Send + Sync + fmt::Debug {
    fn position_m(&self, body: &str, epoch: Epoch) -> Vector3<f64>;
}

/// A geometric test deciding whether an observation can be realized.
///
/// The states and epochs are those of all of the link ends of one observation, ordered as [ObservableType::link_end_roles].
/// Implementations must be free of side effects.
pub trait ViabilityCalculator: Send + Sync + fmt::Debug {
    fn is_viable(&self, states: &[Vector6<f64>], epochs: &[Epoch]) -> bool;

    /// Every link end index read by this calculator.
    fn link_end_indices(&self) -> Vec<usize>;
}

/// Returns whether all of the provided calculators deem the observation viable, stopping at the first failure.
pub fn all_viable(
    states: &[Vector6<f64>],
    epochs: &[Epoch],
    calculators: &[Arc<dyn ViabilityCalculator>],
) -> bool {
    calculators.iter().all(|calc| calc.is_viable(states, epochs))
}

/// Returns whether the observation of these link ends is viable given the registered calculators.
/// Link ends without any registered calculator are always viable.
pub fn is_observation_viable(
    states: &[Vector6<f64>],
    epochs: &[Epoch],
    link_ends: &LinkEnds,
    registry: &ViabilityCalculatorSet,
) -> bool {
    match registry.get(link_ends) {
        Some(calculators) => all_viable(states, epochs, calculators),
        None => true,
    }
}

/// Returns the position of the provided link end identifier in the link end states of this observable, if used.
pub fn link_end_index(observable: ObservableType, link_ends: &LinkEnds, id: &LinkEndId) -> Option<usize> {
    observable
        .link_end_roles()
        .iter()
        .position(|role| link_ends.get(*role) == Some(id))
}

pub(crate) fn position_of(state: &Vector6<f64>) -> Vector3<f64> {
    state.fixed_rows::<3>(0).into_owned()
}

/// Ordered viability calculators per link ends. Populated during setup, read-only during estimation.
#[derive(Clone, Debug, Default)]
pub struct ViabilityCalculatorSet {
    calculators: BTreeMap<LinkEnds, Vec<Arc<dyn ViabilityCalculator>>>,
}

impl ViabilityCalculatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the provided calculators to those of these link ends, in order.
    /// Fails if any calculator reads a link end index these link ends do not have.
    pub fn register(
        &mut self,
        link_ends: LinkEnds,
        calculators: Vec<Arc<dyn ViabilityCalculator>>,
    ) -> Result<(), ODError> {
        for calc in &calculators {
            for index in calc.link_end_indices() {
                ensure!(
                    index < link_ends.len(),
                    ViabilityIndexSnafu {
                        index,
                        available: link_ends.len(),
                        link_ends: link_ends.clone(),
                    }
                );
            }
        }
        debug!(
            "registering {} viability calculator(s) for {link_ends}",
            calculators.len()
        );
        self.calculators
            .entry(link_ends)
            .or_default()
            .extend(calculators);
        Ok(())
    }

    pub fn get(&self, link_ends: &LinkEnds) -> Option<&[Arc<dyn ViabilityCalculator>]> {
        self.calculators.get(link_ends).map(|c| c.as_slice())
    }

    /// Shortcut to [is_observation_viable] with this registry.
    pub fn is_viable(&self, states: &[Vector6<f64>], epochs: &[Epoch], link_ends: &LinkEnds) -> bool {
        is_observation_viable(states, epochs, link_ends, self)
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }
}
