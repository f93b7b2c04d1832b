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

use super::{position_of, BodyEphemeris, ViabilityCalculator};
use crate::linalg::Vector6;
use crate::time::Epoch;
use std::sync::Arc;

/// Requires the line of sight from an observer to its target to be at least some angle away from the direction of a body (e.g. the Sun).
#[derive(Clone, Debug)]
pub struct BodyAvoidanceAngle {
    /// Pairs of (observer index, target index) in the link end states
    pub link_end_indices: Vec<(usize, usize)>,
    /// Name of the body to avoid, as known by the ephemeris
    pub body: String,
    pub ephemeris: Arc<dyn BodyEphemeris>,
    pub minimum_angle_deg: f64,
}

impl BodyAvoidanceAngle {
    pub fn new<S: Into<String>>(
        link_end_indices: Vec<(usize, usize)>,
        body: S,
        ephemeris: Arc<dyn BodyEphemeris>,
        minimum_angle_deg: f64,
    ) -> Self {
        Self {
            link_end_indices,
            body: body.into(),
            ephemeris,
            minimum_angle_deg,
        }
    }

    /// Angle in degrees between the observer-to-target and observer-to-body directions
    pub fn separation_deg(&self, observer: &Vector6<f64>, target: &Vector6<f64>, epoch: Epoch) -> f64 {
        let observer = position_of(observer);
        let to_target = position_of(target) - observer;
        let to_body = self.ephemeris.position_m(&self.body, epoch) - observer;
        to_target.angle(&to_body).to_degrees()
    }
}

impl ViabilityCalculator for BodyAvoidanceAngle {
    fn is_viable(&self, states: &[Vector6<f64>], epochs: &[Epoch]) -> bool {
        let mut viable = true;
        for &(observer, target) in &self.link_end_indices {
            let separation_deg = self.separation_deg(&states[observer], &states[target], epochs[observer]);
            if separation_deg <= self.minimum_angle_deg {
                debug!(
                    "line of sight #{observer} -> #{target} within {separation_deg:.3} deg of {} at {}",
                    self.body, epochs[observer]
                );
                viable = false;
            }
        }
        viable
    }

    fn link_end_indices(&self) -> Vec<usize> {
        self.link_end_indices
            .iter()
            .flat_map(|&(observer, target)| [observer, target])
            .collect()
    }
}
