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

use super::{position_of, PointingAngles, ViabilityCalculator};
use crate::linalg::Vector6;
use crate::time::Epoch;
use std::sync::Arc;

/// Requires the target of each (station, target) pair of link end indices to be strictly above the elevation mask of the station.
///
/// The relative position is that of the target minus the station, evaluated at the epoch of the station.
#[derive(Clone, Debug)]
pub struct MinimumElevationAngle {
    /// Pairs of (station index, target index) in the link end states
    pub link_end_indices: Vec<(usize, usize)>,
    pub pointing: Arc<dyn PointingAngles>,
    pub minimum_elevation_deg: f64,
}

impl MinimumElevationAngle {
    pub fn new(
        link_end_indices: Vec<(usize, usize)>,
        pointing: Arc<dyn PointingAngles>,
        minimum_elevation_deg: f64,
    ) -> Self {
        Self {
            link_end_indices,
            pointing,
            minimum_elevation_deg,
        }
    }
}

impl ViabilityCalculator for MinimumElevationAngle {
    fn is_viable(&self, states: &[Vector6<f64>], epochs: &[Epoch]) -> bool {
        // Every pair is evaluated, even once one has failed.
        let mut viable = true;
        for &(station, target) in &self.link_end_indices {
            let rel = position_of(&states[target]) - position_of(&states[station]);
            let elevation_deg = self.pointing.elevation_deg(&rel, epochs[station]);
            if elevation_deg <= self.minimum_elevation_deg {
                debug!(
                    "link end #{target} at {:.3} deg below mask of {:.3} deg at {}",
                    elevation_deg, self.minimum_elevation_deg, epochs[station]
                );
                viable = false;
            }
        }
        viable
    }

    fn link_end_indices(&self) -> Vec<usize> {
        self.link_end_indices
            .iter()
            .flat_map(|&(station, target)| [station, target])
            .collect()
    }
}
