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
use crate::linalg::{Vector3, Vector6};
use crate::time::Epoch;
use std::sync::Arc;

/// Relative tolerance on the body radius below which a link is considered to graze the surface.
const SURFACE_TOLERANCE: f64 = 1e-9;

/// Requires the segment between two link ends not to cross a spherical body.
#[derive(Clone, Debug)]
pub struct BodyOccultation {
    pub link_end_indices: Vec<(usize, usize)>,
    pub body: String,
    pub ephemeris: Arc<dyn BodyEphemeris>,
    pub body_radius_m: f64,
}

impl BodyOccultation {
    pub fn new<S: Into<String>>(
        link_end_indices: Vec<(usize, usize)>,
        body: S,
        ephemeris: Arc<dyn BodyEphemeris>,
        body_radius_m: f64,
    ) -> Self {
        Self {
            link_end_indices,
            body: body.into(),
            ephemeris,
            body_radius_m,
        }
    }

    /// Fraction along [a, b] of the point of the line closest to the center, unbounded.
    fn closest_fraction(a: &Vector3<f64>, b: &Vector3<f64>, center: &Vector3<f64>) -> f64 {
        let ab = b - a;
        let len_sq = ab.norm_squared();
        if len_sq > 0.0 {
            (center - a).dot(&ab) / len_sq
        } else {
            0.0
        }
    }

    /// Whether the segment [a, b] passes strictly inside the sphere. Touching it at an end point does not count,
    /// so that link ends on the surface of the body (e.g. ground stations) are not occulted by it.
    pub fn crosses_body(&self, a: &Vector3<f64>, b: &Vector3<f64>, center: &Vector3<f64>) -> bool {
        let t = Self::closest_fraction(a, b, center);
        if t <= 0.0 || t >= 1.0 {
            return false;
        }
        let distance_m = (a + (b - a) * t - center).norm();
        distance_m < self.body_radius_m * (1.0 - SURFACE_TOLERANCE)
    }
}

impl ViabilityCalculator for BodyOccultation {
    fn is_viable(&self, states: &[Vector6<f64>], epochs: &[Epoch]) -> bool {
        let mut viable = true;
        for &(first, second) in &self.link_end_indices {
            let center = self.ephemeris.position_m(&self.body, epochs[first]);
            if self.crosses_body(&position_of(&states[first]), &position_of(&states[second]), &center) {
                debug!(
                    "link #{first} -- #{second} occulted by {} at {}",
                    self.body, epochs[first]
                );
                viable = false;
            }
        }
        viable
    }

    fn link_end_indices(&self) -> Vec<usize> {
        self.link_end_indices
            .iter()
            .flat_map(|&(first, second)| [first, second])
            .collect()
    }
}
