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

use crate::io::{epoch_from_str, epoch_to_str, ConfigRepr};
use crate::linalg::{Vector3, Vector6};
use crate::od::msr::LinkEndId;
use crate::od::viability::{MinimumElevationAngle, PointingAngles};
use crate::time::Epoch;
use crate::utils::{between_0_360, r3, tilde_matrix};
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Mean equatorial radius of the Earth, in meters
pub const EARTH_RADIUS_M: f64 = 6_378_136.3;
/// Mean rotation rate of the Earth, in degrees per second
pub const EARTH_ROTATION_RATE_DEG_S: f64 = 0.004_178_079_012_116_429;

fn default_body() -> String {
    "Earth".to_string()
}

fn default_radius() -> f64 {
    EARTH_RADIUS_M
}

fn default_rotation_rate() -> f64 {
    EARTH_ROTATION_RATE_DEG_S
}

/// A ground station fixed on a spherical body which rotates uniformly about the Z axis of the inertial frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundStation {
    pub name: String,
    #[serde(default = "default_body")]
    pub body: String,
    /// in degrees
    pub latitude_deg: f64,
    /// in degrees
    pub longitude_deg: f64,
    /// in meters
    #[serde(default)]
    pub height_m: f64,
    /// in degrees
    #[serde(default)]
    pub elevation_mask_deg: f64,
    /// in meters
    #[serde(default = "default_radius")]
    pub body_radius_m: f64,
    /// in degrees per second
    #[serde(default = "default_rotation_rate")]
    pub rotation_rate_deg_s: f64,
    /// Epoch at which the body fixed and inertial frames are aligned
    #[serde(serialize_with = "epoch_to_str", deserialize_with = "epoch_from_str")]
    pub reference_epoch: Epoch,
}

impl GroundStation {
    /// Initializes a point on the surface of the Earth.
    pub fn from_point(
        name: String,
        latitude_deg: f64,
        longitude_deg: f64,
        height_m: f64,
        reference_epoch: Epoch,
    ) -> Self {
        Self {
            name,
            body: default_body(),
            latitude_deg,
            longitude_deg,
            height_m,
            elevation_mask_deg: 0.0,
            body_radius_m: EARTH_RADIUS_M,
            rotation_rate_deg_s: EARTH_ROTATION_RATE_DEG_S,
            reference_epoch,
        }
    }

    pub fn with_elevation_mask(mut self, elevation_mask_deg: f64) -> Self {
        self.elevation_mask_deg = elevation_mask_deg;
        self
    }

    /// Returns a copy of this station on a body that does not rotate
    pub fn non_rotating(mut self) -> Self {
        self.rotation_rate_deg_s = 0.0;
        self
    }

    /// Link end identifier of this station
    pub fn link_end_id(&self) -> LinkEndId {
        LinkEndId::station(self.body.clone(), self.name.clone())
    }

    /// Rotation angle of the body fixed frame at the provided epoch, in radians
    fn rotation_angle_rad(&self, epoch: Epoch) -> f64 {
        (self.rotation_rate_deg_s * (epoch - self.reference_epoch).to_seconds()).to_radians()
    }

    fn body_fixed_position(&self) -> Vector3<f64> {
        let (sin_lat, cos_lat) = self.latitude_deg.to_radians().sin_cos();
        let (sin_long, cos_long) = self.longitude_deg.to_radians().sin_cos();
        (self.body_radius_m + self.height_m) * Vector3::new(cos_lat * cos_long, cos_lat * sin_long, sin_lat)
    }

    /// Returns the local (up, east, north) unit vectors in the inertial frame at the provided epoch.
    pub fn topocentric_axes(&self, epoch: Epoch) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let (sin_lat, cos_lat) = self.latitude_deg.to_radians().sin_cos();
        let (sin_long, cos_long) = self.longitude_deg.to_radians().sin_cos();
        let dcm = r3(self.rotation_angle_rad(epoch));

        let up = Vector3::new(cos_lat * cos_long, cos_lat * sin_long, sin_lat);
        let east = Vector3::new(-sin_long, cos_long, 0.0);
        let north = Vector3::new(-sin_lat * cos_long, -sin_lat * sin_long, cos_lat);

        (dcm * up, dcm * east, dcm * north)
    }

    /// Inertial position and velocity of this station relative to the body center, in meters and meters per second.
    pub fn state_at(&self, epoch: Epoch) -> Vector6<f64> {
        let position = r3(self.rotation_angle_rad(epoch)) * self.body_fixed_position();
        let omega = Vector3::new(0.0, 0.0, self.rotation_rate_deg_s.to_radians());
        let velocity = tilde_matrix(&omega) * position;
        Vector6::new(
            position.x, position.y, position.z, velocity.x, velocity.y, velocity.z,
        )
    }

    /// Azimuth of the provided relative position, in degrees between 0 and 360, measured from north towards east.
    pub fn azimuth_deg(&self, relative_position: &Vector3<f64>, epoch: Epoch) -> f64 {
        let (_, east, north) = self.topocentric_axes(epoch);
        between_0_360(relative_position.dot(&east).atan2(relative_position.dot(&north)).to_degrees())
    }

    /// Returns a viability calculator requiring the target link end to be above the elevation mask of this station.
    pub fn elevation_viability(self: Arc<Self>, station_index: usize, target_index: usize) -> MinimumElevationAngle {
        let mask_deg = self.elevation_mask_deg;
        MinimumElevationAngle::new(vec![(station_index, target_index)], self, mask_deg)
    }
}

impl PointingAngles for GroundStation {
    fn elevation_deg(&self, relative_position: &Vector3<f64>, epoch: Epoch) -> f64 {
        let norm = relative_position.norm();
        if norm < f64::EPSILON {
            return 90.0;
        }
        let (up, _, _) = self.topocentric_axes(epoch);
        (relative_position.dot(&up) / norm).clamp(-1.0, 1.0).asin().to_degrees()
    }
}

impl ConfigRepr for GroundStation {}

impl fmt::Display for GroundStation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (lat.: {:.4} deg    long.: {:.4} deg    alt.: {:.3} m) [{}]",
            self.name, self.latitude_deg, self.longitude_deg, self.height_m, self.body,
        )
    }
}
