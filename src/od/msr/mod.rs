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

mod link_ends;
pub mod models;
mod observations;
mod types;

pub use link_ends::{LinkEndId, LinkEndType, LinkEnds};
pub use models::{GeometricObservation, ObservationModel, ObservationModels};
pub use observations::{ObservationBatch, ObservationTimeSeries};
pub use types::ObservableType;

/// Speed of light in vacuum, in meters per second.
pub const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;
