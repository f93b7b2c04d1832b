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

/*! # nyx-batch

Batch least squares estimation of dynamical and observation parameters from tracking data.

The crate covers two coupled pieces of an orbit determination pipeline:
+ the observation viability engine, which decides whether a simulated measurement can be realized
  (e.g. the target is above the horizon of a ground station) and filters observation time series;
+ the batch estimator, which linearizes the observations around a reference trajectory, accumulates
  the weighted normal equations, and iterates on the parameter corrections until convergence.

Propagation, ephemerides and frames are provided by the caller through [od::provider::ReferenceProvider].
*/

/// Utility functions shared by different modules.
pub mod utils;

/// Configuration loading from YAML files.
pub mod io;

/// All of the observation modeling, viability filtering and batch estimation tools.
pub mod od;

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}
