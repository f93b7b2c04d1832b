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

use crate::linalg::{DMatrix, Matrix3, Vector3};
use approx::relative_eq;

/// Returns the tilde matrix from the provided Vector3, i.e. `tilde_matrix(a) * b == a.cross(&b)`.
pub fn tilde_matrix(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Returns the rotation matrix of an angle (in radians) about the Z axis, i.e. the DCM from a rotated frame to the base frame.
pub fn r3(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Returns whether the provided matrix is square and symmetric up to the provided relative tolerance.
pub fn is_symmetric(m: &DMatrix<f64>, max_relative: f64) -> bool {
    if !m.is_square() {
        return false;
    }
    for i in 1..m.nrows() {
        for j in 0..i {
            if !relative_eq!(m[(i, j)], m[(j, i)], epsilon = f64::EPSILON, max_relative = max_relative) {
                return false;
            }
        }
    }
    true
}

/// Returns the provided angle bounded between 0.0 and 360.0
pub fn between_0_360(angle_deg: f64) -> f64 {
    angle_deg.rem_euclid(360.0)
}
