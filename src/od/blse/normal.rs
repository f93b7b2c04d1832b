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

use crate::linalg::{DMatrix, DVector};
use nalgebra::Cholesky;
use std::ops::{Add, AddAssign};

/// Weighted normal equations N dx = b, with N = H^T W H (+ P0^-1) and b = H^T W r (- P0^-1 (x - x_ref)).
///
/// Contributions of disjoint sets of observations are summed elementwise.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalEquations {
    /// Information matrix N
    pub information: DMatrix<f64>,
    /// Right hand side b
    pub rhs: DVector<f64>,
    /// Sum of the weighted squared residuals
    pub weighted_sq_sum: f64,
    /// Sum of the squared residuals
    pub sq_sum: f64,
    /// Number of scalar observations
    pub num_observations: usize,
}

impl NormalEquations {
    pub fn zeros(num_parameters: usize) -> Self {
        Self {
            information: DMatrix::zeros(num_parameters, num_parameters),
            rhs: DVector::zeros(num_parameters),
            weighted_sq_sum: 0.0,
            sq_sum: 0.0,
            num_observations: 0,
        }
    }

    /// Accumulates observations sharing the same weight.
    pub fn accumulate(&mut self, partials: &DMatrix<f64>, residuals: &DVector<f64>, weight: f64) {
        if residuals.is_empty() {
            return;
        }
        let ht = partials.transpose();
        self.information += &ht * partials * weight;
        self.rhs += ht * residuals * weight;
        let sq = residuals.norm_squared();
        self.sq_sum += sq;
        self.weighted_sq_sum += weight * sq;
        self.num_observations += residuals.len();
    }

    /// Adds the a priori information, where the deviation is the current estimate minus the a priori reference.
    pub fn add_apriori(&mut self, inverse_covariance: &DMatrix<f64>, deviation: &DVector<f64>) {
        self.information += inverse_covariance;
        self.rhs -= inverse_covariance * deviation;
    }

    pub fn rms(&self) -> f64 {
        if self.num_observations == 0 {
            0.0
        } else {
            (self.sq_sum / self.num_observations as f64).sqrt()
        }
    }

    pub fn weighted_rms(&self) -> f64 {
        if self.num_observations == 0 {
            0.0
        } else {
            (self.weighted_sq_sum / self.num_observations as f64).sqrt()
        }
    }

    /// Jacobi scaling factors: one over the square root of each positive diagonal entry of N.
    fn scaling(&self) -> DVector<f64> {
        self.information
            .diagonal()
            .map(|d| if d > 0.0 { 1.0 / d.sqrt() } else { 1.0 })
    }

    fn scaled_cholesky(&self, damping: f64) -> Option<(Cholesky<f64, nalgebra::Dyn>, DVector<f64>)> {
        let scale = self.scaling();
        let n = self.rhs.len();
        let mut scaled = DMatrix::from_fn(n, n, |i, j| self.information[(i, j)] * scale[i] * scale[j]);
        if damping > 0.0 {
            // Once scaled, diag(N) is the identity wherever N has a positive diagonal
            for i in 0..n {
                scaled[(i, i)] *= 1.0 + damping;
            }
        }
        Cholesky::new(scaled).map(|chol| (chol, scale))
    }

    /// Solves (N + damping diag(N)) dx = b. Returns None if the matrix is not positive definite.
    pub fn solve(&self, damping: f64) -> Option<DVector<f64>> {
        let (chol, scale) = self.scaled_cholesky(damping)?;
        let correction = chol.solve(&self.rhs.component_mul(&scale)).component_mul(&scale);
        correction.iter().all(|x| x.is_finite()).then_some(correction)
    }

    /// Inverse of the information matrix. Returns None if it is not positive definite.
    pub fn covariance(&self) -> Option<DMatrix<f64>> {
        let (chol, scale) = self.scaled_cholesky(0.0)?;
        let inv = chol.inverse();
        let n = scale.len();
        let covar = DMatrix::from_fn(n, n, |i, j| inv[(i, j)] * scale[i] * scale[j]);
        covar.iter().all(|x| x.is_finite()).then_some(covar)
    }
}

impl AddAssign<&NormalEquations> for NormalEquations {
    fn add_assign(&mut self, rhs: &NormalEquations) {
        self.information += &rhs.information;
        self.rhs += &rhs.rhs;
        self.weighted_sq_sum += rhs.weighted_sq_sum;
        self.sq_sum += rhs.sq_sum;
        self.num_observations += rhs.num_observations;
    }
}

impl Add<&NormalEquations> for NormalEquations {
    type Output = Self;

    fn add(mut self, rhs: &NormalEquations) -> Self {
        self += rhs;
        self
    }
}
