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

use std::ops::{Mul, MulAssign};

use hifitime::Epoch;
use rand::Rng;
use rand_distr::Normal;
use serde_derive::{Deserialize, Serialize};

use super::Stochastics;
use crate::io::ConfigRepr;
use crate::od::{InvalidNoiseSnafu, ODError};
use snafu::ensure;

/// White noise is an uncorrelated random variable.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WhiteNoise {
    /// Mean value of this white noise
    #[serde(default)]
    pub mean: f64,
    /// Process noise as a one-sigma of the Normal distribution.
    pub sigma: f64,
}

impl WhiteNoise {
    /// Initializes a white noise, checking that the mean is finite and the sigma finite and non-negative.
    pub fn new(mean: f64, sigma: f64) -> Result<Self, ODError> {
        let noise = Self { mean, sigma };
        noise.validate()?;
        Ok(noise)
    }

    /// Initializes a new zero-mean white noise with the provided one-sigma.
    pub fn constant_white_noise(sigma: f64) -> Self {
        Self {
            sigma,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ODError> {
        ensure!(
            self.mean.is_finite() && self.sigma.is_finite() && self.sigma >= 0.0,
            InvalidNoiseSnafu {
                mean: self.mean,
                sigma: self.sigma,
            }
        );
        Ok(())
    }

    /// Weight of observations affected by this noise, i.e. the inverse of the variance.
    pub fn weight(&self) -> f64 {
        self.sigma.powi(-2)
    }
}

impl Stochastics for WhiteNoise {
    fn covariance(&self, _epoch: Epoch) -> f64 {
        self.sigma.powi(2)
    }

    /// Samples the noise. An invalid noise (see [WhiteNoise::validate]) yields NaN.
    fn sample<R: Rng>(&mut self, _epoch: Epoch, rng: &mut R) -> f64 {
        if let Err(e) = self.validate() {
            error!("{e}");
            return f64::NAN;
        }
        match Normal::new(self.mean, self.sigma) {
            Ok(normal) => rng.sample(normal),
            Err(e) => {
                error!("white noise {self:?}: {e}");
                f64::NAN
            }
        }
    }
}

impl ConfigRepr for WhiteNoise {}

impl Mul<f64> for WhiteNoise {
    type Output = Self;

    /// Scale the white noise sigmas by a constant.
    fn mul(mut self, rhs: f64) -> Self::Output {
        self.sigma *= rhs;
        self
    }
}

impl MulAssign<f64> for WhiteNoise {
    fn mul_assign(&mut self, rhs: f64) {
        *self = *self * rhs;
    }
}
