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

use crate::linalg::DVector;
use crate::od::msr::ObservableType;
use crate::od::ODError;
use hifitime::Epoch;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::collections::BTreeMap;

pub mod white;

pub use white::WhiteNoise;

/// Trait for any kind of stochastic modeling, developing primarily for synthetic orbit determination measurements.
pub trait Stochastics {
    /// Return the variance of this stochastic noise model at a given time.
    fn covariance(&self, epoch: Epoch) -> f64;

    /// Returns a new sample of these stochastics
    fn sample<R: Rng>(&mut self, epoch: Epoch, rng: &mut R) -> f64;
}

/// White noise per observable type, drawn from a seeded generator so that noisy batches are reproducible.
#[derive(Clone, Debug)]
pub struct SimulationNoise {
    noises: BTreeMap<ObservableType, WhiteNoise>,
    rng: Pcg64Mcg,
}

impl SimulationNoise {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            noises: BTreeMap::new(),
            rng: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Initializes the noise from entropy
    pub fn from_entropy() -> Self {
        Self {
            noises: BTreeMap::new(),
            rng: Pcg64Mcg::from_entropy(),
        }
    }

    /// Returns a copy of this simulation noise with the noise of this observable set (or replaced).
    /// Fails if the noise is invalid.
    pub fn with(mut self, observable: ObservableType, noise: WhiteNoise) -> Result<Self, ODError> {
        noise.validate()?;
        self.noises.insert(observable, noise);
        Ok(self)
    }

    /// White noise of each observable
    pub fn noises(&self) -> &BTreeMap<ObservableType, WhiteNoise> {
        &self.noises
    }

    /// Adds a sample of the noise of this observable to each component of the provided value.
    /// Observables without configured noise are left untouched.
    pub fn apply(&mut self, observable: ObservableType, epoch: Epoch, value: &mut DVector<f64>) {
        if let Some(noise) = self.noises.get_mut(&observable) {
            for component in value.iter_mut() {
                *component += noise.sample(epoch, &mut self.rng);
            }
        }
    }
}
