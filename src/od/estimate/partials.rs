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

use super::ParameterSet;
use crate::linalg::{DMatrix, DVector};
use crate::od::msr::{LinkEnds, ObservationModel};
use crate::od::provider::{LinkEndStates, ReferenceProvider};
use crate::od::{DimensionMismatchSnafu, ODError};
use snafu::ensure;

/// Builds the rows of the design matrix: partials of each observation with respect to the full parameter vector.
///
/// The partials of the observation with respect to each link end state are chained with the partials of that state
/// with respect to the parameters, as supplied by the provider. Observation biases are handled here directly.
pub struct PartialsAssembler<'a, P: ReferenceProvider> {
    provider: &'a P,
    parameters: &'a ParameterSet,
}

impl<'a, P: ReferenceProvider> PartialsAssembler<'a, P> {
    pub fn new(provider: &'a P, parameters: &'a ParameterSet) -> Self {
        Self {
            provider,
            parameters,
        }
    }

    /// Partials of one observation, a (observable size x number of parameters) matrix.
    pub fn observation_partials(
        &self,
        trajectory: &P::Trajectory,
        model: &dyn ObservationModel,
        link_ends: &LinkEnds,
        link_end_states: &LinkEndStates,
        ideal: &DVector<f64>,
        estimate: &DVector<f64>,
    ) -> Result<DMatrix<f64>, ODError> {
        let observable = model.observable();
        let size = observable.size();
        let n = self.parameters.len();

        let model_partials = model.state_partials(&link_end_states.states, &link_end_states.epochs)?;
        ensure!(
            model_partials.len() == link_end_states.ids.len(),
            DimensionMismatchSnafu {
                what: "link end partials",
                expected: link_end_states.ids.len(),
                got: model_partials.len(),
            }
        );

        let mut partials = DMatrix::zeros(size, n);
        for ((dh_dx, id), epoch) in model_partials
            .iter()
            .zip(&link_end_states.ids)
            .zip(&link_end_states.epochs)
        {
            let dx_dp = self.provider.state_partials(trajectory, id, *epoch)?;
            ensure!(
                dx_dp.nrows() == 6 && dx_dp.ncols() == n,
                DimensionMismatchSnafu {
                    what: "state partials",
                    expected: n,
                    got: dx_dp.ncols(),
                }
            );
            partials += dh_dx * dx_dp;
        }

        if let Some(scale) = self
            .parameters
            .relative_bias_scale(observable, link_ends, estimate)
        {
            for (i, factor) in scale.iter().enumerate() {
                partials.row_mut(i).scale_mut(*factor);
            }
        }
        self.parameters
            .add_bias_partials(observable, link_ends, ideal, &mut partials);

        Ok(partials)
    }
}

/// Stacks the provided matrices vertically, all of which must have the same number of columns.
pub fn stack_rows(blocks: &[DMatrix<f64>], ncols: usize) -> DMatrix<f64> {
    let nrows = blocks.iter().map(|b| b.nrows()).sum();
    let mut stacked = DMatrix::zeros(nrows, ncols);
    let mut row = 0;
    for block in blocks {
        stacked.rows_mut(row, block.nrows()).copy_from(block);
        row += block.nrows();
    }
    stacked
}
