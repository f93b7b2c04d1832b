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

use crate::linalg::{DMatrix, DVector, Vector6};
use crate::od::msr::{LinkEndId, LinkEndType, LinkEnds, ObservableType};
use crate::od::{MissingLinkEndSnafu, NonFiniteStateSnafu, ODError};
use crate::time::Epoch;
use snafu::{ensure, OptionExt};

/// States and epochs of every link end of one observation, ordered as [ObservableType::link_end_roles].
#[derive(Clone, Debug, PartialEq)]
pub struct LinkEndStates {
    pub ids: Vec<LinkEndId>,
    pub states: Vec<Vector6<f64>>,
    pub epochs: Vec<Epoch>,
}

/// Interface to the propagator and ephemerides used to build the reference of each iteration.
///
/// The trajectory is an immutable snapshot: it is shared across the workers of one iteration.
pub trait ReferenceProvider: Sync {
    type Trajectory: Sync;

    /// Propagates the dynamics (and their sensitivities) for the provided parameter vector.
    fn propagate(&self, parameters: &DVector<f64>) -> Result<Self::Trajectory, ODError>;

    /// Inertial state of the link end at the provided epoch, in meters and meters per second.
    fn state_at(
        &self,
        trajectory: &Self::Trajectory,
        id: &LinkEndId,
        epoch: Epoch,
    ) -> Result<Vector6<f64>, ODError>;

    /// Partial derivatives of the state of the link end with respect to the full parameter vector, a 6 x n matrix.
    fn state_partials(
        &self,
        trajectory: &Self::Trajectory,
        id: &LinkEndId,
        epoch: Epoch,
    ) -> Result<DMatrix<f64>, ODError>;

    /// States of all link ends of one observation time tagged at the reference role.
    ///
    /// The default implementation is instantaneous: every link end is evaluated at the reference epoch.
    /// Providers modeling the light time override this and return one epoch per link end.
    fn link_end_states(
        &self,
        trajectory: &Self::Trajectory,
        observable: ObservableType,
        link_ends: &LinkEnds,
        _reference: LinkEndType,
        epoch: Epoch,
    ) -> Result<LinkEndStates, ODError> {
        let roles = observable.link_end_roles();
        let mut ids = Vec::with_capacity(roles.len());
        let mut states = Vec::with_capacity(roles.len());
        for role in roles {
            let id = link_ends.get(*role).context(MissingLinkEndSnafu {
                observable,
                role: *role,
                link_ends: link_ends.clone(),
            })?;
            let state = self.state_at(trajectory, id, epoch)?;
            ensure!(
                state.iter().all(|x| x.is_finite()),
                NonFiniteStateSnafu {
                    entity: id.to_string(),
                    epoch,
                }
            );
            ids.push(id.clone());
            states.push(state);
        }
        Ok(LinkEndStates {
            ids,
            states,
            epochs: vec![epoch; roles.len()],
        })
    }
}
