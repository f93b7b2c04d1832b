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

use crate::linalg::{DMatrix, DVector, Vector3, Vector6};
use crate::od::{DimensionMismatchSnafu, ModelFailureSnafu, ModelNotConfiguredSnafu, ODError};
use crate::time::Epoch;
use snafu::{ensure, OptionExt};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{ObservableType, SPEED_OF_LIGHT_M_S};

/// An observation model computes the ideal (unbiased, noiseless) value of an observable from the link end states,
/// and the partial derivatives of that value with respect to each link end state.
///
/// The states and epochs are ordered as [ObservableType::link_end_roles].
pub trait ObservationModel: Send + Sync + fmt::Debug {
    fn observable(&self) -> ObservableType;

    /// Computes the ideal observation.
    fn compute(&self, states: &[Vector6<f64>], epochs: &[Epoch]) -> Result<DVector<f64>, ODError>;

    /// Returns one `size x 6` matrix per link end: the partials of the observation w.r.t. that link end state.
    fn state_partials(
        &self,
        states: &[Vector6<f64>],
        epochs: &[Epoch],
    ) -> Result<Vec<DMatrix<f64>>, ODError>;

    /// Observed minus computed, the default is a plain difference.
    fn residual(&self, observed: &DVector<f64>, computed: &DVector<f64>) -> DVector<f64> {
        observed - computed
    }
}

/// Purely geometric observation models, without light time nor any media corrections.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GeometricObservation {
    pub observable: ObservableType,
}

impl GeometricObservation {
    pub fn new(observable: ObservableType) -> Self {
        Self { observable }
    }

    fn check(&self, states: &[Vector6<f64>]) -> Result<(), ODError> {
        let expected = self.observable.link_end_roles().len();
        ensure!(
            states.len() == expected,
            DimensionMismatchSnafu {
                what: "link end states",
                expected,
                got: states.len(),
            }
        );
        Ok(())
    }

    /// Relative position and velocity of the receiver w.r.t. the transmitter
    fn relative(states: &[Vector6<f64>]) -> (Vector3<f64>, Vector3<f64>) {
        let tx = &states[0];
        let rx = &states[1];
        (
            rx.fixed_rows::<3>(0) - tx.fixed_rows::<3>(0),
            rx.fixed_rows::<3>(3) - tx.fixed_rows::<3>(3),
        )
    }

    fn range(&self, delta_r: &Vector3<f64>) -> Result<f64, ODError> {
        let range = delta_r.norm();
        ensure!(
            range > 0.0 && range.is_finite(),
            ModelFailureSnafu {
                observable: self.observable,
                details: format!("degenerate range of {range} m"),
            }
        );
        Ok(range)
    }

    /// Splits a 1x6 row of partials w.r.t. the receiver into the (transmitter, receiver) pair.
    fn opposite_pair(rx_partials: DMatrix<f64>) -> Vec<DMatrix<f64>> {
        vec![-&rx_partials, rx_partials]
    }
}

impl ObservationModel for GeometricObservation {
    fn observable(&self) -> ObservableType {
        self.observable
    }

    fn compute(&self, states: &[Vector6<f64>], _epochs: &[Epoch]) -> Result<DVector<f64>, ODError> {
        self.check(states)?;
        match self.observable {
            ObservableType::Position => Ok(DVector::from_iterator(
                3,
                states[0].fixed_rows::<3>(0).iter().copied(),
            )),
            ObservableType::OneWayRange => {
                let (delta_r, _) = Self::relative(states);
                Ok(DVector::from_element(1, self.range(&delta_r)?))
            }
            ObservableType::AngularPosition => {
                // Line of sight from the receiver to the transmitter
                let (delta_r, _) = Self::relative(states);
                let los = -delta_r;
                let range = self.range(&los)?;
                let ra_deg = los.y.atan2(los.x).to_degrees();
                let dec_deg = (los.z / range).asin().to_degrees();
                Ok(DVector::from_column_slice(&[ra_deg, dec_deg]))
            }
            ObservableType::OneWayDoppler => {
                let (delta_r, delta_v) = Self::relative(states);
                let range = self.range(&delta_r)?;
                let range_rate = delta_r.dot(&delta_v) / range;
                Ok(DVector::from_element(1, range_rate / SPEED_OF_LIGHT_M_S))
            }
        }
    }

    fn state_partials(
        &self,
        states: &[Vector6<f64>],
        _epochs: &[Epoch],
    ) -> Result<Vec<DMatrix<f64>>, ODError> {
        self.check(states)?;
        match self.observable {
            ObservableType::Position => {
                let mut h = DMatrix::zeros(3, 6);
                h.fixed_view_mut::<3, 3>(0, 0).fill_with_identity();
                Ok(vec![h])
            }
            ObservableType::OneWayRange => {
                let (delta_r, _) = Self::relative(states);
                let range = self.range(&delta_r)?;
                let unit = delta_r / range;
                let mut h = DMatrix::zeros(1, 6);
                h.fixed_view_mut::<1, 3>(0, 0).copy_from(&unit.transpose());
                Ok(Self::opposite_pair(h))
            }
            ObservableType::AngularPosition => {
                let (delta_r, _) = Self::relative(states);
                let los = -delta_r;
                let range = self.range(&los)?;
                let rho_xy_sq = los.x.powi(2) + los.y.powi(2);
                ensure!(
                    rho_xy_sq > 0.0,
                    ModelFailureSnafu {
                        observable: self.observable,
                        details: "line of sight along the pole, right ascension undefined",
                    }
                );
                let rho_xy = rho_xy_sq.sqrt();
                let to_deg = 1.0_f64.to_degrees();
                // Partials w.r.t. the line of sight, i.e. w.r.t. the transmitter position
                let mut h_tx = DMatrix::zeros(2, 6);
                h_tx[(0, 0)] = -los.y / rho_xy_sq * to_deg;
                h_tx[(0, 1)] = los.x / rho_xy_sq * to_deg;
                let denom = range.powi(2) * rho_xy;
                h_tx[(1, 0)] = -los.x * los.z / denom * to_deg;
                h_tx[(1, 1)] = -los.y * los.z / denom * to_deg;
                h_tx[(1, 2)] = rho_xy / range.powi(2) * to_deg;
                Ok(vec![h_tx.clone(), -h_tx])
            }
            ObservableType::OneWayDoppler => {
                let (delta_r, delta_v) = Self::relative(states);
                let range = self.range(&delta_r)?;
                let unit = delta_r / range;
                let range_rate = unit.dot(&delta_v);
                let d_pos = (delta_v - unit * range_rate) / range;
                let mut h = DMatrix::zeros(1, 6);
                h.fixed_view_mut::<1, 3>(0, 0)
                    .copy_from(&(d_pos / SPEED_OF_LIGHT_M_S).transpose());
                h.fixed_view_mut::<1, 3>(0, 3)
                    .copy_from(&(unit / SPEED_OF_LIGHT_M_S).transpose());
                Ok(Self::opposite_pair(h))
            }
        }
    }

    fn residual(&self, observed: &DVector<f64>, computed: &DVector<f64>) -> DVector<f64> {
        let mut resid = observed - computed;
        if self.observable == ObservableType::AngularPosition {
            // Right ascension wraps around
            resid[0] = (resid[0] + 180.0).rem_euclid(360.0) - 180.0;
        }
        resid
    }
}

/// Observation models keyed by the observable they compute.
#[derive(Clone, Debug, Default)]
pub struct ObservationModels {
    models: BTreeMap<ObservableType, Arc<dyn ObservationModel>>,
}

impl ObservationModels {
    /// Geometric models for all of the provided observables.
    pub fn geometric(observables: &[ObservableType]) -> Self {
        let mut me = Self::default();
        for observable in observables {
            me.insert(Arc::new(GeometricObservation::new(*observable)));
        }
        me
    }

    /// Geometric models for every supported observable.
    pub fn all_geometric() -> Self {
        Self::geometric(&[
            ObservableType::Position,
            ObservableType::OneWayRange,
            ObservableType::AngularPosition,
            ObservableType::OneWayDoppler,
        ])
    }

    /// Adds (or replaces) the model of the observable this model computes.
    pub fn insert(&mut self, model: Arc<dyn ObservationModel>) {
        self.models.insert(model.observable(), model);
    }

    pub fn get(&self, observable: ObservableType) -> Result<&Arc<dyn ObservationModel>, ODError> {
        self.models
            .get(&observable)
            .context(ModelNotConfiguredSnafu { observable })
    }
}
