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
use crate::od::{
    EpochValueMismatchSnafu, ODError, ObservationSizeSnafu, UnsortedEpochsSnafu,
    UnsortedTimeSeriesSnafu,
};
use crate::time::Epoch;
use snafu::ensure;
use std::collections::BTreeMap;
use std::fmt;

use super::{LinkEndType, LinkEnds, ObservableType};

/// Observations of a single observable and link ends, time tagged at the reference link end.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationTimeSeries {
    /// Observation epochs, in non-decreasing order
    pub epochs: Vec<Epoch>,
    /// One observation per epoch, each of the size of the observable
    pub values: Vec<DVector<f64>>,
    /// Link end at which the epochs are defined
    pub reference: LinkEndType,
}

impl ObservationTimeSeries {
    /// Builds a new time series, checking that there is one value per epoch and that epochs are sorted.
    pub fn new(
        epochs: Vec<Epoch>,
        values: Vec<DVector<f64>>,
        reference: LinkEndType,
    ) -> Result<Self, ODError> {
        ensure!(
            epochs.len() == values.len(),
            EpochValueMismatchSnafu {
                epochs: epochs.len(),
                values: values.len(),
            }
        );
        if let Some(index) = epochs.windows(2).position(|w| w[1] < w[0]) {
            return UnsortedTimeSeriesSnafu { index: index + 1 }.fail();
        }
        Ok(Self {
            epochs,
            values,
            reference,
        })
    }

    pub fn empty(reference: LinkEndType) -> Self {
        Self {
            epochs: Vec::new(),
            values: Vec::new(),
            reference,
        }
    }

    pub(crate) fn push(&mut self, epoch: Epoch, value: DVector<f64>) {
        self.epochs.push(epoch);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.epochs.windows(2).all(|w| w[0] <= w[1])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Epoch, &DVector<f64>)> {
        self.epochs.iter().zip(self.values.iter())
    }

    /// All of the observation values concatenated in epoch order.
    pub fn stacked(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.values.iter().map(|v| v.len()).sum(),
            self.values.iter().flat_map(|v| v.iter().copied()),
        )
    }
}

/// The full set of observations exchanged between the simulation and the estimation,
/// keyed by observable type and then by link ends. Iteration order is the order of the stacked residuals.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservationBatch {
    data: BTreeMap<ObservableType, BTreeMap<LinkEnds, ObservationTimeSeries>>,
}

impl ObservationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the observations of the provided observable and link ends.
    pub fn insert(
        &mut self,
        observable: ObservableType,
        link_ends: LinkEnds,
        series: ObservationTimeSeries,
    ) -> Result<(), ODError> {
        observable.check_link_ends(&link_ends)?;
        ensure!(
            series.is_sorted(),
            UnsortedEpochsSnafu {
                observable,
                link_ends: link_ends.clone(),
            }
        );
        if let Some(bad) = series.values.iter().find(|v| v.len() != observable.size()) {
            return ObservationSizeSnafu {
                observable,
                expected: observable.size(),
                got: bad.len(),
            }
            .fail();
        }
        self.data
            .entry(observable)
            .or_default()
            .insert(link_ends, series);
        Ok(())
    }

    pub fn get(&self, observable: ObservableType, link_ends: &LinkEnds) -> Option<&ObservationTimeSeries> {
        self.data.get(&observable).and_then(|m| m.get(link_ends))
    }

    /// Iterates over all of the (observable, link ends, observations) entries, observable-major.
    pub fn iter(&self) -> impl Iterator<Item = (ObservableType, &LinkEnds, &ObservationTimeSeries)> {
        self.data.iter().flat_map(|(observable, per_link)| {
            per_link
                .iter()
                .map(move |(link_ends, series)| (*observable, link_ends, series))
        })
    }

    pub fn observables(&self) -> impl Iterator<Item = ObservableType> + '_ {
        self.data.keys().copied()
    }

    /// Number of (observable, link ends) entries
    pub fn num_segments(&self) -> usize {
        self.data.values().map(|m| m.len()).sum()
    }

    /// Number of observation epochs, all entries combined
    pub fn num_epochs(&self) -> usize {
        self.iter().map(|(_, _, series)| series.len()).sum()
    }

    /// Number of scalar observations, all entries combined
    pub fn num_observations(&self) -> usize {
        self.iter()
            .map(|(observable, _, series)| observable.size() * series.len())
            .sum()
    }

    /// True if there is no observation at all, even if some entries exist.
    pub fn is_empty(&self) -> bool {
        self.num_epochs() == 0
    }

    /// All observation values concatenated in the batch order.
    pub fn stacked(&self) -> DVector<f64> {
        let parts: Vec<DVector<f64>> = self.iter().map(|(_, _, series)| series.stacked()).collect();
        DVector::from_iterator(
            parts.iter().map(|p| p.len()).sum(),
            parts.iter().flat_map(|p| p.iter().copied()),
        )
    }
}

impl fmt::Display for ObservationBatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (observable, link_ends, series) in self.iter() {
            writeln!(
                f,
                "{observable} {link_ends}: {} epochs (ref. {})",
                series.len(),
                series.reference
            )?;
        }
        Ok(())
    }
}
