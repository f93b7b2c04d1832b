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

use crate::od::msr::{LinkEndType, LinkEnds, ObservableType};
use crate::od::{ODError, UnsortedEpochsSnafu};
use hifitime::{Duration, Epoch, TimeSeries};
use snafu::ensure;
use std::collections::BTreeMap;

/// Requested observation epochs of one observable and link ends.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledTimes {
    pub epochs: Vec<Epoch>,
    /// Link end at which the epochs are defined
    pub reference: LinkEndType,
}

/// Requested observation epochs, keyed by observable type and then by link ends.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservationSchedule {
    entries: BTreeMap<ObservableType, BTreeMap<LinkEnds, ScheduledTimes>>,
}

impl ObservationSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules (or replaces) the epochs of this observable and link ends.
    pub fn insert(
        &mut self,
        observable: ObservableType,
        link_ends: LinkEnds,
        epochs: Vec<Epoch>,
        reference: LinkEndType,
    ) -> Result<(), ODError> {
        observable.check_link_ends(&link_ends)?;
        ensure!(
            epochs.windows(2).all(|w| w[0] <= w[1]),
            UnsortedEpochsSnafu {
                observable,
                link_ends: link_ends.clone(),
            }
        );
        self.entries
            .entry(observable)
            .or_default()
            .insert(link_ends, ScheduledTimes { epochs, reference });
        Ok(())
    }

    /// Schedules evenly spaced epochs between start and end, both included.
    pub fn insert_inclusive(
        &mut self,
        observable: ObservableType,
        link_ends: LinkEnds,
        start: Epoch,
        end: Epoch,
        step: Duration,
        reference: LinkEndType,
    ) -> Result<(), ODError> {
        let epochs: Vec<Epoch> = TimeSeries::inclusive(start, end, step).collect();
        self.insert(observable, link_ends, epochs, reference)
    }

    pub fn get(&self, observable: ObservableType, link_ends: &LinkEnds) -> Option<&ScheduledTimes> {
        self.entries.get(&observable).and_then(|m| m.get(link_ends))
    }

    /// Iterates over all of the entries, observable-major.
    pub fn iter(&self) -> impl Iterator<Item = (ObservableType, &LinkEnds, &ScheduledTimes)> {
        self.entries.iter().flat_map(|(observable, per_link)| {
            per_link
                .iter()
                .map(move |(link_ends, times)| (*observable, link_ends, times))
        })
    }

    /// Total number of scheduled epochs
    pub fn num_epochs(&self) -> usize {
        self.iter().map(|(_, _, times)| times.epochs.len()).sum()
    }
}
