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
use crate::od::estimate::ParameterSet;
use crate::od::msr::{
    LinkEndType, LinkEnds, ObservableType, ObservationBatch, ObservationModels,
    ObservationTimeSeries,
};
use crate::od::noise::SimulationNoise;
use crate::od::provider::{LinkEndStates, ReferenceProvider};
use crate::od::viability::ViabilityCalculatorSet;
use crate::od::ODError;
use hifitime::Epoch;

mod schedule;

pub use schedule::{ObservationSchedule, ScheduledTimes};

/// One simulated observation and the link end states it was computed from
#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedObservation {
    /// Observation including the estimated biases
    pub value: DVector<f64>,
    /// Observation of the model alone
    pub ideal: DVector<f64>,
    pub link_end_states: LinkEndStates,
}

/// Simulates observations of link ends from a reference trajectory, dropping those which are not viable.
pub struct ObservationSimulator<'a, P: ReferenceProvider> {
    pub provider: &'a P,
    pub models: &'a ObservationModels,
    pub viability: &'a ViabilityCalculatorSet,
    pub parameters: &'a ParameterSet,
}

impl<'a, P: ReferenceProvider> ObservationSimulator<'a, P> {
    pub fn new(
        provider: &'a P,
        models: &'a ObservationModels,
        viability: &'a ViabilityCalculatorSet,
        parameters: &'a ParameterSet,
    ) -> Self {
        Self {
            provider,
            models,
            viability,
            parameters,
        }
    }

    /// Computes the observation at this epoch, regardless of its viability.
    pub fn evaluate(
        &self,
        trajectory: &P::Trajectory,
        estimate: &DVector<f64>,
        observable: ObservableType,
        link_ends: &LinkEnds,
        reference: LinkEndType,
        epoch: Epoch,
    ) -> Result<SimulatedObservation, ODError> {
        let model = self.models.get(observable)?;
        let link_end_states =
            self.provider
                .link_end_states(trajectory, observable, link_ends, reference, epoch)?;
        let ideal = model.compute(&link_end_states.states, &link_end_states.epochs)?;
        let value = self
            .parameters
            .apply_biases(observable, link_ends, &ideal, estimate);
        Ok(SimulatedObservation {
            value,
            ideal,
            link_end_states,
        })
    }

    /// Whether this simulated observation passes all of the viability calculators of its link ends.
    pub fn is_viable(&self, observation: &SimulatedObservation, link_ends: &LinkEnds) -> bool {
        self.viability.is_viable(
            &observation.link_end_states.states,
            &observation.link_end_states.epochs,
            link_ends,
        )
    }

    /// Computes the observation at this epoch, or None if it is not viable.
    pub fn simulate_epoch(
        &self,
        trajectory: &P::Trajectory,
        estimate: &DVector<f64>,
        observable: ObservableType,
        link_ends: &LinkEnds,
        reference: LinkEndType,
        epoch: Epoch,
    ) -> Result<Option<SimulatedObservation>, ODError> {
        let observation = self.evaluate(trajectory, estimate, observable, link_ends, reference, epoch)?;
        if self.is_viable(&observation, link_ends) {
            Ok(Some(observation))
        } else {
            debug!("dropping {observable} of {link_ends} at {epoch}: not viable");
            Ok(None)
        }
    }

    /// Simulates the observations at the requested epochs, keeping only the viable ones in their original order.
    pub fn simulate(
        &self,
        trajectory: &P::Trajectory,
        estimate: &DVector<f64>,
        observable: ObservableType,
        link_ends: &LinkEnds,
        epochs: &[Epoch],
        reference: LinkEndType,
    ) -> Result<ObservationTimeSeries, ODError> {
        let mut series = ObservationTimeSeries::empty(reference);
        for epoch in epochs {
            if let Some(observation) =
                self.simulate_epoch(trajectory, estimate, observable, link_ends, reference, *epoch)?
            {
                series.push(*epoch, observation.value);
            }
        }
        if series.len() < epochs.len() {
            debug!(
                "{observable} of {link_ends}: {} of {} epochs viable",
                series.len(),
                epochs.len()
            );
        }
        Ok(series)
    }

    /// Propagates the provided parameters and simulates every entry of the schedule.
    /// If noise is provided, it is added after the viability filtering.
    pub fn simulate_observations(
        &self,
        parameters: &DVector<f64>,
        schedule: &ObservationSchedule,
        mut noise: Option<&mut SimulationNoise>,
    ) -> Result<ObservationBatch, ODError> {
        self.parameters.check_vector("simulated parameters", parameters)?;
        let trajectory = self.provider.propagate(parameters)?;

        let mut batch = ObservationBatch::new();
        for (observable, link_ends, times) in schedule.iter() {
            let mut series = self.simulate(
                &trajectory,
                parameters,
                observable,
                link_ends,
                &times.epochs,
                times.reference,
            )?;
            if let Some(noise) = noise.as_deref_mut() {
                for (epoch, value) in series.epochs.iter().zip(series.values.iter_mut()) {
                    noise.apply(observable, *epoch, value);
                }
            }
            batch.insert(observable, link_ends.clone(), series)?;
        }

        info!(
            "simulated {} observations ({} of {} scheduled epochs viable)",
            batch.num_observations(),
            batch.num_epochs(),
            schedule.num_epochs()
        );
        Ok(batch)
    }
}
