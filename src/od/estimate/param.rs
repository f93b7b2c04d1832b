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

use crate::io::ConfigRepr;
use crate::linalg::{DMatrix, DVector};
use crate::od::msr::{LinkEnds, ObservableType};
use crate::od::{DimensionMismatchSnafu, DuplicateParameterSnafu, InvalidParameterSnafu, ODError};
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasKind {
    /// Added to the ideal observation
    Absolute,
    /// Multiplied by the ideal observation, and the product added to it
    Relative,
}

/// A block of the estimated parameter vector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EstimableParameter {
    /// Cartesian position and velocity of the body at the start of the arc (m, m/s)
    InitialState { body: String },
    /// Gravitational parameter of the body (m^3/s^2)
    GravitationalParameter { body: String },
    RadiationPressureCoefficient { body: String },
    DragCoefficient { body: String },
    /// Constant acceleration acting on the body, inertial frame (m/s^2)
    ConstantEmpiricalAcceleration { body: String },
    /// Observation bias of one observable and link ends, one entry per observable component
    ObservationBias {
        observable: ObservableType,
        link_ends: LinkEnds,
        kind: BiasKind,
    },
    /// Cosine spherical harmonic coefficients, ordered by degree then order
    SphericalHarmonicCosine {
        body: String,
        min_degree: u8,
        max_degree: u8,
        min_order: u8,
        max_order: u8,
    },
    /// Sine spherical harmonic coefficients, ordered by degree then order; order zero is skipped
    SphericalHarmonicSine {
        body: String,
        min_degree: u8,
        max_degree: u8,
        min_order: u8,
        max_order: u8,
    },
    /// Body fixed position of the station (m)
    GroundStationPosition { body: String, station: String },
}

impl EstimableParameter {
    /// Degree and order of each coefficient of a spherical harmonic block, empty otherwise.
    pub fn harmonic_indices(&self) -> Vec<(u8, u8)> {
        match self {
            Self::SphericalHarmonicCosine {
                min_degree,
                max_degree,
                min_order,
                max_order,
                ..
            } => harmonics(*min_degree, *max_degree, *min_order, *max_order, false),
            Self::SphericalHarmonicSine {
                min_degree,
                max_degree,
                min_order,
                max_order,
                ..
            } => harmonics(*min_degree, *max_degree, *min_order, *max_order, true),
            _ => Vec::new(),
        }
    }

    /// Number of entries of this block in the parameter vector
    pub fn size(&self) -> usize {
        match self {
            Self::InitialState { .. } => 6,
            Self::GravitationalParameter { .. }
            | Self::RadiationPressureCoefficient { .. }
            | Self::DragCoefficient { .. } => 1,
            Self::ConstantEmpiricalAcceleration { .. } | Self::GroundStationPosition { .. } => 3,
            Self::ObservationBias { observable, .. } => observable.size(),
            Self::SphericalHarmonicCosine { .. } | Self::SphericalHarmonicSine { .. } => {
                self.harmonic_indices().len()
            }
        }
    }

    pub fn is_initial_state(&self) -> bool {
        matches!(self, Self::InitialState { .. })
    }

    /// Name of each entry of this block
    pub fn component_names(&self) -> Vec<String> {
        match self {
            Self::InitialState { body } => ["x", "y", "z", "vx", "vy", "vz"]
                .iter()
                .map(|c| format!("{body} {c}"))
                .collect(),
            Self::ConstantEmpiricalAcceleration { body } => ["ax", "ay", "az"]
                .iter()
                .map(|c| format!("{body} {c}"))
                .collect(),
            Self::GroundStationPosition { body, station } => ["x", "y", "z"]
                .iter()
                .map(|c| format!("{body}/{station} {c}"))
                .collect(),
            Self::SphericalHarmonicCosine { body, .. } => self
                .harmonic_indices()
                .iter()
                .map(|(n, m)| format!("{body} C{n},{m}"))
                .collect(),
            Self::SphericalHarmonicSine { body, .. } => self
                .harmonic_indices()
                .iter()
                .map(|(n, m)| format!("{body} S{n},{m}"))
                .collect(),
            Self::ObservationBias { .. } => (0..self.size()).map(|i| format!("{self} #{i}")).collect(),
            _ => vec![format!("{self}")],
        }
    }

    fn check(&self) -> Result<(), ODError> {
        if let Self::SphericalHarmonicCosine {
            min_degree,
            max_degree,
            min_order,
            max_order,
            ..
        }
        | Self::SphericalHarmonicSine {
            min_degree,
            max_degree,
            min_order,
            max_order,
            ..
        } = self
        {
            ensure!(
                min_degree <= max_degree && min_order <= max_order,
                InvalidParameterSnafu {
                    name: self.to_string(),
                    reason: "degree and order ranges must be non-decreasing".to_string(),
                }
            );
        }
        if let Self::ObservationBias {
            observable,
            link_ends,
            ..
        } = self
        {
            observable.check_link_ends(link_ends)?;
        }
        ensure!(
            self.size() > 0,
            InvalidParameterSnafu {
                name: self.to_string(),
                reason: "block has no entry".to_string(),
            }
        );
        Ok(())
    }
}

fn harmonics(min_degree: u8, max_degree: u8, min_order: u8, max_order: u8, skip_zero_order: bool) -> Vec<(u8, u8)> {
    let mut indices = Vec::new();
    for n in min_degree..=max_degree {
        for m in min_order..=max_order.min(n) {
            if skip_zero_order && m == 0 {
                continue;
            }
            indices.push((n, m));
        }
    }
    indices
}

impl ConfigRepr for EstimableParameter {}

impl fmt::Display for EstimableParameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InitialState { body } => write!(f, "initial state of {body}"),
            Self::GravitationalParameter { body } => write!(f, "GM of {body}"),
            Self::RadiationPressureCoefficient { body } => write!(f, "Cr of {body}"),
            Self::DragCoefficient { body } => write!(f, "Cd of {body}"),
            Self::ConstantEmpiricalAcceleration { body } => {
                write!(f, "empirical acceleration of {body}")
            }
            Self::ObservationBias {
                observable,
                link_ends,
                kind,
            } => write!(f, "{kind:?} {observable} bias of {link_ends}"),
            Self::SphericalHarmonicCosine {
                body,
                min_degree,
                max_degree,
                min_order,
                max_order,
            } => write!(
                f,
                "C({min_degree}..{max_degree}, {min_order}..{max_order}) of {body}"
            ),
            Self::SphericalHarmonicSine {
                body,
                min_degree,
                max_degree,
                min_order,
                max_order,
            } => write!(
                f,
                "S({min_degree}..{max_degree}, {min_order}..{max_order}) of {body}"
            ),
            Self::GroundStationPosition { body, station } => {
                write!(f, "position of {body}/{station}")
            }
        }
    }
}

/// A parameter and its location in the parameter vector
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterBlock {
    pub parameter: EstimableParameter,
    pub start: usize,
    pub size: usize,
}

/// Ordered set of estimated parameters, which defines the layout of the parameter vector for the whole run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterSet {
    blocks: Vec<ParameterBlock>,
    len: usize,
}

impl ParameterSet {
    /// Builds the parameter set: initial states first, all other blocks in the provided order.
    pub fn new(parameters: Vec<EstimableParameter>) -> Result<Self, ODError> {
        let (states, others): (Vec<_>, Vec<_>) = parameters.into_iter().partition(|p| p.is_initial_state());

        let mut blocks: Vec<ParameterBlock> = Vec::with_capacity(states.len() + others.len());
        let mut start = 0;
        for parameter in states.into_iter().chain(others) {
            parameter.check()?;
            ensure!(
                !blocks.iter().any(|b| b.parameter == parameter),
                DuplicateParameterSnafu {
                    name: parameter.to_string()
                }
            );
            let size = parameter.size();
            blocks.push(ParameterBlock {
                parameter,
                start,
                size,
            });
            start += size;
        }

        Ok(Self { blocks, len: start })
    }

    /// Total length of the parameter vector
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn blocks(&self) -> &[ParameterBlock] {
        &self.blocks
    }

    pub fn block_of(&self, parameter: &EstimableParameter) -> Option<&ParameterBlock> {
        self.blocks.iter().find(|b| &b.parameter == parameter)
    }

    /// Name of every entry of the parameter vector, in order
    pub fn names(&self) -> Vec<String> {
        self.blocks
            .iter()
            .flat_map(|b| b.parameter.component_names())
            .collect()
    }

    /// Checks that the provided vector has the length of this parameter set.
    pub fn check_vector(&self, what: &'static str, vector: &DVector<f64>) -> Result<(), ODError> {
        ensure!(
            vector.len() == self.len,
            DimensionMismatchSnafu {
                what,
                expected: self.len,
                got: vector.len(),
            }
        );
        Ok(())
    }

    fn bias_block(&self, observable: ObservableType, link_ends: &LinkEnds, kind: BiasKind) -> Option<&ParameterBlock> {
        self.blocks.iter().find(|b| match &b.parameter {
            EstimableParameter::ObservationBias {
                observable: o,
                link_ends: l,
                kind: k,
            } => *o == observable && l == link_ends && *k == kind,
            _ => false,
        })
    }

    /// Applies the estimated observation biases of these link ends to the ideal observation.
    pub fn apply_biases(
        &self,
        observable: ObservableType,
        link_ends: &LinkEnds,
        ideal: &DVector<f64>,
        parameters: &DVector<f64>,
    ) -> DVector<f64> {
        let mut biased = ideal.clone();
        if let Some(block) = self.bias_block(observable, link_ends, BiasKind::Absolute) {
            biased += parameters.rows(block.start, block.size);
        }
        if let Some(block) = self.bias_block(observable, link_ends, BiasKind::Relative) {
            biased += ideal.component_mul(&parameters.rows(block.start, block.size));
        }
        biased
    }

    /// Factor applied by the relative bias (if any) to the partials of the ideal observation.
    pub fn relative_bias_scale(
        &self,
        observable: ObservableType,
        link_ends: &LinkEnds,
        parameters: &DVector<f64>,
    ) -> Option<DVector<f64>> {
        self.bias_block(observable, link_ends, BiasKind::Relative)
            .map(|block| parameters.rows(block.start, block.size).add_scalar(1.0))
    }

    /// Adds the partials of the observation with respect to its bias blocks into the provided (size x n) matrix.
    pub fn add_bias_partials(
        &self,
        observable: ObservableType,
        link_ends: &LinkEnds,
        ideal: &DVector<f64>,
        partials: &mut DMatrix<f64>,
    ) {
        if let Some(block) = self.bias_block(observable, link_ends, BiasKind::Absolute) {
            for i in 0..block.size {
                partials[(i, block.start + i)] += 1.0;
            }
        }
        if let Some(block) = self.bias_block(observable, link_ends, BiasKind::Relative) {
            for i in 0..block.size {
                partials[(i, block.start + i)] += ideal[i];
            }
        }
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for block in &self.blocks {
            writeln!(
                f,
                "[{}..{}] {}",
                block.start,
                block.start + block.size,
                block.parameter
            )?;
        }
        Ok(())
    }
}
