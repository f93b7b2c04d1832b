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

mod input;
mod output;
mod param;
pub mod partials;

pub use input::{
    AprioriInformation, EstimationInput, EstimationOptions, LinkWeight, ViabilityPolicy,
    WeightSpecification,
};
pub use output::{EstimationOutput, EstimationStatus, IterationRecord};
pub use param::{BiasKind, EstimableParameter, ParameterBlock, ParameterSet};
pub use partials::PartialsAssembler;
