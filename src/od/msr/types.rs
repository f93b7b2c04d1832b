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

use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;

use super::{LinkEndType, LinkEnds};
use crate::od::{MissingLinkEndSnafu, ODError, UnexpectedLinkEndSnafu};

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservableType {
    /// Cartesian position of the observed body, in meters
    Position,
    /// Distance between transmitter and receiver, in meters
    OneWayRange,
    /// Right ascension and declination of the transmitter as seen from the receiver, in degrees
    AngularPosition,
    /// Range rate between transmitter and receiver divided by the speed of light (unitless)
    OneWayDoppler,
}

impl ObservableType {
    /// Number of scalar components in one observation of this type
    pub fn size(self) -> usize {
        match self {
            Self::Position => 3,
            Self::OneWayRange | Self::OneWayDoppler => 1,
            Self::AngularPosition => 2,
        }
    }

    /// Returns the expected unit of this observable
    pub fn unit(self) -> &'static str {
        match self {
            Self::Position | Self::OneWayRange => "m",
            Self::AngularPosition => "deg",
            Self::OneWayDoppler => "-",
        }
    }

    /// Link end roles used by this observable, in the order of the link end states passed to models and viability calculators.
    pub fn link_end_roles(self) -> &'static [LinkEndType] {
        match self {
            Self::Position => &[LinkEndType::ObservedBody],
            Self::OneWayRange | Self::AngularPosition | Self::OneWayDoppler => {
                &[LinkEndType::Transmitter, LinkEndType::Receiver]
            }
        }
    }

    /// Checks that the provided link ends contain exactly the roles required by this observable.
    pub fn check_link_ends(self, link_ends: &LinkEnds) -> Result<(), ODError> {
        let roles = self.link_end_roles();
        for role in roles {
            ensure!(
                link_ends.contains(*role),
                MissingLinkEndSnafu {
                    observable: self,
                    role: *role,
                    link_ends: link_ends.clone(),
                }
            );
        }
        if let Some(extra) = link_ends.roles().find(|role| !roles.contains(role)) {
            return UnexpectedLinkEndSnafu {
                observable: self,
                role: extra,
                link_ends: link_ends.clone(),
            }
            .fail();
        }
        Ok(())
    }
}

impl fmt::Display for ObservableType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Position => write!(f, "position"),
            Self::OneWayRange => write!(f, "one-way range"),
            Self::AngularPosition => write!(f, "angular position"),
            Self::OneWayDoppler => write!(f, "one-way Doppler"),
        }
    }
}
