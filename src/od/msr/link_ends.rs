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
use std::collections::btree_map::Iter;
use std::collections::BTreeMap;
use std::fmt;

use crate::io::ConfigRepr;

/// Role of a participant in an observation geometry.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkEndType {
    Transmitter,
    Receiver,
    ObservedBody,
}

impl fmt::Display for LinkEndType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Transmitter => write!(f, "transmitter"),
            Self::Receiver => write!(f, "receiver"),
            Self::ObservedBody => write!(f, "observed body"),
        }
    }
}

/// Identifies a link end participant: a body, optionally with a station (or other reference point) on that body.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkEndId {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
}

impl LinkEndId {
    /// A link end at the center of mass of the provided body
    pub fn body<S: Into<String>>(body: S) -> Self {
        Self {
            body: body.into(),
            station: None,
        }
    }

    /// A link end at the provided station of the provided body
    pub fn station<S: Into<String>, T: Into<String>>(body: S, station: T) -> Self {
        Self {
            body: body.into(),
            station: Some(station.into()),
        }
    }
}

impl fmt::Display for LinkEndId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.station {
            Some(station) => write!(f, "{}/{station}", self.body),
            None => write!(f, "{}", self.body),
        }
    }
}

/// Structural identifier of the participants of one observation geometry.
///
/// Equality, ordering and hashing only depend on the (role, identifier) pairs, so this is directly usable as a map key.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkEnds(BTreeMap<LinkEndType, LinkEndId>);

impl LinkEnds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of these link ends with the provided role set (or replaced).
    pub fn with(mut self, role: LinkEndType, id: LinkEndId) -> Self {
        self.0.insert(role, id);
        self
    }

    /// One-way link ends from the transmitter to the receiver
    pub fn one_way(transmitter: LinkEndId, receiver: LinkEndId) -> Self {
        Self::new()
            .with(LinkEndType::Transmitter, transmitter)
            .with(LinkEndType::Receiver, receiver)
    }

    /// Link ends of a direct observation of a body
    pub fn observed(body: LinkEndId) -> Self {
        Self::new().with(LinkEndType::ObservedBody, body)
    }

    pub fn get(&self, role: LinkEndType) -> Option<&LinkEndId> {
        self.0.get(&role)
    }

    pub fn contains(&self, role: LinkEndType) -> bool {
        self.0.contains_key(&role)
    }

    pub fn roles(&self) -> impl Iterator<Item = LinkEndType> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> Iter<'_, LinkEndType, LinkEndId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ConfigRepr for LinkEnds {}

impl fmt::Display for LinkEnds {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, (role, id)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{role}: {id}")?;
        }
        write!(f, "]")
    }
}
