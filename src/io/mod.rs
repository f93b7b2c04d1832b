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

use crate::time::Epoch;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to read configuration file {}: {source}", path.display()))]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse YAML configuration: {source}"))]
    ParseError { source: serde_yaml::Error },
}

/// Types which can be loaded from YAML configuration, either as files or strings.
pub trait ConfigRepr: Debug + Sized + Serialize + DeserializeOwned {
    /// Loads one item from a YAML file
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        from_file(path.as_ref())
    }

    /// Loads a list of items from a YAML file
    fn load_many<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, ConfigError> {
        from_file(path.as_ref())
    }

    /// Loads items keyed by name from a YAML file
    fn load_named<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, Self>, ConfigError> {
        from_file(path.as_ref())
    }

    /// Loads one item from a YAML string
    fn loads(data: &str) -> Result<Self, ConfigError> {
        from_yaml_str(data)
    }

    /// Loads a list of items from a YAML string
    fn loads_many(data: &str) -> Result<Vec<Self>, ConfigError> {
        from_yaml_str(data)
    }
}

fn from_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    debug!("loading configuration from {}", path.display());
    let file = File::open(path).context(ReadSnafu {
        path: path.to_path_buf(),
    })?;
    serde_yaml::from_reader(BufReader::new(file)).context(ParseSnafu)
}

fn from_yaml_str<T: DeserializeOwned>(data: &str) -> Result<T, ConfigError> {
    trace!("parsing YAML:\n{data}");
    serde_yaml::from_str(data).context(ParseSnafu)
}

pub(crate) fn epoch_to_str<S>(epoch: &Epoch, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{epoch}"))
}

/// A deserializer from Epoch string
pub(crate) fn epoch_from_str<'de, D>(deserializer: D) -> Result<Epoch, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Epoch::from_str(&s).map_err(serde::de::Error::custom)
}
