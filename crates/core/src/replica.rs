//! Replica identity and type.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of storage target a replica is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaType {
    /// Stores the archived file bytes.
    Bitarchive,
    /// Stores checksums only.
    Checksum,
}

impl ReplicaType {
    /// Persistence code.
    pub fn code(self) -> i32 {
        match self {
            Self::Bitarchive => 1,
            Self::Checksum => 2,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            1 => Ok(Self::Bitarchive),
            2 => Ok(Self::Checksum),
            other => Err(Error::UnknownId(format!("no replica type with code {other}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bitarchive => "bitarchive",
            Self::Checksum => "checksum",
        }
    }
}

impl fmt::Display for ReplicaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplicaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bitarchive" => Ok(Self::Bitarchive),
            "checksum" => Ok(Self::Checksum),
            _ => Err(Error::ArgumentNotValid(format!("unknown replica type '{s}'"))),
        }
    }
}

/// One configured storage replica.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Replica {
    /// Stable identifier (e.g. "ONE").
    pub id: String,
    /// Display name.
    pub name: String,
    #[serde(rename = "type")]
    pub replica_type: ReplicaType,
}

impl Replica {
    pub fn new(id: impl Into<String>, name: impl Into<String>, replica_type: ReplicaType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            replica_type,
        }
    }

    pub fn is_bitarchive(&self) -> bool {
        self.replica_type == ReplicaType::Bitarchive
    }
}

impl fmt::Display for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.id, self.name, self.replica_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replica_type_parse() {
        assert_eq!(
            "BITARCHIVE".parse::<ReplicaType>().unwrap(),
            ReplicaType::Bitarchive
        );
        assert_eq!(
            "checksum".parse::<ReplicaType>().unwrap(),
            ReplicaType::Checksum
        );
        assert!("tape".parse::<ReplicaType>().is_err());
        assert_eq!(ReplicaType::from_code(2).unwrap(), ReplicaType::Checksum);
    }
}
