//! Status enumerations for replica file records.
//!
//! Every status has two independent integer views:
//! - `code()` / `from_code()`: the stable persistence encoding. Never reorder.
//! - `ReplicaStoreState::rank()`: the severity order used when collapsing
//!   per-replica states into one aggregate state.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upload state of a file on one replica.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicaStoreState {
    /// Upload has been initiated.
    UploadStarted,
    /// Data has been transferred but not yet verified.
    DataUploaded,
    /// Upload finished and verified.
    UploadCompleted,
    /// Upload failed or the copy was found missing/corrupt.
    UploadFailed,
    /// Nothing is known about the upload.
    #[serde(rename = "UNKNOWN_UPLOAD_STATE")]
    Unknown,
}

impl ReplicaStoreState {
    pub const ALL: [ReplicaStoreState; 5] = [
        Self::UploadStarted,
        Self::DataUploaded,
        Self::UploadCompleted,
        Self::UploadFailed,
        Self::Unknown,
    ];

    /// Persistence code.
    pub fn code(self) -> i32 {
        match self {
            Self::UploadStarted => 0,
            Self::DataUploaded => 1,
            Self::UploadCompleted => 2,
            Self::UploadFailed => 3,
            Self::Unknown => 4,
        }
    }

    /// Decode a persistence code.
    pub fn from_code(code: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| Error::UnknownId(format!("no upload state with code {code}")))
    }

    /// Severity rank for aggregation, worst first. The lowest rank wins when
    /// several replicas report different states.
    ///
    /// | state                | rank |
    /// |----------------------|------|
    /// | UPLOAD_STARTED       | 0    |
    /// | DATA_UPLOADED        | 1    |
    /// | UPLOAD_COMPLETED     | 2    |
    /// | UNKNOWN_UPLOAD_STATE | 3    |
    /// | UPLOAD_FAILED        | 4    |
    ///
    /// UPLOAD_FAILED never reaches the ranking: any failed replica makes the
    /// aggregate failed before ranks are compared.
    pub fn rank(self) -> u8 {
        match self {
            Self::UploadStarted => 0,
            Self::DataUploaded => 1,
            Self::UploadCompleted => 2,
            Self::Unknown => 3,
            Self::UploadFailed => 4,
        }
    }

    /// Name used in the legacy file format and in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UploadStarted => "UPLOAD_STARTED",
            Self::DataUploaded => "DATA_UPLOADED",
            Self::UploadCompleted => "UPLOAD_COMPLETED",
            Self::UploadFailed => "UPLOAD_FAILED",
            Self::Unknown => "UNKNOWN_UPLOAD_STATE",
        }
    }
}

impl fmt::Display for ReplicaStoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplicaStoreState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| Error::ArgumentNotValid(format!("unknown upload state '{s}'")))
    }
}

/// Result of the latest filelist check of a file on one replica.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileListStatus {
    /// No filelist job has reported on this file yet.
    NoFilelistStatus,
    /// The last filelist job did not list the file.
    Missing,
    /// The last filelist job listed the file.
    Ok,
}

impl FileListStatus {
    pub const ALL: [FileListStatus; 3] = [Self::NoFilelistStatus, Self::Missing, Self::Ok];

    pub fn code(self) -> i32 {
        match self {
            Self::NoFilelistStatus => 0,
            Self::Missing => 1,
            Self::Ok => 2,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| Error::UnknownId(format!("no filelist status with code {code}")))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoFilelistStatus => "NO_FILELIST_STATUS",
            Self::Missing => "MISSING",
            Self::Ok => "OK",
        }
    }
}

impl fmt::Display for FileListStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the latest checksum vote for a file on one replica.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChecksumStatus {
    /// Not voted, or the vote had no winner.
    Unknown,
    /// The replica's checksum lost the vote.
    Corrupt,
    /// The replica's checksum matches the canonical checksum.
    Ok,
}

impl ChecksumStatus {
    pub const ALL: [ChecksumStatus; 3] = [Self::Unknown, Self::Corrupt, Self::Ok];

    pub fn code(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::Corrupt => 1,
            Self::Ok => 2,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| Error::UnknownId(format!("no checksum status with code {code}")))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Corrupt => "CORRUPT",
            Self::Ok => "OK",
        }
    }
}

impl fmt::Display for ChecksumStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ReplicaStoreState::UploadStarted.code(), 0);
        assert_eq!(ReplicaStoreState::UploadCompleted.code(), 2);
        assert_eq!(ReplicaStoreState::Unknown.code(), 4);
        assert_eq!(FileListStatus::Missing.code(), 1);
        assert_eq!(ChecksumStatus::Corrupt.code(), 1);
        for state in ReplicaStoreState::ALL {
            assert_eq!(ReplicaStoreState::from_code(state.code()).unwrap(), state);
        }
        assert!(ReplicaStoreState::from_code(42).is_err());
        assert!(FileListStatus::from_code(-1).is_err());
    }

    #[test]
    fn test_rank_is_independent_of_code() {
        // Unknown persists after UploadFailed but ranks before it.
        assert!(ReplicaStoreState::Unknown.code() > ReplicaStoreState::UploadFailed.code());
        assert!(ReplicaStoreState::Unknown.rank() < ReplicaStoreState::UploadFailed.rank());
        assert!(ReplicaStoreState::UploadCompleted.rank() < ReplicaStoreState::Unknown.rank());
    }

    #[test]
    fn test_parse_state_names() {
        assert_eq!(
            "UNKNOWN_UPLOAD_STATE".parse::<ReplicaStoreState>().unwrap(),
            ReplicaStoreState::Unknown
        );
        assert_eq!(
            "UPLOAD_COMPLETED".parse::<ReplicaStoreState>().unwrap(),
            ReplicaStoreState::UploadCompleted
        );
        assert!("upload_completed".parse::<ReplicaStoreState>().is_err());
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&ReplicaStoreState::Unknown).unwrap();
        assert_eq!(json, "\"UNKNOWN_UPLOAD_STATE\"");
        let json = serde_json::to_string(&FileListStatus::NoFilelistStatus).unwrap();
        assert_eq!(json, "\"NO_FILELIST_STATUS\"");
    }
}
