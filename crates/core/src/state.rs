//! Per-replica file record and its legal transitions.
//!
//! The three status fields of a [`ReplicaFileInfo`] move independently. Every
//! ingestion event maps to exactly one transition method here; stores load a
//! record, apply the transition and persist the whole record in one commit.

use crate::error::{Error, Result};
use crate::status::{ChecksumStatus, FileListStatus, ReplicaStoreState};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// State of one file on one replica.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaFileInfo {
    pub guid: i64,
    pub file_id: i64,
    pub replica_id: String,
    /// Checksum last reported by the replica, if any.
    pub checksum: Option<String>,
    pub upload_status: ReplicaStoreState,
    pub filelist_status: FileListStatus,
    pub checksum_status: ChecksumStatus,
    pub filelist_checked_at: Option<OffsetDateTime>,
    pub checksum_checked_at: Option<OffsetDateTime>,
}

impl ReplicaFileInfo {
    /// A freshly created record: nothing known yet.
    pub fn new(guid: i64, file_id: i64, replica_id: impl Into<String>) -> Self {
        Self {
            guid,
            file_id,
            replica_id: replica_id.into(),
            checksum: None,
            upload_status: ReplicaStoreState::Unknown,
            filelist_status: FileListStatus::NoFilelistStatus,
            checksum_status: ChecksumStatus::Unknown,
            filelist_checked_at: None,
            checksum_checked_at: None,
        }
    }

    /// Whether this record takes part in checksum voting.
    pub fn is_vote_candidate(&self) -> bool {
        self.filelist_status == FileListStatus::Ok && self.checksum.is_some()
    }

    /// Check that the file may be (re)registered for upload with `checksum`.
    ///
    /// Registration is refused once any replica has completed the upload, and
    /// whenever a different checksum was registered before.
    pub fn check_registration(&self, filename: &str, checksum: &str) -> Result<()> {
        if self.upload_status == ReplicaStoreState::UploadCompleted {
            return Err(Error::IllegalState(format!(
                "the file '{filename}' has already been completely uploaded to replica '{}'",
                self.replica_id
            )));
        }
        if let Some(existing) = self.checksum.as_deref()
            && existing != checksum
        {
            return Err(Error::IllegalState(format!(
                "the file '{filename}' with checksum '{existing}' has attempted being uploaded \
                 with the checksum '{checksum}'"
            )));
        }
        Ok(())
    }

    /// Register-for-upload. Call only after [`check_registration`] passed for
    /// every replica of the file.
    ///
    /// [`check_registration`]: Self::check_registration
    pub fn register_for_upload(&mut self, checksum: &str) {
        self.checksum = Some(checksum.to_string());
        self.upload_status = ReplicaStoreState::Unknown;
        self.filelist_status = FileListStatus::NoFilelistStatus;
        self.checksum_status = ChecksumStatus::Unknown;
    }

    /// The file was listed by a filelist job.
    pub fn record_listed(&mut self, now: OffsetDateTime) {
        self.filelist_status = FileListStatus::Ok;
        self.filelist_checked_at = Some(now);
    }

    /// The file was listed with `checksum` by a checksum job.
    pub fn record_checksum(&mut self, checksum: &str, now: OffsetDateTime) {
        self.set_reported_checksum(checksum);
        self.upload_status = ReplicaStoreState::UploadCompleted;
        self.filelist_status = FileListStatus::Ok;
        self.filelist_checked_at = Some(now);
        self.checksum_checked_at = Some(now);
    }

    /// The file was absent from a filelist or checksum job for this replica.
    pub fn record_missing(&mut self, now: OffsetDateTime) {
        self.filelist_status = FileListStatus::Missing;
        self.upload_status = ReplicaStoreState::UploadFailed;
        self.filelist_checked_at = Some(now);
        // Only files that are present can be judged, good or corrupt.
        self.checksum_status = ChecksumStatus::Unknown;
    }

    /// Result of a single-file checksum request. `None` means the replica
    /// does not hold the file; the stored checksum is then left untouched.
    pub fn record_single_checksum(&mut self, checksum: Option<&str>, now: OffsetDateTime) {
        match checksum {
            Some(checksum) => self.record_checksum(checksum, now),
            None => {
                self.filelist_status = FileListStatus::Missing;
                self.checksum_status = ChecksumStatus::Unknown;
                self.filelist_checked_at = Some(now);
            }
        }
    }

    /// Apply the outcome of a checksum vote to this record.
    pub fn record_vote(&mut self, status: ChecksumStatus, now: OffsetDateTime) {
        self.checksum_status = status;
        self.checksum_checked_at = Some(now);
        match status {
            ChecksumStatus::Ok => self.upload_status = ReplicaStoreState::UploadCompleted,
            ChecksumStatus::Corrupt => self.upload_status = ReplicaStoreState::UploadFailed,
            ChecksumStatus::Unknown => {}
        }
    }

    /// Explicit upload-state change.
    ///
    /// A completed upload implies the file is present; its checksum status is
    /// left for the next vote. A failed upload means the file is missing, and
    /// any other state means nothing is known about presence. Neither of
    /// those takes part in voting.
    pub fn set_upload_state(&mut self, state: ReplicaStoreState) {
        self.upload_status = state;
        match state {
            ReplicaStoreState::UploadCompleted => self.filelist_status = FileListStatus::Ok,
            ReplicaStoreState::UploadFailed => {
                self.filelist_status = FileListStatus::Missing;
                self.checksum_status = ChecksumStatus::Unknown;
            }
            _ => {
                self.filelist_status = FileListStatus::NoFilelistStatus;
                self.checksum_status = ChecksumStatus::Unknown;
            }
        }
    }

    /// Explicit correction of both upload state and reported checksum.
    /// Returns whether the reported checksum changed.
    pub fn correct(&mut self, state: ReplicaStoreState, checksum: &str) -> bool {
        let changed = self.checksum.as_deref() != Some(checksum);
        self.set_reported_checksum(checksum);
        self.set_upload_state(state);
        changed
    }

    /// Import a state recorded by the file-based registry.
    pub fn import_state(&mut self, checksum: &str, state: ReplicaStoreState, at: OffsetDateTime) {
        self.checksum = Some(checksum.to_string());
        self.upload_status = state;
        let (filelist, status) = match state {
            ReplicaStoreState::UploadCompleted => (FileListStatus::Ok, ChecksumStatus::Ok),
            ReplicaStoreState::UploadFailed => (FileListStatus::Missing, ChecksumStatus::Unknown),
            _ => (FileListStatus::NoFilelistStatus, ChecksumStatus::Unknown),
        };
        self.filelist_status = filelist;
        self.checksum_status = status;
        self.filelist_checked_at = Some(at);
        self.checksum_checked_at = Some(at);
    }

    fn set_reported_checksum(&mut self, checksum: &str) {
        if self.checksum.as_deref() != Some(checksum) {
            self.checksum = Some(checksum.to_string());
            self.checksum_status = ChecksumStatus::Unknown;
        }
    }
}
