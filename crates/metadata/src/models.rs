//! Database models mapping to the replica state schema.
//!
//! Status columns hold the stable persistence codes of the core enums.

use crate::error::MetadataResult;
use bitpres_core::{
    ChecksumStatus, FileListStatus, Replica, ReplicaFileInfo, ReplicaStoreState, ReplicaType,
};
use sqlx::FromRow;
use time::OffsetDateTime;

// =============================================================================
// Replicas
// =============================================================================

/// Replica record.
#[derive(Debug, Clone, FromRow)]
pub struct ReplicaRow {
    pub replica_id: String,
    pub replica_name: String,
    pub replica_type: i32,
    pub filelist_updated: Option<OffsetDateTime>,
    pub checksum_updated: Option<OffsetDateTime>,
}

impl ReplicaRow {
    pub fn from_replica(replica: &Replica) -> Self {
        Self {
            replica_id: replica.id.clone(),
            replica_name: replica.name.clone(),
            replica_type: replica.replica_type.code(),
            filelist_updated: None,
            checksum_updated: None,
        }
    }

    pub fn to_replica(&self) -> MetadataResult<Replica> {
        Ok(Replica::new(
            self.replica_id.clone(),
            self.replica_name.clone(),
            ReplicaType::from_code(self.replica_type)?,
        ))
    }
}

// =============================================================================
// Files
// =============================================================================

/// File record. The checksum lives on the per-replica rows.
#[derive(Debug, Clone, FromRow)]
pub struct FileRow {
    pub file_id: i64,
    pub filename: String,
}

// =============================================================================
// Replica file info
// =============================================================================

/// State of one file on one replica.
#[derive(Debug, Clone, FromRow)]
pub struct ReplicaFileInfoRow {
    pub guid: i64,
    pub file_id: i64,
    pub replica_id: String,
    pub checksum: Option<String>,
    pub upload_status: i32,
    pub filelist_status: i32,
    pub checksum_status: i32,
    pub filelist_checked_at: Option<OffsetDateTime>,
    pub checksum_checked_at: Option<OffsetDateTime>,
}

impl ReplicaFileInfoRow {
    pub fn to_info(&self) -> MetadataResult<ReplicaFileInfo> {
        Ok(ReplicaFileInfo {
            guid: self.guid,
            file_id: self.file_id,
            replica_id: self.replica_id.clone(),
            checksum: self.checksum.clone(),
            upload_status: ReplicaStoreState::from_code(self.upload_status)?,
            filelist_status: FileListStatus::from_code(self.filelist_status)?,
            checksum_status: ChecksumStatus::from_code(self.checksum_status)?,
            filelist_checked_at: self.filelist_checked_at,
            checksum_checked_at: self.checksum_checked_at,
        })
    }

    pub fn from_info(info: &ReplicaFileInfo) -> Self {
        Self {
            guid: info.guid,
            file_id: info.file_id,
            replica_id: info.replica_id.clone(),
            checksum: info.checksum.clone(),
            upload_status: info.upload_status.code(),
            filelist_status: info.filelist_status.code(),
            checksum_status: info.checksum_status.code(),
            filelist_checked_at: info.filelist_checked_at,
            checksum_checked_at: info.checksum_checked_at,
        }
    }
}

/// A replica file info row joined with its filename.
#[derive(Debug, Clone, FromRow)]
pub struct ReplicaFileEntryRow {
    pub guid: i64,
    pub file_id: i64,
    pub filename: String,
}
