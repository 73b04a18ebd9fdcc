//! Replica file info repository trait.

use crate::error::MetadataResult;
use crate::models::{FileRow, ReplicaFileEntryRow, ReplicaFileInfoRow};
use async_trait::async_trait;

/// Which status column a filter applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusColumn {
    Upload,
    Filelist,
    Checksum,
}

impl StatusColumn {
    pub fn column(self) -> &'static str {
        match self {
            Self::Upload => "upload_status",
            Self::Filelist => "filelist_status",
            Self::Checksum => "checksum_status",
        }
    }
}

/// Repository for the replica file info table.
#[async_trait]
pub trait ReplicaFileRepo: Send + Sync {
    /// All rows of one file, ordered by replica id.
    async fn list_for_file(&self, file_id: i64) -> MetadataResult<Vec<ReplicaFileInfoRow>>;

    /// The row of one file on one replica.
    async fn get_replica_file(
        &self,
        file_id: i64,
        replica_id: &str,
    ) -> MetadataResult<Option<ReplicaFileInfoRow>>;

    /// A row by guid.
    async fn get_replica_file_by_guid(&self, guid: i64)
    -> MetadataResult<Option<ReplicaFileInfoRow>>;

    /// Persist every mutable field of each row in one commit.
    async fn update_replica_files(&self, rows: &[ReplicaFileInfoRow]) -> MetadataResult<()>;

    /// Every row of a replica with its filename.
    async fn list_entries_for_replica(
        &self,
        replica_id: &str,
    ) -> MetadataResult<Vec<ReplicaFileEntryRow>>;

    /// Sorted filenames whose `column` on `replica_id` holds one of `codes`.
    async fn filenames_with_status(
        &self,
        replica_id: &str,
        column: StatusColumn,
        codes: &[i32],
    ) -> MetadataResult<Vec<String>>;

    /// Number of rows whose `column` on `replica_id` holds one of `codes`.
    async fn count_with_status(
        &self,
        replica_id: &str,
        column: StatusColumn,
        codes: &[i32],
    ) -> MetadataResult<i64>;

    /// Every file with at least one vote candidate row.
    async fn files_with_listed_rows(&self) -> MetadataResult<Vec<FileRow>>;
}
