//! Replica repository trait.

use crate::error::MetadataResult;
use crate::models::ReplicaRow;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for the replica table.
#[async_trait]
pub trait ReplicaRepo: Send + Sync {
    /// List all replicas, ordered by id.
    async fn list_replicas(&self) -> MetadataResult<Vec<ReplicaRow>>;

    /// Get a replica by id.
    async fn get_replica(&self, replica_id: &str) -> MetadataResult<Option<ReplicaRow>>;

    /// Insert a replica. Existing files get a row for it in the same commit.
    async fn insert_replica(&self, replica: &ReplicaRow) -> MetadataResult<()>;

    /// Record when a filelist job for the replica was last ingested.
    async fn set_filelist_updated(
        &self,
        replica_id: &str,
        at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Record when a checksum job for the replica was last ingested.
    async fn set_checksum_updated(
        &self,
        replica_id: &str,
        at: OffsetDateTime,
    ) -> MetadataResult<()>;
}
