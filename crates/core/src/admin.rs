//! Admin façade shared by the relational store and the file registry.

use crate::error::Result;
use crate::status::ReplicaStoreState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Reply owed to the requester of a pending store operation.
///
/// Held in memory only; lost on restart.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingReply {
    /// Identifier of the request being answered.
    pub message_id: String,
    /// Where the reply goes.
    pub reply_to: String,
}

impl PendingReply {
    pub fn new(message_id: impl Into<String>, reply_to: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            reply_to: reply_to.into(),
        }
    }
}

/// Bookkeeping operations used by the upload protocol.
///
/// Filename and replica arguments must be non-empty; implementations fail
/// with `ArgumentNotValid` otherwise.
#[async_trait]
pub trait Admin: Send + Sync {
    /// Whether the file is known.
    async fn has_entry(&self, filename: &str) -> Result<bool>;

    /// Register a new file with its checksum, remembering who to reply to.
    async fn add_entry(
        &self,
        filename: &str,
        reply: Option<PendingReply>,
        checksum: &str,
    ) -> Result<()>;

    /// Checksum of a known file. `UnknownId` for unknown files.
    async fn get_checksum(&self, filename: &str) -> Result<Option<String>>;

    /// Overwrite the checksum of a known file, where the backend allows it.
    async fn set_checksum(&self, filename: &str, checksum: &str) -> Result<()>;

    async fn has_reply_info(&self, filename: &str) -> Result<bool>;

    /// Remember a reply, replacing any previous one for the same file.
    async fn set_reply_info(&self, filename: &str, reply: PendingReply) -> Result<()>;

    /// Take the pending reply for a file. A second call returns `None`.
    async fn remove_reply_info(&self, filename: &str) -> Result<Option<PendingReply>>;

    /// Upload state of a file on a replica.
    async fn get_state(&self, filename: &str, replica_id: &str) -> Result<ReplicaStoreState>;

    /// Whether the upload state of a file on a replica is known.
    async fn has_state(&self, filename: &str, replica_id: &str) -> Result<bool>;

    async fn set_state(
        &self,
        filename: &str,
        replica_id: &str,
        state: ReplicaStoreState,
    ) -> Result<()>;

    /// Every known filename.
    async fn get_all_file_names(&self) -> Result<BTreeSet<String>>;

    /// Filenames whose upload state on `replica_id` is `state`.
    async fn get_all_file_names_in_state(
        &self,
        replica_id: &str,
        state: ReplicaStoreState,
    ) -> Result<BTreeSet<String>>;

    /// Drop in-memory state and release the backend.
    async fn close(&self) -> Result<()>;
}
