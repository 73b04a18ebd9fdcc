//! Admin façade backed by the relational store.

use crate::consistency::ConsistencyStore;
use async_trait::async_trait;
use bitpres_core::validate::not_empty;
use bitpres_core::{Admin, Error, PendingReply, ReplicaStoreState, Result};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// [`Admin`] over a [`ConsistencyStore`].
///
/// Pending replies live in memory only. Checksums are fixed at registration;
/// corrections go through [`ConsistencyStore::change_upload_status`].
pub struct DatabaseAdmin {
    store: Arc<ConsistencyStore>,
    replies: DashMap<String, PendingReply>,
}

impl DatabaseAdmin {
    pub fn new(store: Arc<ConsistencyStore>) -> Self {
        Self {
            store,
            replies: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<ConsistencyStore> {
        &self.store
    }
}

#[async_trait]
impl Admin for DatabaseAdmin {
    async fn has_entry(&self, filename: &str) -> Result<bool> {
        Ok(self.store.exists(filename).await?)
    }

    async fn add_entry(
        &self,
        filename: &str,
        reply: Option<PendingReply>,
        checksum: &str,
    ) -> Result<()> {
        not_empty(filename, "filename")?;
        not_empty(checksum, "checksum")?;
        self.store.register_for_upload(filename, checksum).await?;
        if let Some(reply) = reply {
            self.replies.insert(filename.to_string(), reply);
        }
        Ok(())
    }

    async fn get_checksum(&self, filename: &str) -> Result<Option<String>> {
        Ok(self.store.checksum(filename).await?)
    }

    async fn set_checksum(&self, filename: &str, _checksum: &str) -> Result<()> {
        Err(Error::IllegalState(format!(
            "the checksum of '{filename}' cannot be overwritten, correct the replica state instead"
        )))
    }

    async fn has_reply_info(&self, filename: &str) -> Result<bool> {
        not_empty(filename, "filename")?;
        Ok(self.replies.contains_key(filename))
    }

    async fn set_reply_info(&self, filename: &str, reply: PendingReply) -> Result<()> {
        not_empty(filename, "filename")?;
        self.replies.insert(filename.to_string(), reply);
        Ok(())
    }

    async fn remove_reply_info(&self, filename: &str) -> Result<Option<PendingReply>> {
        not_empty(filename, "filename")?;
        Ok(self.replies.remove(filename).map(|(_, reply)| reply))
    }

    async fn get_state(&self, filename: &str, replica_id: &str) -> Result<ReplicaStoreState> {
        Ok(self.store.upload_status(filename, replica_id).await?)
    }

    async fn has_state(&self, filename: &str, replica_id: &str) -> Result<bool> {
        let state = self.store.upload_status(filename, replica_id).await?;
        Ok(state != ReplicaStoreState::Unknown)
    }

    async fn set_state(
        &self,
        filename: &str,
        replica_id: &str,
        state: ReplicaStoreState,
    ) -> Result<()> {
        Ok(self
            .store
            .set_upload_status(filename, replica_id, state)
            .await?)
    }

    async fn get_all_file_names(&self) -> Result<BTreeSet<String>> {
        Ok(self.store.all_filenames().await?.into_iter().collect())
    }

    async fn get_all_file_names_in_state(
        &self,
        replica_id: &str,
        state: ReplicaStoreState,
    ) -> Result<BTreeSet<String>> {
        Ok(self
            .store
            .files_in_upload_state(replica_id, state)
            .await?
            .into_iter()
            .collect())
    }

    async fn close(&self) -> Result<()> {
        self.replies.clear();
        self.store.close().await;
        tracing::info!("Closed database admin");
        Ok(())
    }
}
