//! File registry: the flat-file replica state store.

use crate::entry::RegistryEntry;
use crate::error::{RegistryError, RegistryResult};
use crate::format::{self, FormatVersion};
use async_trait::async_trait;
use bitpres_core::validate::{no_whitespace, not_empty};
use bitpres_core::{Admin, PendingReply, Replica, ReplicaStoreState, Result, StateReport};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::instrument;

/// Name of the registry file inside its directory.
pub const REGISTRY_FILE_NAME: &str = "admin.data";

/// Registry of files and their per-replica upload states, persisted in one
/// versioned text file.
///
/// Single-entry updates are appended to the file. Checksum changes and
/// [`Admin::close`] rewrite the whole file through a temporary file, keeping
/// the previous file as a backup until the new one is in place. The mutex is
/// held across file I/O, so writers are serialized.
pub struct FileRegistry {
    path: PathBuf,
    tmp_path: PathBuf,
    backup_path: PathBuf,
    /// Replicas left out of aggregate states.
    checksum_only: BTreeSet<String>,
    entries: Mutex<BTreeMap<String, RegistryEntry>>,
}

impl FileRegistry {
    /// Open the registry in `dir`, creating the directory if needed.
    ///
    /// The file is rewritten right after loading, which drops superseded
    /// lines and upgrades the old format.
    pub async fn open(dir: impl AsRef<Path>) -> RegistryResult<Self> {
        Self::open_with_replicas(dir, &[]).await
    }

    /// Open the registry in `dir`, aggregating states over the bitarchive
    /// replicas of `replicas` only. Replicas not listed count as bitarchives.
    pub async fn open_with_replicas(
        dir: impl AsRef<Path>,
        replicas: &[Replica],
    ) -> RegistryResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await?;

        let path = dir.join(REGISTRY_FILE_NAME);
        let registry = Self {
            tmp_path: dir.join(format!("{REGISTRY_FILE_NAME}.tmp")),
            backup_path: dir.join(format!("{REGISTRY_FILE_NAME}.backup")),
            checksum_only: replicas
                .iter()
                .filter(|r| !r.is_bitarchive())
                .map(|r| r.id.clone())
                .collect(),
            path,
            entries: Mutex::new(BTreeMap::new()),
        };

        let mut entries = registry.entries.lock().await;
        registry.recover_backup().await?;
        if fs::try_exists(&registry.path).await? {
            let content = fs::read_to_string(&registry.path).await?;
            let (loaded, report) = format::parse_registry(&content, now())?;
            if report.version == FormatVersion::Old {
                tracing::info!(path = %registry.path.display(), "Upgrading registry from old format");
            }
            tracing::info!(
                path = %registry.path.display(),
                entries = loaded.len(),
                lines = report.lines,
                dropped = report.dropped.len(),
                "Loaded file registry"
            );
            *entries = loaded;
        } else {
            tracing::warn!(path = %registry.path.display(), "Registry file not found, starting empty");
        }
        registry.rewrite(&entries).await?;
        drop(entries);

        Ok(registry)
    }

    /// Path of the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of one entry.
    pub async fn entry(&self, filename: &str) -> Option<RegistryEntry> {
        self.entries.lock().await.get(filename).cloned()
    }

    /// Snapshot of every entry, ordered by filename.
    pub async fn entries(&self) -> Vec<RegistryEntry> {
        self.entries.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Collapsed upload state of a file over all replicas.
    pub async fn aggregate_state(&self, filename: &str) -> RegistryResult<StateReport> {
        not_empty(filename, "filename")?;
        let entries = self.entries.lock().await;
        let entry = entries.get(filename).ok_or_else(|| unknown_file(filename))?;
        Ok(entry.aggregate(now(), &self.checksum_only))
    }

    /// Rewrite the whole file from memory.
    pub async fn flush(&self) -> RegistryResult<()> {
        let entries = self.entries.lock().await;
        self.rewrite(&entries).await
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Append one entry line.
    #[instrument(skip(self, entry), fields(filename = %entry.filename))]
    async fn append(&self, entry: &RegistryEntry) -> RegistryResult<()> {
        let mut line = format::format_entry(entry, &self.checksum_only, now());
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_all().await?;
        tracing::debug!("Appended registry entry");
        Ok(())
    }

    /// Write every entry to the temporary file, then swap it into place.
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    async fn rewrite(&self, entries: &BTreeMap<String, RegistryEntry>) -> RegistryResult<()> {
        let result = self.try_rewrite(entries).await;

        let _ = fs::remove_file(&self.tmp_path).await;
        if fs::try_exists(&self.path).await? {
            if fs::try_exists(&self.backup_path).await? {
                fs::remove_file(&self.backup_path).await?;
            }
        } else if fs::try_exists(&self.backup_path).await? {
            tracing::warn!(path = %self.path.display(), "Rewrite failed, restoring backup");
            fs::rename(&self.backup_path, &self.path).await?;
        }

        result
    }

    async fn try_rewrite(&self, entries: &BTreeMap<String, RegistryEntry>) -> RegistryResult<()> {
        let content = format::format_registry(entries.values(), &self.checksum_only, now());
        {
            let mut file = fs::File::create(&self.tmp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.sync_all().await?;
        }
        if fs::try_exists(&self.path).await? {
            fs::rename(&self.path, &self.backup_path).await?;
        }
        fs::rename(&self.tmp_path, &self.path).await?;
        tracing::debug!("Rewrote registry file");
        Ok(())
    }

    /// A backup without a registry file means a rewrite died between renames.
    async fn recover_backup(&self) -> RegistryResult<()> {
        if !fs::try_exists(&self.path).await? && fs::try_exists(&self.backup_path).await? {
            tracing::warn!(
                backup = %self.backup_path.display(),
                "Registry file missing, restoring from backup"
            );
            fs::rename(&self.backup_path, &self.path).await?;
        }
        Ok(())
    }
}

fn now() -> OffsetDateTime {
    format::truncate_to_millis(OffsetDateTime::now_utc())
}

fn unknown_file(filename: &str) -> RegistryError {
    RegistryError::UnknownId(format!("unknown file '{filename}'"))
}

#[async_trait]
impl Admin for FileRegistry {
    async fn has_entry(&self, filename: &str) -> Result<bool> {
        not_empty(filename, "filename")?;
        Ok(self.entries.lock().await.contains_key(filename))
    }

    /// Registers the file, replacing any earlier entry of the same name.
    async fn add_entry(
        &self,
        filename: &str,
        reply: Option<PendingReply>,
        checksum: &str,
    ) -> Result<()> {
        no_whitespace(filename, "filename")?;
        no_whitespace(checksum, "checksum")?;

        let mut entries = self.entries.lock().await;
        let entry = RegistryEntry::new(filename, checksum, reply);
        // A second line for the same file would read back as a conflict.
        match entries.insert(filename.to_string(), entry) {
            None => {
                if let Err(e) = self.append(&entries[filename]).await {
                    entries.remove(filename);
                    return Err(e.into());
                }
            }
            Some(previous) => {
                if let Err(e) = self.rewrite(&entries).await {
                    entries.insert(filename.to_string(), previous);
                    return Err(e.into());
                }
                tracing::info!(
                    filename,
                    old = %previous.checksum,
                    new = checksum,
                    "Replaced registry entry"
                );
            }
        }
        tracing::debug!(filename, checksum, "Added registry entry");
        Ok(())
    }

    async fn get_checksum(&self, filename: &str) -> Result<Option<String>> {
        not_empty(filename, "filename")?;
        let entries = self.entries.lock().await;
        let entry = entries.get(filename).ok_or_else(|| unknown_file(filename))?;
        Ok(Some(entry.checksum.clone()))
    }

    async fn set_checksum(&self, filename: &str, checksum: &str) -> Result<()> {
        not_empty(filename, "filename")?;
        no_whitespace(checksum, "checksum")?;

        let mut entries = self.entries.lock().await;
        let previous = match entries.get_mut(filename) {
            Some(entry) => std::mem::replace(&mut entry.checksum, checksum.to_string()),
            None => return Err(unknown_file(filename).into()),
        };
        if let Err(e) = self.rewrite(&entries).await {
            if let Some(entry) = entries.get_mut(filename) {
                entry.checksum = previous;
            }
            return Err(e.into());
        }
        tracing::info!(filename, old = %previous, new = checksum, "Changed registry checksum");
        Ok(())
    }

    async fn has_reply_info(&self, filename: &str) -> Result<bool> {
        not_empty(filename, "filename")?;
        let entries = self.entries.lock().await;
        Ok(entries
            .get(filename)
            .is_some_and(|entry| entry.reply.is_some()))
    }

    async fn set_reply_info(&self, filename: &str, reply: PendingReply) -> Result<()> {
        not_empty(filename, "filename")?;
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(filename)
            .ok_or_else(|| unknown_file(filename))?;
        entry.reply = Some(reply);
        Ok(())
    }

    async fn remove_reply_info(&self, filename: &str) -> Result<Option<PendingReply>> {
        not_empty(filename, "filename")?;
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(filename)
            .ok_or_else(|| unknown_file(filename))?;
        Ok(entry.reply.take())
    }

    async fn get_state(&self, filename: &str, replica_id: &str) -> Result<ReplicaStoreState> {
        not_empty(filename, "filename")?;
        not_empty(replica_id, "replica id")?;
        let entries = self.entries.lock().await;
        entries
            .get(filename)
            .and_then(|entry| entry.state(replica_id))
            .ok_or_else(|| {
                RegistryError::UnknownId(format!(
                    "no store state recorded for '{filename}' in '{replica_id}'"
                ))
                .into()
            })
    }

    async fn has_state(&self, filename: &str, replica_id: &str) -> Result<bool> {
        not_empty(filename, "filename")?;
        not_empty(replica_id, "replica id")?;
        let entries = self.entries.lock().await;
        Ok(entries
            .get(filename)
            .is_some_and(|entry| entry.state(replica_id).is_some()))
    }

    async fn set_state(
        &self,
        filename: &str,
        replica_id: &str,
        state: ReplicaStoreState,
    ) -> Result<()> {
        not_empty(filename, "filename")?;
        no_whitespace(replica_id, "replica id")?;

        let mut entries = self.entries.lock().await;
        let Some(current) = entries.get(filename) else {
            tracing::warn!(filename, replica_id, %state, "State change for unregistered file");
            return Err(unknown_file(filename).into());
        };
        let mut updated = current.clone();
        updated.set_state(replica_id, state, now());
        self.append(&updated).await?;
        entries.insert(filename.to_string(), updated);
        Ok(())
    }

    async fn get_all_file_names(&self) -> Result<BTreeSet<String>> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }

    async fn get_all_file_names_in_state(
        &self,
        replica_id: &str,
        state: ReplicaStoreState,
    ) -> Result<BTreeSet<String>> {
        not_empty(replica_id, "replica id")?;
        let entries = self.entries.lock().await;
        Ok(entries
            .values()
            .filter(|entry| entry.state(replica_id) == Some(state))
            .map(|entry| entry.filename.clone())
            .collect())
    }

    async fn close(&self) -> Result<()> {
        let mut entries = self.entries.lock().await;
        for entry in entries.values_mut() {
            entry.reply = None;
        }
        self.rewrite(&entries).await?;
        tracing::info!(path = %self.path.display(), "Closed file registry");
        Ok(())
    }
}
