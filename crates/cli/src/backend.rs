//! Store selection for the command-line tool.

use anyhow::{Context, Result, bail};
use bitpres_core::config::{AppConfig, StoreConfig};
use bitpres_core::{LogNotifier, Notifier};
use bitpres_legacy::FileRegistry;
use bitpres_metadata::{ConsistencyStore, MetadataStore};
use std::sync::Arc;

/// The store a command runs against.
pub enum Backend {
    Relational(Arc<ConsistencyStore>),
    File(FileRegistry),
}

impl Backend {
    /// Open the configured store.
    pub async fn open(config: &AppConfig) -> Result<Self> {
        match &config.store {
            StoreConfig::File { dir } => {
                let registry = FileRegistry::open_with_replicas(dir, &config.replica_set())
                    .await
                    .with_context(|| format!("failed to open file registry in {}", dir.display()))?;
                tracing::info!(path = %registry.path().display(), "Using file registry");
                Ok(Self::File(registry))
            }
            store => Ok(Self::Relational(open_relational(config, store).await?)),
        }
    }

    /// The relational store, or an error naming `command` when the file
    /// registry is configured.
    pub fn relational(&self, command: &str) -> Result<&Arc<ConsistencyStore>> {
        match self {
            Self::Relational(store) => Ok(store),
            Self::File(_) => bail!(
                "'{command}' needs a relational store, but the configured store is the file registry"
            ),
        }
    }
}

/// Open the relational store described by `store` with the configured replicas.
pub async fn open_relational(
    config: &AppConfig,
    store: &StoreConfig,
) -> Result<Arc<ConsistencyStore>> {
    let metadata = bitpres_metadata::from_config(store, &config.reconnect)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata store health check failed")?;

    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let consistency = ConsistencyStore::open(metadata, config.replica_set(), notifier)
        .await
        .context("configured replicas do not match the metadata store")?;
    tracing::info!(replicas = config.replicas.len(), "Metadata store initialized");
    Ok(Arc::new(consistency))
}
