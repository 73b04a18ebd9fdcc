//! Relational replica state store for bitpres.
//!
//! This crate persists and reconciles the per-replica file state:
//! - Replicas, files and one state row per (file, replica) pair
//! - Bounded-retry connection handling for SQLite and PostgreSQL
//! - Filelist and checksum job ingestion with checksum voting
//! - The [`bitpres_core::Admin`] façade for the upload protocol

pub mod admin;
pub mod connection;
pub mod consistency;
pub mod error;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod store;

pub use admin::DatabaseAdmin;
pub use connection::ConnectionManager;
pub use consistency::{ConsistencyStore, IngestReport, VoteSummary};
pub use error::{MetadataError, MetadataResult};
pub use postgres::PostgresStore;
pub use store::{MetadataStore, SqliteStore};

use bitpres_core::config::{ReconnectConfig, StoreConfig};
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(
    config: &StoreConfig,
    reconnect: &ReconnectConfig,
) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        StoreConfig::Sqlite { path } => {
            let store = SqliteStore::new(path, reconnect).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
        StoreConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
        } => {
            let store = if let Some(url) = url {
                tracing::info!("Connecting to PostgreSQL using connection URL");
                PostgresStore::from_url(url, reconnect).await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    reconnect,
                )
                .await?
            } else {
                return Err(MetadataError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
        StoreConfig::File { .. } => Err(MetadataError::Config(
            "the file store has no relational backend".to_string(),
        )),
    }
}
