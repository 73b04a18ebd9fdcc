//! Metadata store test utilities.

use bitpres_core::config::ReconnectConfig;
use bitpres_core::{MemoryNotifier, Replica};
use bitpres_metadata::{
    ConsistencyStore, MetadataError, MetadataResult, MetadataStore, PostgresStore, SqliteStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;

/// Stable prefix for Docker/container startup failures in Postgres test setup.
pub const POSTGRES_CONTAINER_START_ERR_PREFIX: &str = "postgres-container-start:";

/// Retry settings that fail fast in tests.
#[allow(dead_code)]
pub fn test_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        max_attempts: 2,
        delay_ms: 1,
        max_connections: 2,
    }
}

/// A SQLite-backed consistency store that cleans up on drop.
#[allow(dead_code)]
pub struct TestStore {
    pub consistency: Arc<ConsistencyStore>,
    pub store: Arc<dyn MetadataStore>,
    pub notifier: Arc<MemoryNotifier>,
    db_path: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestStore {
    /// A store with the default three replicas.
    pub async fn new() -> MetadataResult<Self> {
        Self::with_replicas(super::default_replicas()).await
    }

    pub async fn with_replicas(replicas: Vec<Replica>) -> MetadataResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("bitpres.db");
        let store: Arc<dyn MetadataStore> =
            Arc::new(SqliteStore::new(&db_path, &test_reconnect()).await?);
        let notifier = Arc::new(MemoryNotifier::new());
        let consistency =
            ConsistencyStore::open(store.clone(), replicas, notifier.clone()).await?;

        Ok(Self {
            consistency: Arc::new(consistency),
            store,
            notifier,
            db_path,
            _temp_dir: temp_dir,
        })
    }

    /// Open a second façade over the same database with another replica set.
    pub async fn reopen(&self, replicas: Vec<Replica>) -> MetadataResult<ConsistencyStore> {
        let store: Arc<dyn MetadataStore> =
            Arc::new(SqliteStore::new(&self.db_path, &test_reconnect()).await?);
        ConsistencyStore::open(store, replicas, Arc::new(MemoryNotifier::new())).await
    }
}

/// PostgreSQL test store wrapper that manages a testcontainer.
#[allow(dead_code)]
pub struct PostgresTestStore {
    pub store: Arc<dyn MetadataStore>,
    _container: ContainerAsync<Postgres>,
}

#[allow(dead_code)]
impl PostgresTestStore {
    pub async fn new() -> MetadataResult<Self> {
        let container = Postgres::default()
            .with_tag("15-alpine")
            .start()
            .await
            .map_err(|e| {
                MetadataError::Internal(format!(
                    "{POSTGRES_CONTAINER_START_ERR_PREFIX} Failed to start PostgreSQL container: {e}"
                ))
            })?;

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");
        let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");

        let store = PostgresStore::from_url(&url, &test_reconnect()).await?;
        Ok(Self {
            store: Arc::new(store),
            _container: container,
        })
    }
}

/// Run a test against both SQLite and (when Docker is available) PostgreSQL.
#[allow(dead_code)]
pub async fn run_store_test_both<F, Fut>(test_fn: F)
where
    F: Fn(Arc<dyn MetadataStore>) -> Fut + Clone,
    Fut: std::future::Future<Output = ()>,
{
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let sqlite = SqliteStore::new(temp_dir.path().join("both.db"), &test_reconnect())
        .await
        .expect("Failed to create SQLite store");
    test_fn.clone()(Arc::new(sqlite)).await;

    if std::env::var("SKIP_POSTGRES_TESTS").is_err() {
        match PostgresTestStore::new().await {
            Ok(postgres) => test_fn(postgres.store.clone()).await,
            Err(err) => eprintln!("Skipping PostgreSQL store tests: {err}"),
        }
    }
}
