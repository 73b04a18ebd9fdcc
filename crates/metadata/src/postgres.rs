//! PostgreSQL-based metadata store implementation.

use crate::connection::ConnectionManager;
use crate::error::MetadataResult;
use crate::models::*;
use crate::repos::replica_files::StatusColumn;
use crate::repos::{FileRepo, ReplicaFileRepo, ReplicaRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use bitpres_core::config::ReconnectConfig;
use bitpres_core::{ChecksumStatus, FileListStatus, ReplicaStoreState};
use sqlx::{Connection, Postgres};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use time::OffsetDateTime;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    conn: ConnectionManager<Postgres>,
}

impl PostgresStore {
    /// Create a store from a connection URL.
    pub async fn from_url(url: &str, reconnect: &ReconnectConfig) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, reconnect).await
    }

    /// Create a store from individual connection parameters.
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        reconnect: &ReconnectConfig,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, reconnect).await
    }

    /// The pool connects lazily so that the first checkout goes through the
    /// connection manager's retry loop.
    async fn connect(opts: PgConnectOptions, reconnect: &ReconnectConfig) -> MetadataResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(reconnect.max_connections)
            .connect_lazy_with(opts);

        let store = Self {
            conn: ConnectionManager::from_config(pool, reconnect),
        };
        store.migrate().await?;

        Ok(store)
    }

    /// The connection manager.
    pub fn connections(&self) -> &ConnectionManager<Postgres> {
        &self.conn
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // PostgreSQL doesn't allow multiple statements in a single prepared statement,
        // so we split the schema and execute each statement separately.
        self.conn
            .run("migrate", move |mut conn| async move {
                for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
                    sqlx::query(statement).execute(&mut *conn).await?;
                }
                Ok(())
            })
            .await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.conn
            .run("health_check", move |mut conn| async move {
                sqlx::query("SELECT 1").execute(&mut *conn).await?;
                Ok(())
            })
            .await
    }

    async fn close(&self) {
        self.conn.close().await;
    }
}

#[async_trait]
impl ReplicaRepo for PostgresStore {
    async fn list_replicas(&self) -> MetadataResult<Vec<ReplicaRow>> {
        self.conn
            .run("list_replicas", move |mut conn| async move {
                let rows = sqlx::query_as::<_, ReplicaRow>("SELECT * FROM replica ORDER BY replica_id")
                    .fetch_all(&mut *conn)
                    .await?;
                Ok(rows)
            })
            .await
    }

    async fn get_replica(&self, replica_id: &str) -> MetadataResult<Option<ReplicaRow>> {
        self.conn
            .run("get_replica", move |mut conn| async move {
                let row = sqlx::query_as::<_, ReplicaRow>("SELECT * FROM replica WHERE replica_id = $1")
                    .bind(replica_id)
                    .fetch_optional(&mut *conn)
                    .await?;
                Ok(row)
            })
            .await
    }

    async fn insert_replica(&self, replica: &ReplicaRow) -> MetadataResult<()> {
        self.conn
            .run("insert_replica", move |mut conn| async move {
                let mut tx = Connection::begin(&mut *conn).await?;
                sqlx::query(
                    r#"
                    INSERT INTO replica (replica_id, replica_name, replica_type, filelist_updated, checksum_updated)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(&replica.replica_id)
                .bind(&replica.replica_name)
                .bind(replica.replica_type)
                .bind(replica.filelist_updated)
                .bind(replica.checksum_updated)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO replicafileinfo (file_id, replica_id, upload_status, filelist_status, checksum_status)
                    SELECT file_id, $1, $2, $3, $4 FROM file
                    "#,
                )
                .bind(&replica.replica_id)
                .bind(ReplicaStoreState::Unknown.code())
                .bind(FileListStatus::NoFilelistStatus.code())
                .bind(ChecksumStatus::Unknown.code())
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(())
            })
            .await
    }

    async fn set_filelist_updated(
        &self,
        replica_id: &str,
        at: OffsetDateTime,
    ) -> MetadataResult<()> {
        self.conn
            .run("set_filelist_updated", move |mut conn| async move {
                sqlx::query("UPDATE replica SET filelist_updated = $1 WHERE replica_id = $2")
                    .bind(at)
                    .bind(replica_id)
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
            .await
    }

    async fn set_checksum_updated(
        &self,
        replica_id: &str,
        at: OffsetDateTime,
    ) -> MetadataResult<()> {
        self.conn
            .run("set_checksum_updated", move |mut conn| async move {
                sqlx::query("UPDATE replica SET checksum_updated = $1 WHERE replica_id = $2")
                    .bind(at)
                    .bind(replica_id)
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl FileRepo for PostgresStore {
    async fn get_file(&self, filename: &str) -> MetadataResult<Option<FileRow>> {
        self.conn
            .run("get_file", move |mut conn| async move {
                let row = sqlx::query_as::<_, FileRow>("SELECT * FROM file WHERE filename = $1")
                    .bind(filename)
                    .fetch_optional(&mut *conn)
                    .await?;
                Ok(row)
            })
            .await
    }

    async fn insert_file(&self, filename: &str) -> MetadataResult<i64> {
        self.conn
            .run("insert_file", move |mut conn| async move {
                let mut tx = Connection::begin(&mut *conn).await?;

                let inserted: Option<i64> = sqlx::query_scalar(
                    "INSERT INTO file (filename) VALUES ($1) ON CONFLICT (filename) DO NOTHING RETURNING file_id",
                )
                .bind(filename)
                .fetch_optional(&mut *tx)
                .await?;

                let file_id = match inserted {
                    Some(file_id) => {
                        sqlx::query(
                            r#"
                            INSERT INTO replicafileinfo (file_id, replica_id, upload_status, filelist_status, checksum_status)
                            SELECT $1, replica_id, $2, $3, $4 FROM replica
                            "#,
                        )
                        .bind(file_id)
                        .bind(ReplicaStoreState::Unknown.code())
                        .bind(FileListStatus::NoFilelistStatus.code())
                        .bind(ChecksumStatus::Unknown.code())
                        .execute(&mut *tx)
                        .await?;
                        file_id
                    }
                    None => {
                        sqlx::query_scalar("SELECT file_id FROM file WHERE filename = $1")
                            .bind(filename)
                            .fetch_one(&mut *tx)
                            .await?
                    }
                };

                tx.commit().await?;
                Ok(file_id)
            })
            .await
    }

    async fn list_filenames(&self) -> MetadataResult<Vec<String>> {
        self.conn
            .run("list_filenames", move |mut conn| async move {
                let names = sqlx::query_scalar("SELECT filename FROM file ORDER BY filename")
                    .fetch_all(&mut *conn)
                    .await?;
                Ok(names)
            })
            .await
    }

    async fn count_files(&self) -> MetadataResult<i64> {
        self.conn
            .run("count_files", move |mut conn| async move {
                let count = sqlx::query_scalar("SELECT COUNT(*) FROM file")
                    .fetch_one(&mut *conn)
                    .await?;
                Ok(count)
            })
            .await
    }
}

#[async_trait]
impl ReplicaFileRepo for PostgresStore {
    async fn list_for_file(&self, file_id: i64) -> MetadataResult<Vec<ReplicaFileInfoRow>> {
        self.conn
            .run("list_for_file", move |mut conn| async move {
                let rows = sqlx::query_as::<_, ReplicaFileInfoRow>(
                    "SELECT * FROM replicafileinfo WHERE file_id = $1 ORDER BY replica_id",
                )
                .bind(file_id)
                .fetch_all(&mut *conn)
                .await?;
                Ok(rows)
            })
            .await
    }

    async fn get_replica_file(
        &self,
        file_id: i64,
        replica_id: &str,
    ) -> MetadataResult<Option<ReplicaFileInfoRow>> {
        self.conn
            .run("get_replica_file", move |mut conn| async move {
                let row = sqlx::query_as::<_, ReplicaFileInfoRow>(
                    "SELECT * FROM replicafileinfo WHERE file_id = $1 AND replica_id = $2",
                )
                .bind(file_id)
                .bind(replica_id)
                .fetch_optional(&mut *conn)
                .await?;
                Ok(row)
            })
            .await
    }

    async fn get_replica_file_by_guid(
        &self,
        guid: i64,
    ) -> MetadataResult<Option<ReplicaFileInfoRow>> {
        self.conn
            .run("get_replica_file_by_guid", move |mut conn| async move {
                let row =
                    sqlx::query_as::<_, ReplicaFileInfoRow>("SELECT * FROM replicafileinfo WHERE guid = $1")
                        .bind(guid)
                        .fetch_optional(&mut *conn)
                        .await?;
                Ok(row)
            })
            .await
    }

    async fn update_replica_files(&self, rows: &[ReplicaFileInfoRow]) -> MetadataResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.conn
            .run("update_replica_files", move |mut conn| async move {
                let mut tx = Connection::begin(&mut *conn).await?;
                for row in rows {
                    sqlx::query(
                        r#"
                        UPDATE replicafileinfo
                        SET checksum = $1, upload_status = $2, filelist_status = $3, checksum_status = $4,
                            filelist_checked_at = $5, checksum_checked_at = $6
                        WHERE guid = $7
                        "#,
                    )
                    .bind(&row.checksum)
                    .bind(row.upload_status)
                    .bind(row.filelist_status)
                    .bind(row.checksum_status)
                    .bind(row.filelist_checked_at)
                    .bind(row.checksum_checked_at)
                    .bind(row.guid)
                    .execute(&mut *tx)
                    .await?;
                }
                tx.commit().await?;
                Ok(())
            })
            .await
    }

    async fn list_entries_for_replica(
        &self,
        replica_id: &str,
    ) -> MetadataResult<Vec<ReplicaFileEntryRow>> {
        self.conn
            .run("list_entries_for_replica", move |mut conn| async move {
                let rows = sqlx::query_as::<_, ReplicaFileEntryRow>(
                    r#"
                    SELECT rfi.guid, rfi.file_id, f.filename
                    FROM replicafileinfo rfi JOIN file f ON f.file_id = rfi.file_id
                    WHERE rfi.replica_id = $1
                    "#,
                )
                .bind(replica_id)
                .fetch_all(&mut *conn)
                .await?;
                Ok(rows)
            })
            .await
    }

    async fn filenames_with_status(
        &self,
        replica_id: &str,
        column: StatusColumn,
        codes: &[i32],
    ) -> MetadataResult<Vec<String>> {
        let sql = format!(
            "SELECT f.filename FROM replicafileinfo rfi JOIN file f ON f.file_id = rfi.file_id \
             WHERE rfi.replica_id = $1 AND rfi.{} = ANY($2) ORDER BY f.filename",
            column.column()
        );
        let sql = &sql;
        self.conn
            .run("filenames_with_status", move |mut conn| async move {
                let names = sqlx::query_scalar::<_, String>(sql)
                    .bind(replica_id)
                    .bind(codes)
                    .fetch_all(&mut *conn)
                    .await?;
                Ok(names)
            })
            .await
    }

    async fn count_with_status(
        &self,
        replica_id: &str,
        column: StatusColumn,
        codes: &[i32],
    ) -> MetadataResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM replicafileinfo WHERE replica_id = $1 AND {} = ANY($2)",
            column.column()
        );
        let sql = &sql;
        self.conn
            .run("count_with_status", move |mut conn| async move {
                let count = sqlx::query_scalar::<_, i64>(sql)
                    .bind(replica_id)
                    .bind(codes)
                    .fetch_one(&mut *conn)
                    .await?;
                Ok(count)
            })
            .await
    }

    async fn files_with_listed_rows(&self) -> MetadataResult<Vec<FileRow>> {
        self.conn
            .run("files_with_listed_rows", move |mut conn| async move {
                let rows = sqlx::query_as::<_, FileRow>(
                    "SELECT f.file_id, f.filename FROM file f WHERE EXISTS ( \
                     SELECT 1 FROM replicafileinfo rfi WHERE rfi.file_id = f.file_id \
                     AND rfi.filelist_status = $1 AND rfi.checksum IS NOT NULL) ORDER BY f.file_id",
                )
                .bind(FileListStatus::Ok.code())
                .fetch_all(&mut *conn)
                .await?;
                Ok(rows)
            })
            .await
    }
}
