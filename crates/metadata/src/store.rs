//! Metadata store trait and the SQLite implementation.

use crate::connection::ConnectionManager;
use crate::error::MetadataResult;
use crate::repos::{FileRepo, ReplicaFileRepo, ReplicaRepo};
use async_trait::async_trait;
use bitpres_core::config::ReconnectConfig;
use sqlx::{Connection, Sqlite};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait. One implementation per backing technology.
#[async_trait]
pub trait MetadataStore: ReplicaRepo + FileRepo + ReplicaFileRepo + Send + Sync {
    /// Create the schema if it does not exist.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Release every pooled connection.
    async fn close(&self);
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    conn: ConnectionManager<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub async fn new(path: impl AsRef<Path>, reconnect: &ReconnectConfig) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        // SQLite has a single writer; one pooled connection avoids "database is locked".
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(opts);

        let store = Self {
            conn: ConnectionManager::from_config(pool, reconnect),
        };
        store.migrate().await?;
        Ok(store)
    }

    /// The connection manager.
    pub fn connections(&self) -> &ConnectionManager<Sqlite> {
        &self.conn
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        self.conn
            .run("migrate", |mut conn| async move {
                sqlx::query(SCHEMA_SQL).execute(&mut *conn).await?;
                Ok(())
            })
            .await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.conn
            .run("health_check", |mut conn| async move {
                sqlx::query("SELECT 1").execute(&mut *conn).await?;
                Ok(())
            })
            .await
    }

    async fn close(&self) {
        self.conn.close().await;
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::replica_files::StatusColumn;
    use bitpres_core::{ChecksumStatus, FileListStatus, ReplicaStoreState};
    use time::OffsetDateTime;

    fn placeholders(n: usize) -> String {
        vec!["?"; n].join(", ")
    }

    #[async_trait]
    impl ReplicaRepo for SqliteStore {
        async fn list_replicas(&self) -> MetadataResult<Vec<ReplicaRow>> {
            self.conn
                .run("list_replicas", |mut conn| async move {
                    sqlx::query_as::<_, ReplicaRow>("SELECT * FROM replica ORDER BY replica_id")
                        .fetch_all(&mut *conn)
                        .await
                })
                .await
        }

        async fn get_replica(&self, replica_id: &str) -> MetadataResult<Option<ReplicaRow>> {
            self.conn
                .run("get_replica", move |mut conn| async move {
                    sqlx::query_as::<_, ReplicaRow>("SELECT * FROM replica WHERE replica_id = ?")
                        .bind(replica_id)
                        .fetch_optional(&mut *conn)
                        .await
                })
                .await
        }

        async fn insert_replica(&self, replica: &ReplicaRow) -> MetadataResult<()> {
            self.conn
                .run("insert_replica", move |mut conn| async move {
                    let mut tx = Connection::begin(&mut *conn).await?;
                    sqlx::query(
                        "INSERT INTO replica (replica_id, replica_name, replica_type, filelist_updated, checksum_updated) \
                         VALUES (?, ?, ?, ?, ?)",
                    )
                    .bind(&replica.replica_id)
                    .bind(&replica.replica_name)
                    .bind(replica.replica_type)
                    .bind(replica.filelist_updated)
                    .bind(replica.checksum_updated)
                    .execute(&mut *tx)
                    .await?;

                    sqlx::query(
                        "INSERT INTO replicafileinfo (file_id, replica_id, upload_status, filelist_status, checksum_status) \
                         SELECT file_id, ?, ?, ?, ? FROM file",
                    )
                    .bind(&replica.replica_id)
                    .bind(ReplicaStoreState::Unknown.code())
                    .bind(FileListStatus::NoFilelistStatus.code())
                    .bind(ChecksumStatus::Unknown.code())
                    .execute(&mut *tx)
                    .await?;

                    tx.commit().await
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
                    sqlx::query("UPDATE replica SET filelist_updated = ? WHERE replica_id = ?")
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
                    sqlx::query("UPDATE replica SET checksum_updated = ? WHERE replica_id = ?")
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
    impl FileRepo for SqliteStore {
        async fn get_file(&self, filename: &str) -> MetadataResult<Option<FileRow>> {
            self.conn
                .run("get_file", move |mut conn| async move {
                    sqlx::query_as::<_, FileRow>("SELECT * FROM file WHERE filename = ?")
                        .bind(filename)
                        .fetch_optional(&mut *conn)
                        .await
                })
                .await
        }

        async fn insert_file(&self, filename: &str) -> MetadataResult<i64> {
            self.conn
                .run("insert_file", move |mut conn| async move {
                    let mut tx = Connection::begin(&mut *conn).await?;

                    let inserted =
                        sqlx::query("INSERT INTO file (filename) VALUES (?) ON CONFLICT(filename) DO NOTHING")
                            .bind(filename)
                            .execute(&mut *tx)
                            .await?;

                    let file_id: i64 = sqlx::query_scalar("SELECT file_id FROM file WHERE filename = ?")
                        .bind(filename)
                        .fetch_one(&mut *tx)
                        .await?;

                    if inserted.rows_affected() > 0 {
                        sqlx::query(
                            "INSERT INTO replicafileinfo (file_id, replica_id, upload_status, filelist_status, checksum_status) \
                             SELECT ?, replica_id, ?, ?, ? FROM replica",
                        )
                        .bind(file_id)
                        .bind(ReplicaStoreState::Unknown.code())
                        .bind(FileListStatus::NoFilelistStatus.code())
                        .bind(ChecksumStatus::Unknown.code())
                        .execute(&mut *tx)
                        .await?;
                    }

                    tx.commit().await?;
                    Ok(file_id)
                })
                .await
        }

        async fn list_filenames(&self) -> MetadataResult<Vec<String>> {
            self.conn
                .run("list_filenames", |mut conn| async move {
                    sqlx::query_scalar("SELECT filename FROM file ORDER BY filename")
                        .fetch_all(&mut *conn)
                        .await
                })
                .await
        }

        async fn count_files(&self) -> MetadataResult<i64> {
            self.conn
                .run("count_files", |mut conn| async move {
                    sqlx::query_scalar("SELECT COUNT(*) FROM file")
                        .fetch_one(&mut *conn)
                        .await
                })
                .await
        }
    }

    #[async_trait]
    impl ReplicaFileRepo for SqliteStore {
        async fn list_for_file(&self, file_id: i64) -> MetadataResult<Vec<ReplicaFileInfoRow>> {
            self.conn
                .run("list_for_file", move |mut conn| async move {
                    sqlx::query_as::<_, ReplicaFileInfoRow>(
                        "SELECT * FROM replicafileinfo WHERE file_id = ? ORDER BY replica_id",
                    )
                    .bind(file_id)
                    .fetch_all(&mut *conn)
                    .await
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
                    sqlx::query_as::<_, ReplicaFileInfoRow>(
                        "SELECT * FROM replicafileinfo WHERE file_id = ? AND replica_id = ?",
                    )
                    .bind(file_id)
                    .bind(replica_id)
                    .fetch_optional(&mut *conn)
                    .await
                })
                .await
        }

        async fn get_replica_file_by_guid(
            &self,
            guid: i64,
        ) -> MetadataResult<Option<ReplicaFileInfoRow>> {
            self.conn
                .run("get_replica_file_by_guid", move |mut conn| async move {
                    sqlx::query_as::<_, ReplicaFileInfoRow>("SELECT * FROM replicafileinfo WHERE guid = ?")
                        .bind(guid)
                        .fetch_optional(&mut *conn)
                        .await
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
                            "UPDATE replicafileinfo SET checksum = ?, upload_status = ?, filelist_status = ?, \
                             checksum_status = ?, filelist_checked_at = ?, checksum_checked_at = ? \
                             WHERE guid = ?",
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
                    tx.commit().await
                })
                .await
        }

        async fn list_entries_for_replica(
            &self,
            replica_id: &str,
        ) -> MetadataResult<Vec<ReplicaFileEntryRow>> {
            self.conn
                .run("list_entries_for_replica", move |mut conn| async move {
                    sqlx::query_as::<_, ReplicaFileEntryRow>(
                        "SELECT rfi.guid, rfi.file_id, f.filename FROM replicafileinfo rfi \
                         JOIN file f ON f.file_id = rfi.file_id WHERE rfi.replica_id = ?",
                    )
                    .bind(replica_id)
                    .fetch_all(&mut *conn)
                    .await
                })
                .await
        }

        async fn filenames_with_status(
            &self,
            replica_id: &str,
            column: StatusColumn,
            codes: &[i32],
        ) -> MetadataResult<Vec<String>> {
            if codes.is_empty() {
                return Ok(Vec::new());
            }
            let sql = format!(
                "SELECT f.filename FROM replicafileinfo rfi JOIN file f ON f.file_id = rfi.file_id \
                 WHERE rfi.replica_id = ? AND rfi.{} IN ({}) ORDER BY f.filename",
                column.column(),
                placeholders(codes.len())
            );
            let sql = &sql;
            self.conn
                .run("filenames_with_status", move |mut conn| async move {
                    let mut query = sqlx::query_scalar::<_, String>(sql).bind(replica_id);
                    for code in codes {
                        query = query.bind(*code);
                    }
                    query.fetch_all(&mut *conn).await
                })
                .await
        }

        async fn count_with_status(
            &self,
            replica_id: &str,
            column: StatusColumn,
            codes: &[i32],
        ) -> MetadataResult<i64> {
            if codes.is_empty() {
                return Ok(0);
            }
            let sql = format!(
                "SELECT COUNT(*) FROM replicafileinfo WHERE replica_id = ? AND {} IN ({})",
                column.column(),
                placeholders(codes.len())
            );
            let sql = &sql;
            self.conn
                .run("count_with_status", move |mut conn| async move {
                    let mut query = sqlx::query_scalar::<_, i64>(sql).bind(replica_id);
                    for code in codes {
                        query = query.bind(*code);
                    }
                    query.fetch_one(&mut *conn).await
                })
                .await
        }

        async fn files_with_listed_rows(&self) -> MetadataResult<Vec<FileRow>> {
            self.conn
                .run("files_with_listed_rows", |mut conn| async move {
                    sqlx::query_as::<_, FileRow>(
                        "SELECT f.file_id, f.filename FROM file f WHERE EXISTS ( \
                         SELECT 1 FROM replicafileinfo rfi WHERE rfi.file_id = f.file_id \
                         AND rfi.filelist_status = ? AND rfi.checksum IS NOT NULL) ORDER BY f.file_id",
                    )
                    .bind(FileListStatus::Ok.code())
                    .fetch_all(&mut *conn)
                    .await
                })
                .await
        }
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS replica (
    replica_id TEXT PRIMARY KEY,
    replica_name TEXT NOT NULL,
    replica_type INTEGER NOT NULL,
    filelist_updated TEXT,
    checksum_updated TEXT
);

CREATE TABLE IF NOT EXISTS file (
    file_id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS replicafileinfo (
    guid INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL REFERENCES file(file_id),
    replica_id TEXT NOT NULL REFERENCES replica(replica_id),
    checksum TEXT,
    upload_status INTEGER NOT NULL DEFAULT 4,
    filelist_status INTEGER NOT NULL DEFAULT 0,
    checksum_status INTEGER NOT NULL DEFAULT 0,
    filelist_checked_at TEXT,
    checksum_checked_at TEXT,
    UNIQUE (file_id, replica_id)
);
CREATE INDEX IF NOT EXISTS idx_rfi_replica_upload ON replicafileinfo(replica_id, upload_status);
CREATE INDEX IF NOT EXISTS idx_rfi_replica_filelist ON replicafileinfo(replica_id, filelist_status);
CREATE INDEX IF NOT EXISTS idx_rfi_replica_checksum ON replicafileinfo(replica_id, checksum_status);
"#;
