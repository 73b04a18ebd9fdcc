//! File repository trait.

use crate::error::MetadataResult;
use crate::models::FileRow;
use async_trait::async_trait;

/// Repository for the file table.
#[async_trait]
pub trait FileRepo: Send + Sync {
    /// Look up a file by name.
    async fn get_file(&self, filename: &str) -> MetadataResult<Option<FileRow>>;

    /// Insert a file together with one replica file info row per replica,
    /// all in one commit. Returns the new file id, or the existing id if the
    /// file was inserted concurrently.
    async fn insert_file(&self, filename: &str) -> MetadataResult<i64>;

    /// All filenames, sorted.
    async fn list_filenames(&self) -> MetadataResult<Vec<String>>;

    /// Number of files.
    async fn count_files(&self) -> MetadataResult<i64>;
}
