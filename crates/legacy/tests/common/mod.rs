//! Common test utilities for the file registry.

use bitpres_core::Replica;
use bitpres_legacy::{FileRegistry, REGISTRY_FILE_NAME, RegistryResult};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A registry in a temporary directory that is removed on drop.
#[allow(dead_code)]
pub struct TestRegistry {
    pub registry: FileRegistry,
    temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestRegistry {
    pub async fn new() -> RegistryResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let registry = FileRegistry::open(temp_dir.path()).await?;
        Ok(Self { registry, temp_dir })
    }

    /// A registry that knows the types of `replicas`.
    pub async fn with_replicas(replicas: &[Replica]) -> RegistryResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let registry = FileRegistry::open_with_replicas(temp_dir.path(), replicas).await?;
        Ok(Self { registry, temp_dir })
    }

    /// A registry opened over a file with the given content.
    pub async fn with_content(content: &str) -> RegistryResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        std::fs::write(temp_dir.path().join(REGISTRY_FILE_NAME), content)
            .expect("Failed to seed registry file");
        let registry = FileRegistry::open(temp_dir.path()).await?;
        Ok(Self { registry, temp_dir })
    }

    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn file(&self, suffix: &str) -> PathBuf {
        self.temp_dir
            .path()
            .join(format!("{REGISTRY_FILE_NAME}{suffix}"))
    }

    /// Current content of the registry file.
    pub fn content(&self) -> String {
        std::fs::read_to_string(self.file("")).expect("Failed to read registry file")
    }

    /// Open a second registry over the same directory.
    pub async fn reopen(&self) -> RegistryResult<FileRegistry> {
        FileRegistry::open(self.temp_dir.path()).await
    }
}
