//! File-based replica state registry for bitpres.
//!
//! Used when no relational store is configured. Provides:
//! - A versioned, line-oriented registry file with append and full-rewrite paths
//! - Tolerant loading that drops corrupt entries instead of failing
//! - The [`bitpres_core::Admin`] façade over the loaded entries

pub mod entry;
pub mod error;
pub mod format;
pub mod registry;

pub use entry::RegistryEntry;
pub use error::{RegistryError, RegistryResult};
pub use format::{FormatVersion, LoadReport};
pub use registry::{FileRegistry, REGISTRY_FILE_NAME};
