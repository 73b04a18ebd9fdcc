//! Core domain types and reconciliation rules for replica bit-preservation.
//!
//! This crate defines the data model and pure logic used by every store:
//! - Replica identity and the three per-replica status enumerations
//! - The per-replica file record and its transitions
//! - Checksum voting and aggregate upload-state resolution
//! - The admin façade, operator notifications and configuration

pub mod admin;
pub mod aggregate;
pub mod checksum_job;
pub mod config;
pub mod error;
pub mod notify;
pub mod replica;
pub mod state;
pub mod status;
pub mod validate;
pub mod vote;

pub use admin::{Admin, PendingReply};
pub use aggregate::{StateReport, aggregate_state};
pub use error::{Error, Result};
pub use notify::{LogNotifier, MemoryNotifier, NotificationType, Notifier};
pub use replica::{Replica, ReplicaType};
pub use state::ReplicaFileInfo;
pub use status::{ChecksumStatus, FileListStatus, ReplicaStoreState};
pub use vote::{Vote, VoteOutcome, canonical_checksum, vote};

/// Bulk ingestion logs progress once per this many entries.
pub const LOGGING_ENTRY_INTERVAL: usize = 1000;
