//! Test fixtures for replica sets and job input.

use bitpres_core::{Replica, ReplicaType};

/// The three replicas of `AppConfig::for_testing`.
#[allow(dead_code)]
pub fn default_replicas() -> Vec<Replica> {
    bitpres_core::config::AppConfig::for_testing("unused.db").replica_set()
}

/// `n` bitarchive replicas named R1..Rn.
#[allow(dead_code)]
pub fn bitarchives(n: usize) -> Vec<Replica> {
    (1..=n)
        .map(|i| Replica::new(format!("R{i}"), format!("Bitarchive{i}"), ReplicaType::Bitarchive))
        .collect()
}

/// Owned filename list for filelist ingestion.
#[allow(dead_code)]
pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Owned (filename, checksum) pairs for checksum ingestion.
#[allow(dead_code)]
pub fn checksums(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(f, c)| (f.to_string(), c.to_string()))
        .collect()
}
