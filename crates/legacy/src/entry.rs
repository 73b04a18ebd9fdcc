//! In-memory registry entry.

use bitpres_core::{PendingReply, ReplicaStoreState, StateReport, aggregate_state};
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;

/// One registered file: its checksum and the upload state per replica.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryEntry {
    pub filename: String,
    pub checksum: String,
    /// Upload state per replica id, with the time it last changed.
    pub states: BTreeMap<String, StateReport>,
    /// Not persisted.
    pub reply: Option<PendingReply>,
}

impl RegistryEntry {
    pub fn new(
        filename: impl Into<String>,
        checksum: impl Into<String>,
        reply: Option<PendingReply>,
    ) -> Self {
        Self {
            filename: filename.into(),
            checksum: checksum.into(),
            states: BTreeMap::new(),
            reply,
        }
    }

    pub fn state(&self, replica_id: &str) -> Option<ReplicaStoreState> {
        self.states.get(replica_id).map(|r| r.state)
    }

    pub fn set_state(&mut self, replica_id: &str, state: ReplicaStoreState, at: OffsetDateTime) {
        self.states
            .insert(replica_id.to_string(), StateReport::new(state, at));
    }

    /// Collapsed state over the bitarchive replicas that reported one.
    /// Replicas in `checksum_only` hold no file bytes and are left out.
    pub fn aggregate(&self, now: OffsetDateTime, checksum_only: &BTreeSet<String>) -> StateReport {
        let reports: Vec<StateReport> = self
            .states
            .iter()
            .filter(|(replica, _)| !checksum_only.contains(*replica))
            .map(|(_, report)| *report)
            .collect();
        aggregate_state(&reports, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_later_state_replaces_earlier() {
        let mut entry = RegistryEntry::new("f.arc", "abc", None);
        entry.set_state(
            "ONE",
            ReplicaStoreState::UploadStarted,
            datetime!(2024-01-01 0:00 UTC),
        );
        entry.set_state(
            "ONE",
            ReplicaStoreState::UploadCompleted,
            datetime!(2024-01-02 0:00 UTC),
        );
        assert_eq!(entry.state("ONE"), Some(ReplicaStoreState::UploadCompleted));
        assert_eq!(entry.state("TWO"), None);
        assert_eq!(entry.states.len(), 1);
    }

    #[test]
    fn test_aggregate_prefers_failure() {
        let mut entry = RegistryEntry::new("f.arc", "abc", None);
        entry.set_state(
            "ONE",
            ReplicaStoreState::UploadCompleted,
            datetime!(2024-01-05 0:00 UTC),
        );
        entry.set_state(
            "TWO",
            ReplicaStoreState::UploadFailed,
            datetime!(2024-01-01 0:00 UTC),
        );
        let agg = entry.aggregate(datetime!(2024-02-01 0:00 UTC), &BTreeSet::new());
        assert_eq!(agg.state, ReplicaStoreState::UploadFailed);
        assert_eq!(agg.changed_at, datetime!(2024-01-05 0:00 UTC));
    }

    #[test]
    fn test_aggregate_skips_checksum_replicas() {
        let mut entry = RegistryEntry::new("f.arc", "abc", None);
        entry.set_state(
            "ONE",
            ReplicaStoreState::UploadCompleted,
            datetime!(2024-01-05 0:00 UTC),
        );
        entry.set_state(
            "CS",
            ReplicaStoreState::UploadFailed,
            datetime!(2024-01-07 0:00 UTC),
        );
        let checksum_only = BTreeSet::from(["CS".to_string()]);
        let agg = entry.aggregate(datetime!(2024-02-01 0:00 UTC), &checksum_only);
        assert_eq!(agg.state, ReplicaStoreState::UploadCompleted);
        assert_eq!(agg.changed_at, datetime!(2024-01-05 0:00 UTC));
    }
}
