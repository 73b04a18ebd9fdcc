//! Collapse per-replica upload states into one reporting state.

use crate::status::ReplicaStoreState;
use time::OffsetDateTime;

/// One replica's view of a file: its upload state and when it last changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateReport {
    pub state: ReplicaStoreState,
    pub changed_at: OffsetDateTime,
}

impl StateReport {
    pub fn new(state: ReplicaStoreState, changed_at: OffsetDateTime) -> Self {
        Self { state, changed_at }
    }
}

/// Resolve the aggregate state of a file from its bitarchive replicas.
///
/// - no reports: UPLOAD_FAILED stamped `now`
/// - one report: returned as is
/// - any UPLOAD_FAILED: UPLOAD_FAILED with the latest timestamp
/// - otherwise: the state with the lowest [`rank`], with the latest timestamp
///   of all reports (not necessarily the timestamp of the chosen state)
///
/// [`rank`]: ReplicaStoreState::rank
pub fn aggregate_state(reports: &[StateReport], now: OffsetDateTime) -> StateReport {
    let (first, rest) = match reports.split_first() {
        None => return StateReport::new(ReplicaStoreState::UploadFailed, now),
        Some(split) => split,
    };
    if rest.is_empty() {
        return *first;
    }

    let latest = reports
        .iter()
        .map(|r| r.changed_at)
        .max()
        .unwrap_or(first.changed_at);

    if reports
        .iter()
        .any(|r| r.state == ReplicaStoreState::UploadFailed)
    {
        return StateReport::new(ReplicaStoreState::UploadFailed, latest);
    }

    let state = reports
        .iter()
        .map(|r| r.state)
        .min_by_key(|s| s.rank())
        .unwrap_or(first.state);
    StateReport::new(state, latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_empty_is_failed_now() {
        let now = datetime!(2024-05-01 12:00 UTC);
        let agg = aggregate_state(&[], now);
        assert_eq!(agg.state, ReplicaStoreState::UploadFailed);
        assert_eq!(agg.changed_at, now);
    }

    #[test]
    fn test_single_report_is_verbatim() {
        let at = datetime!(2020-01-01 0:00 UTC);
        let report = StateReport::new(ReplicaStoreState::DataUploaded, at);
        let agg = aggregate_state(&[report], datetime!(2024-05-01 12:00 UTC));
        assert_eq!(agg, report);
    }

    #[test]
    fn test_failed_wins_with_latest_timestamp() {
        let reports = [
            StateReport::new(
                ReplicaStoreState::UploadFailed,
                datetime!(2021-01-01 0:00 UTC),
            ),
            StateReport::new(
                ReplicaStoreState::UploadCompleted,
                datetime!(2023-06-01 0:00 UTC),
            ),
            StateReport::new(ReplicaStoreState::UploadStarted, datetime!(2022-01-01 0:00 UTC)),
        ];
        let agg = aggregate_state(&reports, datetime!(2024-05-01 12:00 UTC));
        assert_eq!(agg.state, ReplicaStoreState::UploadFailed);
        assert_eq!(agg.changed_at, datetime!(2023-06-01 0:00 UTC));
    }

    #[test]
    fn test_lowest_rank_with_latest_timestamp() {
        let reports = [
            StateReport::new(
                ReplicaStoreState::UploadCompleted,
                datetime!(2023-06-01 0:00 UTC),
            ),
            StateReport::new(ReplicaStoreState::Unknown, datetime!(2021-01-01 0:00 UTC)),
            StateReport::new(ReplicaStoreState::DataUploaded, datetime!(2020-01-01 0:00 UTC)),
        ];
        let agg = aggregate_state(&reports, datetime!(2024-05-01 12:00 UTC));
        assert_eq!(agg.state, ReplicaStoreState::DataUploaded);
        // Timestamp comes from the completed replica, not the chosen one.
        assert_eq!(agg.changed_at, datetime!(2023-06-01 0:00 UTC));
    }

    #[test]
    fn test_completed_beats_unknown() {
        let at = datetime!(2023-06-01 0:00 UTC);
        let reports = [
            StateReport::new(ReplicaStoreState::Unknown, at),
            StateReport::new(ReplicaStoreState::UploadCompleted, at),
        ];
        let agg = aggregate_state(&reports, at);
        assert_eq!(agg.state, ReplicaStoreState::UploadCompleted);
    }
}
