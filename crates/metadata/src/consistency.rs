//! Consistency store: ingestion, voting and queries over replica state.
//!
//! Every mutation follows the same shape: load the affected rows, apply a
//! [`ReplicaFileInfo`] transition, persist the rows in one commit, then re-vote
//! the files whose checksum information changed.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{ReplicaFileInfoRow, ReplicaRow};
use crate::repos::replica_files::StatusColumn;
use crate::repos::{FileRepo, ReplicaFileRepo, ReplicaRepo};
use crate::store::MetadataStore;
use bitpres_core::validate::not_empty;
use bitpres_core::{
    ChecksumStatus, FileListStatus, LOGGING_ENTRY_INTERVAL, NotificationType, Notifier, Replica,
    ReplicaFileInfo, ReplicaStoreState, VoteOutcome, canonical_checksum, vote,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use time::OffsetDateTime;

/// Counts of vote outcomes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoteSummary {
    pub unanimous: usize,
    pub majority: usize,
    pub ties: usize,
    pub missing_everywhere: usize,
    pub no_checksums: usize,
}

impl VoteSummary {
    fn record(&mut self, outcome: &VoteOutcome) {
        match outcome {
            VoteOutcome::Unanimous { .. } => self.unanimous += 1,
            VoteOutcome::Majority { .. } => self.majority += 1,
            VoteOutcome::Tie { .. } => self.ties += 1,
            VoteOutcome::MissingEverywhere => self.missing_everywhere += 1,
            VoteOutcome::NoChecksums => self.no_checksums += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.unanimous + self.majority + self.ties + self.missing_everywhere + self.no_checksums
    }
}

/// What one bulk ingestion did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Distinct files listed by the job.
    pub listed: usize,
    /// Files first seen in this job.
    pub created: usize,
    /// Rows of the replica the job did not list.
    pub missing: usize,
    /// Repeated filenames dropped after their first occurrence.
    pub duplicates: usize,
    /// Repeated filenames whose checksum differed from the first occurrence.
    pub conflicts: usize,
    /// Outcomes of the votes run for the affected files.
    pub votes: VoteSummary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JobKind {
    Filelist,
    Checksum,
}

/// Façade over the relational store.
pub struct ConsistencyStore {
    store: Arc<dyn MetadataStore>,
    replicas: Vec<Replica>,
    notifier: Arc<dyn Notifier>,
}

impl ConsistencyStore {
    /// Bind to a store, initialising its replica table on first use.
    ///
    /// The store must hold exactly the configured replicas afterwards; any
    /// difference is a configuration error.
    pub async fn open(
        store: Arc<dyn MetadataStore>,
        replicas: Vec<Replica>,
        notifier: Arc<dyn Notifier>,
    ) -> MetadataResult<Self> {
        if replicas.is_empty() {
            return Err(MetadataError::Config(
                "at least one replica must be configured".to_string(),
            ));
        }
        let mut ids = HashSet::new();
        for replica in &replicas {
            if !ids.insert(replica.id.as_str()) {
                return Err(MetadataError::Config(format!(
                    "replica '{}' is configured twice",
                    replica.id
                )));
            }
        }

        let existing = store.list_replicas().await?;
        if existing.is_empty() {
            for replica in &replicas {
                store.insert_replica(&ReplicaRow::from_replica(replica)).await?;
            }
            tracing::info!(count = replicas.len(), "Initialised replica table");
        } else {
            let known = existing
                .iter()
                .map(ReplicaRow::to_replica)
                .collect::<MetadataResult<Vec<_>>>()?;
            check_replica_set(&replicas, &known)?;
        }

        Ok(Self {
            store,
            replicas,
            notifier,
        })
    }

    /// The configured replicas.
    pub fn replicas(&self) -> &[Replica] {
        &self.replicas
    }

    /// A configured replica by id.
    pub fn replica(&self, replica_id: &str) -> MetadataResult<&Replica> {
        not_empty(replica_id, "replica id")?;
        self.replicas
            .iter()
            .find(|r| r.id == replica_id)
            .ok_or_else(|| MetadataError::UnknownId(format!("unknown replica '{replica_id}'")))
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub async fn close(&self) {
        self.store.close().await;
    }

    // =========================================================================
    // Registration and existence
    // =========================================================================

    /// Register a file for upload with its expected checksum.
    ///
    /// Fails with `IllegalState`, leaving every row untouched, if some replica
    /// already completed the upload or a different checksum was registered.
    pub async fn register_for_upload(&self, filename: &str, checksum: &str) -> MetadataResult<()> {
        not_empty(filename, "filename")?;
        not_empty(checksum, "checksum")?;

        let file_id = self.ensure_file(filename).await?.0;
        let mut infos = self.load_infos(file_id).await?;
        for info in &infos {
            info.check_registration(filename, checksum)?;
        }
        for info in &mut infos {
            info.register_for_upload(checksum);
        }
        self.persist(&infos).await?;
        tracing::debug!(filename, checksum, "Registered file for upload");
        Ok(())
    }

    /// Whether the file is known. Never fails for unknown files.
    pub async fn exists(&self, filename: &str) -> MetadataResult<bool> {
        not_empty(filename, "filename")?;
        Ok(self.store.get_file(filename).await?.is_some())
    }

    // =========================================================================
    // Per-replica state
    // =========================================================================

    pub async fn replica_file_info(
        &self,
        filename: &str,
        replica_id: &str,
    ) -> MetadataResult<ReplicaFileInfo> {
        let replica = self.replica(replica_id)?;
        let file_id = self.file_id(filename).await?;
        self.load_info(file_id, &replica.id, filename).await
    }

    pub async fn upload_status(
        &self,
        filename: &str,
        replica_id: &str,
    ) -> MetadataResult<ReplicaStoreState> {
        Ok(self.replica_file_info(filename, replica_id).await?.upload_status)
    }

    pub async fn filelist_status(
        &self,
        filename: &str,
        replica_id: &str,
    ) -> MetadataResult<FileListStatus> {
        Ok(self
            .replica_file_info(filename, replica_id)
            .await?
            .filelist_status)
    }

    /// Set the upload state reported by the upload protocol.
    ///
    /// A completed upload marks the file present and triggers a re-vote.
    pub async fn set_upload_status(
        &self,
        filename: &str,
        replica_id: &str,
        state: ReplicaStoreState,
    ) -> MetadataResult<()> {
        let mut info = self.replica_file_info(filename, replica_id).await?;
        if info.upload_status == ReplicaStoreState::UploadCompleted
            && state == ReplicaStoreState::Unknown
        {
            return Err(MetadataError::IllegalState(format!(
                "the upload of '{filename}' to replica '{replica_id}' is completed and can only \
                 be reset by an explicit correction"
            )));
        }
        info.set_upload_state(state);
        self.persist(std::slice::from_ref(&info)).await?;
        if state == ReplicaStoreState::UploadCompleted {
            self.vote_file_id(info.file_id, filename).await?;
        }
        Ok(())
    }

    /// Explicit correction of a row's upload state and, optionally, its
    /// reported checksum.
    ///
    /// The file is re-voted only when the row is marked completed or its
    /// checksum changed. Any other correction takes the row out of voting, so
    /// the corrected state stays in place.
    pub async fn change_upload_status(
        &self,
        filename: &str,
        replica_id: &str,
        state: ReplicaStoreState,
        checksum: Option<&str>,
    ) -> MetadataResult<()> {
        let mut info = self.replica_file_info(filename, replica_id).await?;
        let checksum_changed = match checksum {
            Some(checksum) => {
                not_empty(checksum, "checksum")?;
                info.correct(state, checksum)
            }
            None => {
                info.set_upload_state(state);
                false
            }
        };
        self.persist(std::slice::from_ref(&info)).await?;
        tracing::info!(
            filename,
            replica_id,
            state = %state,
            checksum_changed,
            "Corrected replica file state"
        );
        if checksum_changed || state == ReplicaStoreState::UploadCompleted {
            self.vote_file_id(info.file_id, filename).await?;
        }
        Ok(())
    }

    /// Filenames whose upload state on the replica is `state`.
    pub async fn files_in_upload_state(
        &self,
        replica_id: &str,
        state: ReplicaStoreState,
    ) -> MetadataResult<Vec<String>> {
        let replica = self.replica(replica_id)?;
        self.store
            .filenames_with_status(&replica.id, StatusColumn::Upload, &[state.code()])
            .await
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Ingest a filelist job result for one replica.
    pub async fn ingest_filelist(
        &self,
        replica_id: &str,
        filenames: &[String],
    ) -> MetadataResult<IngestReport> {
        let replica = self.replica(replica_id)?.clone();
        let mut report = IngestReport::default();
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(filenames.len());

        for filename in filenames {
            let filename = filename.trim();
            if filename.is_empty() {
                continue;
            }
            if !seen.insert(filename) {
                report.duplicates += 1;
                tracing::warn!(
                    replica_id = %replica.id,
                    filename,
                    "Filename listed more than once, ignoring repeat"
                );
                continue;
            }
            entries.push((filename, None));
        }

        self.apply_job(&replica, JobKind::Filelist, entries, report)
            .await
    }

    /// Ingest a checksum job result for one replica.
    pub async fn ingest_checksums(
        &self,
        replica_id: &str,
        entries: &[(String, String)],
    ) -> MetadataResult<IngestReport> {
        let replica = self.replica(replica_id)?.clone();
        let mut report = IngestReport::default();
        let mut first: HashMap<&str, &str> = HashMap::new();
        let mut unique = Vec::with_capacity(entries.len());

        for (filename, checksum) in entries {
            let filename = filename.trim();
            let checksum = checksum.trim();
            not_empty(filename, "filename")?;
            not_empty(checksum, "checksum")?;

            match first.get(filename) {
                None => {
                    first.insert(filename, checksum);
                    unique.push((filename, Some(checksum)));
                }
                Some(kept) if *kept == checksum => report.duplicates += 1,
                Some(kept) => {
                    report.duplicates += 1;
                    report.conflicts += 1;
                    tracing::error!(
                        replica_id = %replica.id,
                        filename,
                        kept = *kept,
                        ignored = checksum,
                        "Checksum job lists the same file with different checksums"
                    );
                    self.notifier.notify(
                        &format!(
                            "The checksum job for replica '{}' lists the file '{filename}' with \
                             both checksum '{kept}' and '{checksum}'. Keeping '{kept}'.",
                            replica.id
                        ),
                        NotificationType::Error,
                    );
                }
            }
        }

        self.apply_job(&replica, JobKind::Checksum, unique, report)
            .await
    }

    async fn apply_job(
        &self,
        replica: &Replica,
        kind: JobKind,
        entries: Vec<(&str, Option<&str>)>,
        mut report: IngestReport,
    ) -> MetadataResult<IngestReport> {
        let now = OffsetDateTime::now_utc();
        let total = entries.len();
        tracing::info!(replica_id = %replica.id, ?kind, entries = total, "Ingesting job result");

        let mut unseen: HashMap<i64, (i64, String)> = self
            .store
            .list_entries_for_replica(&replica.id)
            .await?
            .into_iter()
            .map(|e| (e.guid, (e.file_id, e.filename)))
            .collect();
        let mut affected: BTreeMap<i64, String> = BTreeMap::new();

        for (i, (filename, checksum)) in entries.into_iter().enumerate() {
            let (file_id, created) = self.ensure_file(filename).await?;
            if created {
                report.created += 1;
            }
            let mut info = self.load_info(file_id, &replica.id, filename).await?;
            match checksum {
                Some(checksum) => info.record_checksum(checksum, now),
                None => info.record_listed(now),
            }
            self.persist(std::slice::from_ref(&info)).await?;
            unseen.remove(&info.guid);
            affected.insert(file_id, filename.to_string());
            report.listed += 1;

            if (i + 1) % LOGGING_ENTRY_INTERVAL == 0 {
                tracing::info!(
                    replica_id = %replica.id,
                    processed = i + 1,
                    total,
                    "Ingestion progress"
                );
            }
        }

        for (guid, (file_id, filename)) in unseen {
            let Some(row) = self.store.get_replica_file_by_guid(guid).await? else {
                continue;
            };
            let mut info = row.to_info()?;
            info.record_missing(now);
            self.persist(std::slice::from_ref(&info)).await?;
            tracing::debug!(replica_id = %replica.id, filename = %filename, "File missing on replica");
            affected.insert(file_id, filename);
            report.missing += 1;
        }

        self.store.set_filelist_updated(&replica.id, now).await?;
        if kind == JobKind::Checksum {
            self.store.set_checksum_updated(&replica.id, now).await?;
        }

        for (file_id, filename) in &affected {
            let outcome = self.vote_file_id(*file_id, filename).await?;
            report.votes.record(&outcome);
        }

        tracing::info!(
            replica_id = %replica.id,
            listed = report.listed,
            created = report.created,
            missing = report.missing,
            duplicates = report.duplicates,
            conflicts = report.conflicts,
            "Finished ingesting job result"
        );
        Ok(report)
    }

    /// Record the result of a single-file checksum request. `None` means the
    /// replica does not hold the file.
    pub async fn update_checksum(
        &self,
        filename: &str,
        replica_id: &str,
        checksum: Option<&str>,
    ) -> MetadataResult<()> {
        if let Some(checksum) = checksum {
            not_empty(checksum, "checksum")?;
        }
        let mut info = self.replica_file_info(filename, replica_id).await?;
        info.record_single_checksum(checksum, OffsetDateTime::now_utc());
        self.persist(std::slice::from_ref(&info)).await?;
        self.vote_file_id(info.file_id, filename).await?;
        Ok(())
    }

    // =========================================================================
    // Voting
    // =========================================================================

    /// Re-run the checksum vote for one file.
    pub async fn vote_file(&self, filename: &str) -> MetadataResult<VoteOutcome> {
        let file_id = self.file_id(filename).await?;
        self.vote_file_id(file_id, filename).await
    }

    /// Re-run the checksum vote for every file that some replica lists.
    pub async fn vote_all(&self) -> MetadataResult<VoteSummary> {
        let mut summary = VoteSummary::default();
        for file in self.store.files_with_listed_rows().await? {
            let outcome = self.vote_file_id(file.file_id, &file.filename).await?;
            summary.record(&outcome);
        }
        tracing::info!(
            files = summary.total(),
            ties = summary.ties,
            majority = summary.majority,
            "Checksum vote over all files finished"
        );
        Ok(summary)
    }

    async fn vote_file_id(&self, file_id: i64, filename: &str) -> MetadataResult<VoteOutcome> {
        let mut infos = self.load_infos(file_id).await?;
        let result = vote(&infos);

        match &result.outcome {
            VoteOutcome::MissingEverywhere => {
                tracing::warn!(filename, "File is missing in all replicas");
                self.notifier.notify(
                    &format!("The file '{filename}' is missing in all replicas"),
                    NotificationType::Warning,
                );
            }
            VoteOutcome::NoChecksums => {
                tracing::debug!(filename, "No replica has reported a checksum, nothing to vote on");
            }
            VoteOutcome::Unanimous { checksum } => {
                tracing::trace!(filename, checksum = %checksum, "Replicas agree on checksum");
            }
            VoteOutcome::Majority {
                checksum,
                votes,
                dissenting,
            } => {
                tracing::warn!(
                    filename,
                    checksum = %checksum,
                    votes,
                    dissenting,
                    "Replicas disagree on checksum, minority marked corrupt"
                );
            }
            VoteOutcome::Tie { counts } => {
                tracing::error!(filename, counts = ?counts, "Checksum vote is tied");
                self.notifier.notify(
                    &format!(
                        "The checksum vote for the file '{filename}' is tied between {counts:?}. \
                         All replicas set to UNKNOWN."
                    ),
                    NotificationType::Error,
                );
            }
        }

        if !result.assignments.is_empty() {
            let now = OffsetDateTime::now_utc();
            let mut changed = Vec::with_capacity(result.assignments.len());
            for (guid, status) in &result.assignments {
                if let Some(info) = infos.iter_mut().find(|i| i.guid == *guid) {
                    info.record_vote(*status, now);
                    changed.push(info.clone());
                }
            }
            self.persist(&changed).await?;
        }

        Ok(result.outcome)
    }

    /// Canonical checksum of a file: any row voted OK, else a live re-vote.
    pub async fn checksum(&self, filename: &str) -> MetadataResult<Option<String>> {
        let file_id = self.file_id(filename).await?;
        let infos = self.load_infos(file_id).await?;
        Ok(canonical_checksum(&infos))
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Files not present on the replica at its last filelist check, or never checked.
    pub async fn missing_files(&self, replica_id: &str) -> MetadataResult<Vec<String>> {
        let replica = self.replica(replica_id)?;
        self.store
            .filenames_with_status(&replica.id, StatusColumn::Filelist, &missing_codes())
            .await
    }

    pub async fn count_missing_files(&self, replica_id: &str) -> MetadataResult<i64> {
        let replica = self.replica(replica_id)?;
        self.store
            .count_with_status(&replica.id, StatusColumn::Filelist, &missing_codes())
            .await
    }

    /// Files whose copy on the replica lost the last checksum vote.
    pub async fn corrupt_files(&self, replica_id: &str) -> MetadataResult<Vec<String>> {
        let replica = self.replica(replica_id)?;
        self.store
            .filenames_with_status(
                &replica.id,
                StatusColumn::Checksum,
                &[ChecksumStatus::Corrupt.code()],
            )
            .await
    }

    pub async fn count_corrupt_files(&self, replica_id: &str) -> MetadataResult<i64> {
        let replica = self.replica(replica_id)?;
        self.store
            .count_with_status(
                &replica.id,
                StatusColumn::Checksum,
                &[ChecksumStatus::Corrupt.code()],
            )
            .await
    }

    /// Files present on the replica at its last filelist check.
    pub async fn count_files(&self, replica_id: &str) -> MetadataResult<i64> {
        let replica = self.replica(replica_id)?;
        self.store
            .count_with_status(
                &replica.id,
                StatusColumn::Filelist,
                &[FileListStatus::Ok.code()],
            )
            .await
    }

    pub async fn last_filelist_update(
        &self,
        replica_id: &str,
    ) -> MetadataResult<Option<OffsetDateTime>> {
        Ok(self.replica_row(replica_id).await?.filelist_updated)
    }

    pub async fn last_checksum_update(
        &self,
        replica_id: &str,
    ) -> MetadataResult<Option<OffsetDateTime>> {
        Ok(self.replica_row(replica_id).await?.checksum_updated)
    }

    pub async fn all_filenames(&self) -> MetadataResult<Vec<String>> {
        self.store.list_filenames().await
    }

    pub async fn is_empty(&self) -> MetadataResult<bool> {
        Ok(self.store.count_files().await? == 0)
    }

    /// A bitarchive replica holding a copy of the file that passed the vote,
    /// skipping `exclude`. Notifies the operator when there is none.
    pub async fn bitarchive_with_good_file(
        &self,
        filename: &str,
        exclude: Option<&str>,
    ) -> MetadataResult<Option<Replica>> {
        if let Some(bad) = exclude {
            self.replica(bad)?;
        }
        let file_id = self.file_id(filename).await?;
        let infos = self.load_infos(file_id).await?;

        let found = infos
            .iter()
            .filter(|info| info.checksum_status == ChecksumStatus::Ok)
            .filter(|info| info.filelist_status == FileListStatus::Ok)
            .filter(|info| Some(info.replica_id.as_str()) != exclude)
            .filter_map(|info| self.replicas.iter().find(|r| r.id == info.replica_id))
            .find(|replica| replica.is_bitarchive())
            .cloned();

        match &found {
            Some(replica) => {
                tracing::trace!(filename, replica_id = %replica.id, "Found bitarchive with good copy");
            }
            None => {
                tracing::warn!(filename, ?exclude, "No bitarchive holds a good copy");
                self.notifier.notify(
                    &format!("No bitarchive replica was found which contains the file '{filename}'."),
                    NotificationType::Warning,
                );
            }
        }
        Ok(found)
    }

    // =========================================================================
    // Import from the file-based registry
    // =========================================================================

    /// Import one registry entry: the file, its checksum and a state per replica.
    ///
    /// All replica ids are checked before anything is written.
    pub async fn import_entry(
        &self,
        filename: &str,
        checksum: &str,
        states: &[(String, ReplicaStoreState, OffsetDateTime)],
    ) -> MetadataResult<()> {
        not_empty(filename, "filename")?;
        not_empty(checksum, "checksum")?;
        for (replica_id, _, _) in states {
            self.replica(replica_id)?;
        }

        let file_id = self.ensure_file(filename).await?.0;
        let mut infos = self.load_infos(file_id).await?;
        for (replica_id, state, at) in states {
            if let Some(info) = infos.iter_mut().find(|i| &i.replica_id == replica_id) {
                info.import_state(checksum, *state, *at);
            }
        }
        self.persist(&infos).await
    }

    /// Stamp every replica's filelist and checksum dates.
    pub async fn set_replica_dates(&self, at: OffsetDateTime) -> MetadataResult<()> {
        for replica in &self.replicas {
            self.store.set_filelist_updated(&replica.id, at).await?;
            self.store.set_checksum_updated(&replica.id, at).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn file_id(&self, filename: &str) -> MetadataResult<i64> {
        not_empty(filename, "filename")?;
        self.store
            .get_file(filename)
            .await?
            .map(|f| f.file_id)
            .ok_or_else(|| MetadataError::UnknownId(format!("unknown file '{filename}'")))
    }

    /// The file id, inserting the file and its rows if unseen.
    async fn ensure_file(&self, filename: &str) -> MetadataResult<(i64, bool)> {
        not_empty(filename, "filename")?;
        if let Some(file) = self.store.get_file(filename).await? {
            return Ok((file.file_id, false));
        }
        let file_id = self.store.insert_file(filename).await?;
        tracing::debug!(filename, file_id, "Registered new file");
        Ok((file_id, true))
    }

    async fn load_infos(&self, file_id: i64) -> MetadataResult<Vec<ReplicaFileInfo>> {
        self.store
            .list_for_file(file_id)
            .await?
            .iter()
            .map(ReplicaFileInfoRow::to_info)
            .collect()
    }

    async fn load_info(
        &self,
        file_id: i64,
        replica_id: &str,
        filename: &str,
    ) -> MetadataResult<ReplicaFileInfo> {
        self.store
            .get_replica_file(file_id, replica_id)
            .await?
            .ok_or_else(|| {
                MetadataError::Internal(format!(
                    "file '{filename}' has no row for replica '{replica_id}'"
                ))
            })?
            .to_info()
    }

    async fn persist(&self, infos: &[ReplicaFileInfo]) -> MetadataResult<()> {
        let rows: Vec<ReplicaFileInfoRow> =
            infos.iter().map(ReplicaFileInfoRow::from_info).collect();
        self.store.update_replica_files(&rows).await
    }

    async fn replica_row(&self, replica_id: &str) -> MetadataResult<ReplicaRow> {
        let replica = self.replica(replica_id)?;
        self.store
            .get_replica(&replica.id)
            .await?
            .ok_or_else(|| MetadataError::UnknownId(format!("unknown replica '{replica_id}'")))
    }
}

fn missing_codes() -> [i32; 2] {
    [
        FileListStatus::Missing.code(),
        FileListStatus::NoFilelistStatus.code(),
    ]
}

/// Compare the configured replica set with the one in the store.
fn check_replica_set(configured: &[Replica], stored: &[Replica]) -> MetadataResult<()> {
    let configured_ids: BTreeSet<&str> = configured.iter().map(|r| r.id.as_str()).collect();
    let stored_ids: BTreeSet<&str> = stored.iter().map(|r| r.id.as_str()).collect();

    let mut problems = Vec::new();
    let missing: Vec<&str> = configured_ids.difference(&stored_ids).copied().collect();
    if !missing.is_empty() {
        problems.push(format!("not in store: {}", missing.join(", ")));
    }
    let extra: Vec<&str> = stored_ids.difference(&configured_ids).copied().collect();
    if !extra.is_empty() {
        problems.push(format!("not configured: {}", extra.join(", ")));
    }
    for replica in configured {
        if let Some(existing) = stored.iter().find(|s| s.id == replica.id)
            && existing != replica
        {
            problems.push(format!("'{}' differs: store has {existing}", replica.id));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(MetadataError::Config(format!(
            "configured replicas do not match the store ({})",
            problems.join("; ")
        )))
    }
}
