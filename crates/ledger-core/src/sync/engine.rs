//! Pull/push reconciliation between the local store and the remote collection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex};

use super::id_coordinator::IdCoordinator;
use super::in_flight::InFlightGuard;
use super::matcher::{MatchResolver, MatchTolerance};
use super::progress::ProgressReporter;
use super::{local_deadline, remote_deadline};
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::{Record, RemoteDocument};
use crate::state::SyncPhase;
use crate::store::{IdentityProvider, LocalStore, RemoteError, RemoteStore};
use crate::util::{millis_before, unix_millis_now};

/// Which path produced a [`SyncReport`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncKind {
    #[default]
    Full,
    Incremental,
}

/// Why a sync entry point did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nobody is signed in
    NoOwner,
    /// The signed-in owner differs from the requested one
    OwnerMismatch,
    /// The engine was closed
    Closed,
    /// Another pass of the same kind is running
    AlreadyRunning,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NoOwner => "no signed-in owner",
            Self::OwnerMismatch => "owner is not signed in",
            Self::Closed => "engine closed",
            Self::AlreadyRunning => "already running",
        };
        f.write_str(label)
    }
}

/// Summary of one sync pass. Sync entry points never fail; problems end up
/// here and in the logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub kind: SyncKind,
    pub skipped: Option<SkipReason>,
    /// Documents returned by the remote
    pub received: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Documents missing required fields
    pub malformed: usize,
    /// Documents another pass was applying
    pub in_flight: usize,
    /// Documents whose local write failed
    pub write_failed: usize,
    pub pushed: usize,
    pub push_failed: usize,
    /// The modified-since query could not run; the tick was skipped
    pub index_unavailable: bool,
    pub pull_error: Option<String>,
    pub push_error: Option<String>,
    pub elapsed: Duration,
}

impl SyncReport {
    fn skipped(kind: SyncKind, reason: SkipReason) -> Self {
        Self {
            kind,
            skipped: Some(reason),
            ..Self::default()
        }
    }

    /// Whether the pass inserted or updated local records
    pub const fn changed_local(&self) -> bool {
        self.inserted > 0 || self.updated > 0
    }

    /// Whether both phases completed without a phase-level error
    pub const fn is_clean(&self) -> bool {
        self.skipped.is_none() && self.pull_error.is_none() && self.push_error.is_none()
    }
}

/// Result of [`ReconciliationEngine::save_record`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// The record as persisted locally, identity assigned
    pub record: Record,
    /// Whether the remote accepted the record during this call
    pub pushed: bool,
}

enum Applied {
    Inserted,
    Updated,
    Unchanged,
}

/// Whether a pulled version should replace the matched local record
fn supersedes(incoming: &Record, local: &Record) -> bool {
    incoming.modified_at > local.modified_at && !local.same_content(incoming)
}

/// Clears the incremental running flag when the pass ends, however it ends
struct RunningFlag<'a>(&'a AtomicBool);

impl<'a> RunningFlag<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The reconciliation engine.
///
/// Owns every piece of mutable sync state and is shared behind an [`Arc`].
/// Local writes always happen before remote calls, so an unreachable remote
/// never loses data.
pub struct ReconciliationEngine {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    config: SyncConfig,
    ids: IdCoordinator,
    in_flight: InFlightGuard,
    progress: ProgressReporter,
    phase: watch::Sender<SyncPhase>,
    full_sync_lock: Mutex<()>,
    id_assignment: Mutex<()>,
    incremental_running: AtomicBool,
    closed: AtomicBool,
}

impl ReconciliationEngine {
    /// Create an engine over the given collaborators
    pub fn open(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityProvider>,
        config: SyncConfig,
    ) -> Arc<Self> {
        let ids = IdCoordinator::new(local.clone(), remote.clone(), config.call_timeout);
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Arc::new(Self {
            in_flight: InFlightGuard::new(config.in_flight_grace),
            local,
            remote,
            identity,
            config,
            ids,
            progress: ProgressReporter::new(),
            phase,
            full_sync_lock: Mutex::new(()),
            id_assignment: Mutex::new(()),
            incremental_running: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// End the engine's lifecycle: later syncs are skipped, later saves fail
    /// and every progress stream ends. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Reconciliation engine closed");
        }
        self.progress.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub const fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Observe phase transitions
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Next free identity for `owner_id` across both stores
    pub async fn next_id(&self, owner_id: i64) -> i64 {
        self.ids.next_id(owner_id).await
    }

    #[cfg(test)]
    pub(crate) const fn in_flight(&self) -> &InFlightGuard {
        &self.in_flight
    }

    fn gate(&self, owner_id: i64) -> Option<SkipReason> {
        if self.is_closed() {
            return Some(SkipReason::Closed);
        }
        match self.identity.current_owner_id() {
            None => Some(SkipReason::NoOwner),
            Some(current) if current != owner_id => Some(SkipReason::OwnerMismatch),
            Some(_) => None,
        }
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.phase.send_replace(phase);
    }

    /// Pull every remote document, then push every local record.
    ///
    /// Full syncs are serialized; a second caller waits for the running one.
    pub async fn full_sync(&self, owner_id: i64) -> SyncReport {
        if let Some(reason) = self.gate(owner_id) {
            return SyncReport::skipped(SyncKind::Full, reason);
        }
        let _serial = self.full_sync_lock.lock().await;
        if let Some(reason) = self.gate(owner_id) {
            return SyncReport::skipped(SyncKind::Full, reason);
        }
        self.run_full_sync(owner_id).await
    }

    /// Like [`full_sync`](Self::full_sync) but drops the call when a full
    /// sync is already running.
    pub async fn full_sync_if_idle(&self, owner_id: i64) -> SyncReport {
        if let Some(reason) = self.gate(owner_id) {
            return SyncReport::skipped(SyncKind::Full, reason);
        }
        let Ok(_serial) = self.full_sync_lock.try_lock() else {
            tracing::debug!(owner_id, "Full sync already running; tick dropped");
            return SyncReport::skipped(SyncKind::Full, SkipReason::AlreadyRunning);
        };
        self.run_full_sync(owner_id).await
    }

    async fn run_full_sync(&self, owner_id: i64) -> SyncReport {
        let started = Instant::now();
        let mut report = SyncReport::default();
        let phase_timeout = self.config.phase_timeout;

        self.progress.emit_progress(0);
        self.set_phase(SyncPhase::Pulling);
        let resolver = MatchResolver::new(MatchTolerance::new(self.config.full_sync_tolerance));
        match tokio::time::timeout(phase_timeout, self.pull_all(owner_id, resolver, &mut report))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::error!(owner_id, "Pull phase failed: {}", error);
                report.pull_error = Some(error.to_string());
            }
            Err(_) => {
                tracing::error!(owner_id, "Pull phase timed out after {:?}", phase_timeout);
                report.pull_error = Some(format!("timed out after {phase_timeout:?}"));
            }
        }

        self.progress.emit_progress(50);
        self.set_phase(SyncPhase::Pushing);
        match tokio::time::timeout(phase_timeout, self.push_all(owner_id, &mut report)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::error!(owner_id, "Push phase failed: {}", error);
                report.push_error = Some(error.to_string());
            }
            Err(_) => {
                tracing::error!(owner_id, "Push phase timed out after {:?}", phase_timeout);
                report.push_error = Some(format!("timed out after {phase_timeout:?}"));
            }
        }

        self.progress.emit_progress(100);
        self.set_phase(SyncPhase::Idle);
        if report.changed_local() {
            self.progress.notify_data_changed(true);
        }
        self.schedule_progress_reset();

        report.elapsed = started.elapsed();
        tracing::info!(
            owner_id,
            received = report.received,
            inserted = report.inserted,
            updated = report.updated,
            pushed = report.pushed,
            "Full sync finished in {:?}",
            report.elapsed
        );
        report
    }

    fn schedule_progress_reset(&self) {
        let progress = self.progress.clone();
        let delay = self.config.progress_reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            progress.emit_progress(0);
        });
    }

    /// Pull only documents modified within the incremental window.
    ///
    /// At most one incremental pass runs at a time; extra calls are dropped.
    /// When the remote cannot serve the modified-since query the tick is
    /// skipped without falling back to a full scan.
    pub async fn incremental_sync(&self, owner_id: i64) -> SyncReport {
        if let Some(reason) = self.gate(owner_id) {
            return SyncReport::skipped(SyncKind::Incremental, reason);
        }
        let Some(_running) = RunningFlag::acquire(&self.incremental_running) else {
            tracing::debug!(owner_id, "Incremental sync already running; call dropped");
            return SyncReport::skipped(SyncKind::Incremental, SkipReason::AlreadyRunning);
        };

        let started = Instant::now();
        let mut report = SyncReport {
            kind: SyncKind::Incremental,
            ..SyncReport::default()
        };

        let entered = self.phase.send_if_modified(|phase| {
            if *phase == SyncPhase::Idle {
                *phase = SyncPhase::IncrementalPulling;
                true
            } else {
                false
            }
        });

        let since = millis_before(unix_millis_now(), self.config.incremental_window);
        let phase_timeout = self.config.phase_timeout;
        match tokio::time::timeout(
            phase_timeout,
            self.pull_modified_since(owner_id, since, &mut report),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(owner_id, "Incremental sync failed: {}", error);
                report.pull_error = Some(error.to_string());
            }
            Err(_) => {
                tracing::warn!(owner_id, "Incremental sync timed out after {:?}", phase_timeout);
                report.pull_error = Some(format!("timed out after {phase_timeout:?}"));
            }
        }

        if entered {
            self.phase.send_if_modified(|phase| {
                if *phase == SyncPhase::IncrementalPulling {
                    *phase = SyncPhase::Idle;
                    true
                } else {
                    false
                }
            });
        }
        if report.changed_local() {
            self.progress.notify_data_changed(true);
        }

        report.elapsed = started.elapsed();
        tracing::debug!(
            owner_id,
            received = report.received,
            inserted = report.inserted,
            updated = report.updated,
            "Incremental sync finished in {:?}",
            report.elapsed
        );
        report
    }

    async fn pull_all(
        &self,
        owner_id: i64,
        resolver: MatchResolver,
        report: &mut SyncReport,
    ) -> Result<()> {
        let documents =
            remote_deadline(self.config.call_timeout, self.remote.query_all(owner_id)).await?;
        let mut snapshot =
            local_deadline(self.config.call_timeout, self.local.list(owner_id)).await?;
        self.apply_documents(owner_id, documents, &mut snapshot, resolver, report)
            .await;
        Ok(())
    }

    async fn pull_modified_since(
        &self,
        owner_id: i64,
        since: i64,
        report: &mut SyncReport,
    ) -> Result<()> {
        let documents = match remote_deadline(
            self.config.call_timeout,
            self.remote.query_modified_since(owner_id, since),
        )
        .await
        {
            Ok(documents) => documents,
            Err(RemoteError::IndexUnavailable(message)) => {
                tracing::warn!(
                    owner_id,
                    "Modified-since index unavailable, skipping tick: {}",
                    message
                );
                report.index_unavailable = true;
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };
        if documents.is_empty() {
            return Ok(());
        }

        let mut snapshot =
            local_deadline(self.config.call_timeout, self.local.list(owner_id)).await?;
        let resolver =
            MatchResolver::new(MatchTolerance::new(self.config.incremental_tolerance));
        self.apply_documents(owner_id, documents, &mut snapshot, resolver, report)
            .await;
        Ok(())
    }

    /// Apply pulled documents against one local snapshot.
    ///
    /// The snapshot is never re-read during the pass; records the pass writes
    /// are reflected in it directly.
    async fn apply_documents(
        &self,
        owner_id: i64,
        documents: Vec<RemoteDocument>,
        snapshot: &mut Vec<Record>,
        resolver: MatchResolver,
        report: &mut SyncReport,
    ) {
        for document in documents {
            report.received += 1;

            let incoming = match Record::try_from(document) {
                Ok(record) if record.owner_id == owner_id => record,
                Ok(record) => {
                    tracing::warn!(
                        owner_id,
                        document_owner = record.owner_id,
                        "Skipping document of another owner"
                    );
                    report.malformed += 1;
                    continue;
                }
                Err(error) => {
                    tracing::warn!(owner_id, "Skipping remote document: {}", error);
                    report.malformed += 1;
                    continue;
                }
            };

            // Settled against the snapshot, including records this pass wrote
            if resolver
                .find_match(&incoming, snapshot)
                .is_some_and(|index| !supersedes(&incoming, &snapshot[index]))
            {
                report.unchanged += 1;
                continue;
            }

            let Some(_ticket) = self.in_flight.try_acquire(incoming.content_key()) else {
                tracing::debug!(
                    owner_id,
                    description = %incoming.description,
                    "Document already in flight in another pass"
                );
                report.in_flight += 1;
                continue;
            };

            match self.apply_one(owner_id, incoming, snapshot, resolver).await {
                Ok(Applied::Inserted) => report.inserted += 1,
                Ok(Applied::Updated) => report.updated += 1,
                Ok(Applied::Unchanged) => report.unchanged += 1,
                Err(error) => {
                    tracing::warn!(owner_id, "Local write failed for pulled document: {}", error);
                    report.write_failed += 1;
                }
            }
        }
    }

    async fn apply_one(
        &self,
        owner_id: i64,
        incoming: Record,
        snapshot: &mut Vec<Record>,
        resolver: MatchResolver,
    ) -> Result<Applied> {
        if let Some(index) = resolver.find_match(&incoming, snapshot) {
            let local = &snapshot[index];
            if !supersedes(&incoming, local) {
                return Ok(Applied::Unchanged);
            }

            let mut merged = local.clone();
            merged.apply_fields_from(&incoming);
            local_deadline(self.config.call_timeout, self.local.upsert(&merged)).await?;
            tracing::debug!(owner_id, record_id = ?merged.id, "Applied newer remote version");
            snapshot[index] = merged;
            return Ok(Applied::Updated);
        }

        let _assignment = self.id_assignment.lock().await;
        let mut record = incoming;
        if !record.is_identified() {
            record.id = Some(self.ids.next_id(owner_id).await);
        }
        let id = local_deadline(self.config.call_timeout, self.local.upsert(&record)).await?;
        record.id = Some(id);
        tracing::debug!(owner_id, record_id = id, "Inserted pulled record");
        snapshot.push(record);
        Ok(Applied::Inserted)
    }

    async fn push_all(&self, owner_id: i64, report: &mut SyncReport) -> Result<()> {
        let records = local_deadline(self.config.call_timeout, self.local.list(owner_id)).await?;

        for record in &records {
            let Some(id) = record.identity() else {
                continue;
            };
            let document = RemoteDocument::from(record);
            match remote_deadline(
                self.config.call_timeout,
                self.remote.upsert(owner_id, id, &document),
            )
            .await
            {
                Ok(()) => report.pushed += 1,
                Err(error) if error.is_connectivity() => {
                    report.push_failed += 1;
                    return Err(error.into());
                }
                Err(error) => {
                    tracing::warn!(owner_id, record_id = id, "Push failed: {}", error);
                    report.push_failed += 1;
                }
            }
        }
        Ok(())
    }

    /// Persist a record locally and, for local mutations of the signed-in
    /// owner, push it to the remote.
    ///
    /// `originates_remotely` marks writes that came from the remote itself;
    /// those are never pushed back and keep their `modified_at`, so one older
    /// than the stored row fails with [`Error::StaleWrite`]. Local edits are
    /// stamped past the stored version. The local write error is returned; a
    /// push failure only shows up as `pushed == false` and is repaired by the
    /// next full sync.
    pub async fn save_record(
        &self,
        mut record: Record,
        originates_remotely: bool,
    ) -> Result<SaveOutcome> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        {
            let _assignment = self.id_assignment.lock().await;
            if !record.is_identified() {
                record.id = Some(self.ids.next_id(record.owner_id).await);
            }
            if !originates_remotely {
                record.modified_at = self.local_edit_clock(&record).await?;
            }
            let id = local_deadline(self.config.call_timeout, self.local.upsert(&record)).await?;
            record.id = Some(id);
        }
        self.progress.notify_data_changed(true);

        let owner_signed_in = self.identity.current_owner_id() == Some(record.owner_id);
        let pushed = match record.identity() {
            Some(id) if !originates_remotely && owner_signed_in => {
                let document = RemoteDocument::from(&record);
                match remote_deadline(
                    self.config.call_timeout,
                    self.remote.upsert(record.owner_id, id, &document),
                )
                .await
                {
                    Ok(()) => true,
                    Err(error) => {
                        tracing::warn!(
                            owner_id = record.owner_id,
                            record_id = id,
                            "Saved locally, push deferred: {}",
                            error
                        );
                        false
                    }
                }
            }
            _ => false,
        };

        Ok(SaveOutcome { record, pushed })
    }

    /// `modified_at` for a local edit: the wall clock, but always past the
    /// stored version, whose stamp may come from another device's clock.
    async fn local_edit_clock(&self, record: &Record) -> Result<i64> {
        let now = unix_millis_now();
        let Some(id) = record.identity() else {
            return Ok(now);
        };
        let stored =
            local_deadline(self.config.call_timeout, self.local.get(record.owner_id, id)).await?;
        Ok(stored.map_or(now, |stored| now.max(stored.modified_at.saturating_add(1))))
    }

    /// Delete a record locally, then remotely when its owner is signed in.
    ///
    /// Returns whether the record existed locally. A failed remote delete is
    /// logged and not retried.
    pub async fn delete_record(&self, id: i64, owner_id: i64) -> Result<bool> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let existed =
            local_deadline(self.config.call_timeout, self.local.delete(id, owner_id)).await?;
        if existed {
            self.progress.notify_data_changed(true);
        }

        if self.identity.current_owner_id() == Some(owner_id) {
            if let Err(error) =
                remote_deadline(self.config.call_timeout, self.remote.delete(owner_id, id)).await
            {
                tracing::warn!(owner_id, record_id = id, "Remote delete failed: {}", error);
            }
        }
        Ok(existed)
    }
}
