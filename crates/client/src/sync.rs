//! Sync engine: opportunistic, sequential drain of the local queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use vigia_core::ReportId;
use vigia_remote::{RemoteStore, StoreError};
use vigia_reports::sync_evidence_key;

use crate::connectivity::ConnectivityMonitor;
use crate::queue::PendingQueue;
use crate::submitter::push_report;
use crate::types::{PassStatus, PendingReport, SyncSignal};

const DEFAULT_STATUS_CLEAR_AFTER: Duration = Duration::from_secs(5);

/// Why a sync invocation did not run a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyQueue,
    Offline,
    AlreadySyncing,
}

/// Counters for one executed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub attempted: usize,
    pub synced: usize,
    pub purged: usize,
    pub remaining: usize,
    pub failed: bool,
}

/// Result of a sync invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReport {
    Skipped(SkipReason),
    Completed(PassSummary),
}

/// Drains the local queue against the remote store.
///
/// Entries are processed strictly in enumeration order, one at a time: the
/// first unexpected failure stops the pass so a systemic outage is not
/// hammered once per queued entry, and the next trigger retries from the
/// still-accurate queue state.
pub struct SyncEngine<S> {
    store: Arc<S>,
    queue: Arc<PendingQueue>,
    monitor: Arc<ConnectivityMonitor>,
    syncing: AtomicBool,
    signal: Arc<watch::Sender<SyncSignal>>,
    status_clear_after: Duration,
}

/// Releases the `syncing` flag on every exit path of a pass.
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: RemoteStore> SyncEngine<S> {
    pub fn new(
        store: Arc<S>,
        queue: Arc<PendingQueue>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        let (signal, _) = watch::channel(SyncSignal::default());
        Self {
            store,
            queue,
            monitor,
            syncing: AtomicBool::new(false),
            signal: Arc::new(signal),
            status_clear_after: DEFAULT_STATUS_CLEAR_AFTER,
        }
    }

    pub fn with_status_clear_after(mut self, delay: Duration) -> Self {
        self.status_clear_after = delay;
        self
    }

    /// Subscribe to queue-depth/status updates (consumed by the status
    /// indicator).
    pub fn subscribe(&self) -> watch::Receiver<SyncSignal> {
        self.signal.subscribe()
    }

    /// Run one sync pass, unless the queue is empty, the client is offline,
    /// or a pass is already in flight.
    pub async fn run_pass(&self) -> PassReport {
        let entries = self.queue.list_all().await;
        self.signal.send_modify(|sig| sig.pending = entries.len());

        if entries.is_empty() {
            return PassReport::Skipped(SkipReason::EmptyQueue);
        }
        if !self.monitor.is_online() {
            return PassReport::Skipped(SkipReason::Offline);
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return PassReport::Skipped(SkipReason::AlreadySyncing);
        }
        let _guard = SyncingGuard(&self.syncing);

        let attempted = entries.len();
        let prior_status = self.signal.borrow().status;
        self.signal
            .send_modify(|sig| sig.status = PassStatus::Syncing);
        tracing::info!(pending = attempted, "sync pass started");

        let mut synced = 0usize;
        let mut purged = 0usize;
        let mut failed = false;

        for entry in &entries {
            // Terminal invalidity: a placeholder venue can never be written
            // remotely. Purge without any network call so it cannot block
            // the rest of the queue.
            if entry.draft.venue_id.is_placeholder() {
                tracing::warn!(
                    local_id = %entry.local_id,
                    venue = %entry.draft.venue_id,
                    "purging placeholder-venue entry from queue"
                );
                self.queue.remove(entry.local_id).await;
                purged += 1;
                continue;
            }

            match self.replay(entry).await {
                Ok(report_id) => {
                    self.queue.remove(entry.local_id).await;
                    synced += 1;
                    tracing::info!(local_id = %entry.local_id, %report_id, "queued report replayed");
                }
                Err(err) => {
                    tracing::error!(
                        local_id = %entry.local_id,
                        "sync pass stopped on first failure: {err}"
                    );
                    failed = true;
                    break;
                }
            }
        }

        let remaining = self.queue.depth().await;
        let status = if failed {
            PassStatus::Error
        } else if synced > 0 {
            PassStatus::Success
        } else {
            prior_status
        };
        self.signal.send_modify(|sig| {
            sig.pending = remaining;
            sig.status = status;
        });

        if status == PassStatus::Success {
            self.schedule_status_clear();
        }

        tracing::info!(synced, purged, remaining, failed, "sync pass finished");

        PassReport::Completed(PassSummary {
            attempted,
            synced,
            purged,
            remaining,
            failed,
        })
    }

    /// Replay one entry: optional evidence re-upload, then the same
    /// two-step write as direct submission, reusing the entry's original
    /// capture timestamp.
    async fn replay(&self, entry: &PendingReport) -> Result<ReportId, StoreError> {
        let draft = &entry.draft;

        let mut evidence_url = None;
        if let Some(image) = &draft.evidence {
            let key = sync_evidence_key(&draft.observer_id, Utc::now(), image);
            match self
                .store
                .upload_evidence(&key, &image.bytes, &image.mime)
                .await
            {
                Ok(url) => evidence_url = Some(url),
                Err(err) => {
                    tracing::warn!(
                        local_id = %entry.local_id,
                        "evidence re-upload failed, continuing without URL: {err}"
                    );
                }
            }
        }

        push_report(self.store.as_ref(), draft, evidence_url).await
    }

    /// `success` is transient: clear back to neutral after a short delay
    /// unless a later pass already changed the status.
    fn schedule_status_clear(&self) {
        let signal = Arc::clone(&self.signal);
        let delay = self.status_clear_after;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            signal.send_if_modified(|sig| {
                if sig.status == PassStatus::Success {
                    sig.status = PassStatus::Idle;
                    true
                } else {
                    false
                }
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vigia_core::{ObserverId, VenueId};
    use vigia_remote::{InMemoryStore, Venue};
    use vigia_reports::{EvidenceImage, ReportForm, ReportKind};

    use crate::types::{ConnectivityState, ReportDraft};

    fn draft(venue: &str) -> ReportDraft {
        ReportDraft::new(
            ObserverId::new(),
            VenueId::new(venue).unwrap(),
            ReportKind::Opening,
            Utc::now(),
            ReportForm::new().with_field("all_tables_open", true),
        )
    }

    async fn engine_with(
        store: Arc<InMemoryStore>,
        entries: &[ReportDraft],
    ) -> (SyncEngine<InMemoryStore>, Arc<PendingQueue>) {
        let queue = Arc::new(PendingQueue::open_in_memory().await);
        for entry in entries {
            queue.enqueue(entry).await.unwrap();
        }
        let monitor = Arc::new(ConnectivityMonitor::new(ConnectivityState::Online));
        let engine = SyncEngine::new(store, Arc::clone(&queue), monitor)
            .with_status_clear_after(Duration::from_millis(20));
        (engine, queue)
    }

    fn known_venue(id: &str) -> Venue {
        Venue {
            id: VenueId::new(id).unwrap(),
            name: format!("Venue {id}"),
        }
    }

    #[tokio::test]
    async fn successful_pass_drains_queue_and_publishes_success() {
        let store = Arc::new(InMemoryStore::new().with_venue(known_venue("v-1")));
        let captured_at = Utc::now() - chrono::Duration::hours(2);
        let mut entry = draft("v-1");
        entry.captured_at = captured_at;

        let (engine, queue) = engine_with(Arc::clone(&store), &[entry]).await;
        let rx = engine.subscribe();

        let report = engine.run_pass().await;
        assert_eq!(
            report,
            PassReport::Completed(PassSummary {
                attempted: 1,
                synced: 1,
                purged: 0,
                remaining: 0,
                failed: false,
            })
        );

        assert_eq!(queue.depth().await, 0);
        // The original capture timestamp is reused, not the sync time.
        assert_eq!(store.reports()[0].report.captured_at, captured_at);

        let signal = *rx.borrow();
        assert_eq!(signal.pending, 0);
        assert_eq!(signal.status, PassStatus::Success);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(rx.borrow().status, PassStatus::Idle);
    }

    #[tokio::test]
    async fn placeholder_entries_are_purged_without_network_calls() {
        let store = Arc::new(InMemoryStore::new().with_venue(known_venue("v-1")));
        let (engine, queue) = engine_with(Arc::clone(&store), &[draft("mock-1")]).await;
        let rx = engine.subscribe();

        let report = engine.run_pass().await;
        assert_eq!(
            report,
            PassReport::Completed(PassSummary {
                attempted: 1,
                synced: 0,
                purged: 1,
                remaining: 0,
                failed: false,
            })
        );

        assert_eq!(queue.depth().await, 0);
        assert_eq!(store.write_calls(), 0);
        // A purge-only pass does not claim success or error.
        assert_eq!(rx.borrow().status, PassStatus::Idle);
    }

    #[tokio::test]
    async fn first_failure_halts_the_batch() {
        // Entry 2 references a venue unknown to the store; its insert fails
        // (not via the placeholder rule), so entry 3 must stay untouched.
        let store = Arc::new(InMemoryStore::new().with_venue(known_venue("v-1")));
        let entries = [draft("v-1"), draft("unknown-venue"), draft("v-1")];
        let (engine, queue) = engine_with(Arc::clone(&store), &entries).await;

        let report = engine.run_pass().await;
        assert_eq!(
            report,
            PassReport::Completed(PassSummary {
                attempted: 3,
                synced: 1,
                purged: 0,
                remaining: 2,
                failed: true,
            })
        );

        let left = queue.list_all().await;
        assert_eq!(left.len(), 2);
        assert_eq!(left[0].draft.venue_id.as_str(), "unknown-venue");
        assert_eq!(left[1].draft.venue_id.as_str(), "v-1");
        assert_eq!(engine.subscribe().borrow().status, PassStatus::Error);
    }

    #[tokio::test]
    async fn transient_failure_leaves_all_entries_queued() {
        let store = Arc::new(InMemoryStore::new().with_venue(known_venue("v-1")));
        store.inject_write_error(StoreError::Api(500, "internal".to_string()));
        let (engine, queue) = engine_with(Arc::clone(&store), &[draft("v-1"), draft("v-1")]).await;

        let report = engine.run_pass().await;
        assert_eq!(
            report,
            PassReport::Completed(PassSummary {
                attempted: 2,
                synced: 0,
                purged: 0,
                remaining: 2,
                failed: true,
            })
        );
        assert_eq!(queue.depth().await, 2);
        assert_eq!(engine.subscribe().borrow().status, PassStatus::Error);
    }

    #[tokio::test]
    async fn error_status_persists_until_a_successful_pass() {
        let store = Arc::new(InMemoryStore::new().with_venue(known_venue("v-1")));
        store.inject_write_error(StoreError::Api(500, "internal".to_string()));
        let (engine, _queue) = engine_with(Arc::clone(&store), &[draft("v-1")]).await;
        let rx = engine.subscribe();

        engine.run_pass().await;
        assert_eq!(rx.borrow().status, PassStatus::Error);

        // Next trigger retries from the still-accurate queue state.
        engine.run_pass().await;
        assert_eq!(rx.borrow().status, PassStatus::Success);
    }

    #[tokio::test]
    async fn concurrent_invocations_run_exactly_one_pass() {
        let store = Arc::new(InMemoryStore::new().with_venue(known_venue("v-1")));
        store.set_write_delay(Duration::from_millis(30));
        let (engine, queue) = engine_with(Arc::clone(&store), &[draft("v-1"), draft("v-1")]).await;

        let (first, second) = tokio::join!(engine.run_pass(), engine.run_pass());

        let skipped = [first, second]
            .iter()
            .filter(|r| matches!(r, PassReport::Skipped(SkipReason::AlreadySyncing)))
            .count();
        assert_eq!(skipped, 1);
        assert_eq!(queue.depth().await, 0);
        assert_eq!(store.reports().len(), 2);
    }

    #[tokio::test]
    async fn offline_and_empty_invocations_are_no_ops() {
        let store = Arc::new(InMemoryStore::new().with_venue(known_venue("v-1")));

        let (engine, _queue) = engine_with(Arc::clone(&store), &[]).await;
        assert_eq!(
            engine.run_pass().await,
            PassReport::Skipped(SkipReason::EmptyQueue)
        );

        let queue = Arc::new(PendingQueue::open_in_memory().await);
        queue.enqueue(&draft("v-1")).await.unwrap();
        let monitor = Arc::new(ConnectivityMonitor::new(ConnectivityState::Offline));
        let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&queue), monitor);

        assert_eq!(
            engine.run_pass().await,
            PassReport::Skipped(SkipReason::Offline)
        );
        // Depth is still published for the indicator while offline.
        assert_eq!(engine.subscribe().borrow().pending, 1);
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test]
    async fn evidence_is_reuploaded_during_replay() {
        let store = Arc::new(InMemoryStore::new().with_venue(known_venue("v-1")));
        let entry = draft("v-1").with_evidence(EvidenceImage::jpeg(vec![9, 9, 9]));
        let (engine, _queue) = engine_with(Arc::clone(&store), &[entry]).await;

        engine.run_pass().await;

        let reports = store.reports();
        assert_eq!(reports.len(), 1);

        let observer = reports[0].report.observer_id;
        let keys = store.blob_keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with(&format!("{observer}/sync-")));
        assert_eq!(store.blob(&keys[0]).unwrap().bytes, vec![9, 9, 9]);
    }
}
