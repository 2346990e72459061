//! Report submission: direct remote write with local-queue fallback.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use vigia_core::ReportId;
use vigia_remote::{NewIncident, NewReport, RemoteStore, ReportStatus, StoreError};
use vigia_reports::submission_evidence_key;

use crate::connectivity::ConnectivityMonitor;
use crate::queue::PendingQueue;
use crate::types::ReportDraft;

/// Why a direct submission failed, classified for the user.
#[derive(Debug, Error)]
pub enum SubmitFailure {
    /// The venue reference is demo data that does not exist server-side;
    /// retrying can never succeed.
    #[error("referential integrity violation: {0}")]
    ReferentialIntegrity(String),

    /// Network or server failure unrelated to the payload.
    #[error("submission failed: {0}")]
    Transient(String),
}

impl From<StoreError> for SubmitFailure {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ReferentialIntegrity(msg) => SubmitFailure::ReferentialIntegrity(msg),
            other => SubmitFailure::Transient(other.to_string()),
        }
    }
}

/// Outcome of a submission attempt. Every variant accounts for the report:
/// it was either written remotely or captured (best-effort) locally.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Written to the remote store.
    Submitted { report_id: ReportId },
    /// Known offline; enqueued without attempting network I/O.
    /// `queued` is false when local storage is unavailable.
    SavedOffline { queued: bool },
    /// Direct submission failed; the draft was enqueued as a backup.
    SavedAfterError {
        failure: SubmitFailure,
        queued: bool,
    },
}

impl SubmitOutcome {
    /// Message shown to the observer after the form is dismissed.
    pub fn user_message(&self) -> String {
        match self {
            SubmitOutcome::Submitted { .. } => "Report submitted successfully.".to_string(),
            SubmitOutcome::SavedOffline { queued: true } => {
                "No connection. The report was saved on this device and will sync \
                 automatically once a signal is available."
                    .to_string()
            }
            SubmitOutcome::SavedOffline { queued: false } => {
                "No connection, and local storage is unavailable on this device; the \
                 report could not be kept."
                    .to_string()
            }
            SubmitOutcome::SavedAfterError {
                failure: SubmitFailure::ReferentialIntegrity(_),
                ..
            } => {
                "Integrity error: the selected venue is demo data and does not exist in \
                 the central database. The report was kept locally."
                    .to_string()
            }
            SubmitOutcome::SavedAfterError {
                failure: SubmitFailure::Transient(msg),
                ..
            } => {
                format!("Submission failed: {msg}. The report was saved on this device for later sync.")
            }
        }
    }
}

/// Accepts completed form submissions and guarantees no report is silently
/// dropped: confirmed remote write, or confirmed local enqueue attempt.
pub struct ReportSubmitter<S> {
    store: Arc<S>,
    queue: Arc<PendingQueue>,
    monitor: Arc<ConnectivityMonitor>,
}

impl<S: RemoteStore> ReportSubmitter<S> {
    pub fn new(store: Arc<S>, queue: Arc<PendingQueue>, monitor: Arc<ConnectivityMonitor>) -> Self {
        Self {
            store,
            queue,
            monitor,
        }
    }

    /// Submit a completed form.
    pub async fn submit(&self, draft: ReportDraft) -> SubmitOutcome {
        if !self.monitor.is_online() {
            let queued = self.queue.enqueue(&draft).await.is_some();
            return SubmitOutcome::SavedOffline { queued };
        }

        match self.submit_online(&draft).await {
            Ok(report_id) => {
                tracing::info!(%report_id, venue = %draft.venue_id, "report submitted directly");
                SubmitOutcome::Submitted { report_id }
            }
            Err(err) => {
                tracing::warn!(venue = %draft.venue_id, "direct submission failed, queueing backup: {err}");
                let failure = SubmitFailure::from(err);
                let queued = self.queue.enqueue(&draft).await.is_some();
                SubmitOutcome::SavedAfterError { failure, queued }
            }
        }
    }

    async fn submit_online(&self, draft: &ReportDraft) -> Result<ReportId, StoreError> {
        let mut evidence_url = None;
        if let Some(image) = &draft.evidence {
            let key = submission_evidence_key(&draft.observer_id, Utc::now(), image);
            match self.store.upload_evidence(&key, &image.bytes, &image.mime).await {
                Ok(url) => evidence_url = Some(url),
                Err(err) => {
                    // Evidence upload is non-fatal; the report proceeds
                    // without a photo URL.
                    tracing::warn!("evidence upload failed, continuing without URL: {err}");
                }
            }
        }

        push_report(self.store.as_ref(), draft, evidence_url).await
    }
}

/// The two-step remote write shared by direct submission and queue replay:
/// parent report insert, then the incident-detail insert when the form
/// carries the incident marker.
pub(crate) async fn push_report<S: RemoteStore>(
    store: &S,
    draft: &ReportDraft,
    evidence_url: Option<String>,
) -> Result<ReportId, StoreError> {
    let new_report = NewReport {
        observer_id: draft.observer_id,
        venue_id: draft.venue_id.clone(),
        report_kind: draft.kind,
        captured_at: draft.captured_at,
        form_data: draft.form.clone(),
        geo: draft.geo,
        status: ReportStatus::Pending,
    };

    let report_id = store.insert_report(&new_report).await?;

    if let Some(incident) = draft.form.incident() {
        store
            .insert_incident(&NewIncident {
                report_id,
                category: incident.category,
                severity: incident.severity,
                description: incident.description.clone(),
                evidence_photo_url: evidence_url,
            })
            .await?;
    }

    Ok(report_id)
}
