//! Shared types of the submission pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vigia_core::{ObserverId, VenueId};
use vigia_reports::{EvidenceImage, GeoPoint, ReportForm, ReportKind};

/// Locally-assigned queue identifier.
///
/// Auto-incrementing, unique within this device's queue only, and never sent
/// to the remote store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub i64);

impl core::fmt::Display for LocalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Connectivity state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// Online and able to reach the remote store.
    Online,
    /// Offline (network unreachable or remote store unavailable).
    Offline,
}

/// Whether durable local storage could be opened at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueAvailability {
    Available,
    /// Local persistence is blocked (e.g. storage permission denied); the
    /// client degrades to no-offline-capability mode.
    Unavailable,
}

/// A report as captured from the form, before it is durably enqueued.
///
/// Drafts have no [`LocalId`]; one is assigned only when the queue persists
/// the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDraft {
    pub observer_id: ObserverId,
    pub venue_id: VenueId,
    pub kind: ReportKind,
    /// When the observer captured the report, independent of when it is
    /// eventually synced.
    pub captured_at: DateTime<Utc>,
    pub form: ReportForm,
    pub geo: Option<GeoPoint>,
    pub evidence: Option<EvidenceImage>,
}

impl ReportDraft {
    pub fn new(
        observer_id: ObserverId,
        venue_id: VenueId,
        kind: ReportKind,
        captured_at: DateTime<Utc>,
        form: ReportForm,
    ) -> Self {
        Self {
            observer_id,
            venue_id,
            kind,
            captured_at,
            form,
            geo: None,
            evidence: None,
        }
    }

    pub fn with_geo(mut self, geo: GeoPoint) -> Self {
        self.geo = Some(geo);
        self
    }

    pub fn with_evidence(mut self, evidence: EvidenceImage) -> Self {
        self.evidence = Some(evidence);
        self
    }
}

/// A durably enqueued report awaiting replay. Immutable once queued.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReport {
    pub local_id: LocalId,
    pub draft: ReportDraft,
}

/// Outcome of the last sync pass, as published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassStatus {
    Idle,
    Syncing,
    Success,
    Error,
}

/// Queue depth plus last pass outcome; the signal the status indicator
/// subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSignal {
    pub pending: usize,
    pub status: PassStatus,
}

impl Default for SyncSignal {
    fn default() -> Self {
        Self {
            pending: 0,
            status: PassStatus::Idle,
        }
    }
}
