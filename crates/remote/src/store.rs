//! Remote store contract and error taxonomy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vigia_core::{LocationId, ObserverId, ReportId, VenueId};
use vigia_reports::{GeoPoint, IncidentCategory, ReportForm, ReportKind, Severity};

/// Remote store operation error.
///
/// Callers branch on the *kind*, never on message text: the one place the
/// backend's human-readable error strings are inspected is the REST adapter
/// that produces these variants.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The payload references a row that does not exist server-side
    /// (e.g. a placeholder venue). Retrying can never succeed.
    #[error("referential integrity violation: {0}")]
    ReferentialIntegrity(String),

    /// The request never produced a response (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("API error ({0}): {1}")]
    Api(u16, String),

    /// The response body could not be decoded.
    #[error("response parse error: {0}")]
    Parse(String),
}

impl StoreError {
    /// True for failures that no amount of retrying can fix.
    pub fn is_referential_integrity(&self) -> bool {
        matches!(self, StoreError::ReferentialIntegrity(_))
    }
}

/// Server-side moderation status assigned to a freshly-inserted report.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
}

/// Parent report insert payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub observer_id: ObserverId,
    pub venue_id: VenueId,
    pub report_kind: ReportKind,
    pub captured_at: DateTime<Utc>,
    pub form_data: ReportForm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoPoint>,
    pub status: ReportStatus,
}

/// Incident-detail insert payload, referencing the parent's generated id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncident {
    pub report_id: ReportId,
    pub category: IncidentCategory,
    pub severity: Severity,
    pub description: String,
    pub evidence_photo_url: Option<String>,
}

/// A polling venue as listed for the submission form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub id: VenueId,
    pub name: String,
}

impl Venue {
    /// The demo venue offered when the store has no real venues yet. Its id
    /// carries the placeholder marker, so the remote store is guaranteed to
    /// reject any report referencing it.
    pub fn demo() -> Self {
        Self {
            id: VenueId::new("mock-1").expect("demo venue id"),
            name: "Demo venue (seed data not loaded)".to_string(),
        }
    }
}

/// Substitute a single demo venue when the store has none.
pub fn with_demo_fallback(venues: Vec<Venue>) -> Vec<Venue> {
    if venues.is_empty() {
        vec![Venue::demo()]
    } else {
        venues
    }
}

/// Pre-aggregated dashboard counters, scoped to the requesting user's
/// jurisdiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_reports: u64,
    pub critical_alerts: u64,
    pub total_venues: u64,
    pub total_observers: u64,
}

/// One row of the recent-activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentReport {
    pub id: ReportId,
    pub venue_name: String,
    pub report_kind: ReportKind,
    pub captured_at: DateTime<Utc>,
    pub is_incident: bool,
}

/// An observer managed by the requesting coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedUser {
    pub id: ObserverId,
    pub full_name: String,
    pub role: String,
}

/// One level of the territorial hierarchy (country > department > ... >
/// venue), as rendered in breadcrumbs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCrumb {
    pub id: LocationId,
    pub name: String,
    pub level: String,
}

/// The hosted backend the pipeline writes to and the dashboard reads from.
///
/// Write operations are **not idempotent**: callers own exactly-once replay.
/// Aggregation reads return snapshots that lag behind the local queue.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Cheap reachability probe, used to seed and refresh the connectivity
    /// flag. Never errors; unreachable is `false`.
    async fn health_check(&self) -> bool;

    /// Venues available to the submission form, name-ordered.
    async fn list_venues(&self) -> Result<Vec<Venue>, StoreError>;

    /// Upload a binary payload under a caller-chosen key; returns the public
    /// URL it can be retrieved from.
    async fn upload_evidence(
        &self,
        key: &str,
        bytes: &[u8],
        mime: &str,
    ) -> Result<String, StoreError>;

    /// Insert the parent report record; returns the generated identifier.
    async fn insert_report(&self, report: &NewReport) -> Result<ReportId, StoreError>;

    /// Insert an incident-detail record referencing an existing report.
    async fn insert_incident(&self, incident: &NewIncident) -> Result<(), StoreError>;

    async fn dashboard_summary(&self, user: ObserverId) -> Result<DashboardSummary, StoreError>;

    async fn recent_reports(
        &self,
        user: ObserverId,
        limit: u32,
    ) -> Result<Vec<RecentReport>, StoreError>;

    async fn managed_users(&self, manager: ObserverId) -> Result<Vec<ManagedUser>, StoreError>;

    async fn location_path(&self, location: LocationId)
        -> Result<Vec<LocationCrumb>, StoreError>;
}
