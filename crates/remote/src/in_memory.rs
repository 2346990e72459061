//! In-memory remote store.
//!
//! Intended for tests/dev. Behaves like the hosted backend at the contract
//! level: referential integrity on venue references, generated report ids,
//! blob storage with public URLs, and aggregation snapshots computed from
//! whatever has actually been inserted — a queued-but-unsynced report is
//! invisible to them. Failure injection hooks let tests script outages.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use vigia_core::{LocationId, ObserverId, ReportId};

use crate::store::{
    DashboardSummary, LocationCrumb, ManagedUser, NewIncident, NewReport, RecentReport,
    RemoteStore, StoreError, Venue,
};

/// A report as persisted by the in-memory store.
#[derive(Debug, Clone)]
pub struct StoredReport {
    pub id: ReportId,
    pub report: NewReport,
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
struct Inner {
    healthy: bool,
    venues: Vec<Venue>,
    reports: Vec<StoredReport>,
    incidents: Vec<NewIncident>,
    blobs: HashMap<String, StoredBlob>,
    users: Vec<ManagedUser>,
    location_paths: HashMap<LocationId, Vec<LocationCrumb>>,
    injected_write_errors: VecDeque<StoreError>,
    fail_uploads: bool,
    write_delay: Option<Duration>,
    write_calls: usize,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            healthy: true,
            venues: Vec::new(),
            reports: Vec::new(),
            incidents: Vec::new(),
            blobs: HashMap::new(),
            users: Vec::new(),
            location_paths: HashMap::new(),
            injected_write_errors: VecDeque::new(),
            fail_uploads: false,
            write_delay: None,
            write_calls: 0,
        }
    }
}

/// In-memory implementation of [`RemoteStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_venue(&self, venue: Venue) {
        self.locked().venues.push(venue);
    }

    pub fn with_venue(self, venue: Venue) -> Self {
        self.add_venue(venue);
        self
    }

    /// Flip the reachability probe; `false` simulates an unreachable backend.
    pub fn set_healthy(&self, healthy: bool) {
        self.locked().healthy = healthy;
    }

    /// Queue an error to be returned by the next report/incident insert,
    /// in injection order.
    pub fn inject_write_error(&self, error: StoreError) {
        self.locked().injected_write_errors.push_back(error);
    }

    /// Make every evidence upload fail until reset.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.locked().fail_uploads = fail;
    }

    /// Delay every write, for tests that need two passes to overlap.
    pub fn set_write_delay(&self, delay: Duration) {
        self.locked().write_delay = Some(delay);
    }

    pub fn set_users(&self, users: Vec<ManagedUser>) {
        self.locked().users = users;
    }

    pub fn set_location_path(&self, location: LocationId, path: Vec<LocationCrumb>) {
        self.locked().location_paths.insert(location, path);
    }

    pub fn reports(&self) -> Vec<StoredReport> {
        self.locked().reports.clone()
    }

    pub fn incidents(&self) -> Vec<NewIncident> {
        self.locked().incidents.clone()
    }

    pub fn blob(&self, key: &str) -> Option<StoredBlob> {
        self.locked().blobs.get(key).cloned()
    }

    pub fn blob_keys(&self) -> Vec<String> {
        self.locked().blobs.keys().cloned().collect()
    }

    /// Total write-side calls (uploads + inserts) the store has received.
    pub fn write_calls(&self) -> usize {
        self.locked().write_calls
    }

    async fn apply_write_delay(&self) {
        let delay = self.locked().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn health_check(&self) -> bool {
        self.locked().healthy
    }

    async fn list_venues(&self) -> Result<Vec<Venue>, StoreError> {
        let mut venues = self.locked().venues.clone();
        venues.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(venues)
    }

    async fn upload_evidence(
        &self,
        key: &str,
        bytes: &[u8],
        mime: &str,
    ) -> Result<String, StoreError> {
        self.apply_write_delay().await;
        let mut inner = self.locked();
        inner.write_calls += 1;

        if inner.fail_uploads {
            return Err(StoreError::Api(503, "storage unavailable".to_string()));
        }

        inner.blobs.insert(
            key.to_string(),
            StoredBlob {
                mime: mime.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        Ok(format!("memory://evidence/{key}"))
    }

    async fn insert_report(&self, report: &NewReport) -> Result<ReportId, StoreError> {
        self.apply_write_delay().await;
        let mut inner = self.locked();
        inner.write_calls += 1;

        if let Some(err) = inner.injected_write_errors.pop_front() {
            return Err(err);
        }

        if !inner.venues.iter().any(|v| v.id == report.venue_id) {
            return Err(StoreError::ReferentialIntegrity(format!(
                "insert on table \"reports\" violates foreign key constraint: venue '{}' does not exist",
                report.venue_id
            )));
        }

        let id = ReportId::new();
        inner.reports.push(StoredReport {
            id,
            report: report.clone(),
        });
        Ok(id)
    }

    async fn insert_incident(&self, incident: &NewIncident) -> Result<(), StoreError> {
        self.apply_write_delay().await;
        let mut inner = self.locked();
        inner.write_calls += 1;

        if let Some(err) = inner.injected_write_errors.pop_front() {
            return Err(err);
        }

        if !inner.reports.iter().any(|r| r.id == incident.report_id) {
            return Err(StoreError::ReferentialIntegrity(format!(
                "insert on table \"incidents\" violates foreign key constraint: report '{}' does not exist",
                incident.report_id
            )));
        }

        inner.incidents.push(incident.clone());
        Ok(())
    }

    async fn dashboard_summary(&self, _user: ObserverId) -> Result<DashboardSummary, StoreError> {
        let inner = self.locked();

        let observers: std::collections::HashSet<ObserverId> =
            inner.reports.iter().map(|r| r.report.observer_id).collect();

        Ok(DashboardSummary {
            total_reports: inner.reports.len() as u64,
            critical_alerts: inner
                .incidents
                .iter()
                .filter(|i| i.severity.is_critical())
                .count() as u64,
            total_venues: inner.venues.len() as u64,
            total_observers: observers.len() as u64,
        })
    }

    async fn recent_reports(
        &self,
        _user: ObserverId,
        limit: u32,
    ) -> Result<Vec<RecentReport>, StoreError> {
        let inner = self.locked();

        let mut rows: Vec<&StoredReport> = inner.reports.iter().collect();
        rows.sort_by_key(|r| std::cmp::Reverse(r.report.captured_at));

        Ok(rows
            .into_iter()
            .take(limit as usize)
            .map(|r| RecentReport {
                id: r.id,
                venue_name: inner
                    .venues
                    .iter()
                    .find(|v| v.id == r.report.venue_id)
                    .map(|v| v.name.clone())
                    .unwrap_or_else(|| r.report.venue_id.to_string()),
                report_kind: r.report.report_kind,
                captured_at: r.report.captured_at,
                is_incident: r.report.form_data.is_incident(),
            })
            .collect())
    }

    async fn managed_users(&self, _manager: ObserverId) -> Result<Vec<ManagedUser>, StoreError> {
        Ok(self.locked().users.clone())
    }

    async fn location_path(
        &self,
        location: LocationId,
    ) -> Result<Vec<LocationCrumb>, StoreError> {
        Ok(self
            .locked()
            .location_paths
            .get(&location)
            .cloned()
            .unwrap_or_default())
    }
}
