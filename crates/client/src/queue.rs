//! Durable local queue of pending reports, persisted in SQLite.
//!
//! The queue is the device's only offline state: append-only from the
//! submitter's side, delete-only from the sync engine's side, surviving page
//! reloads and app restarts. Storage failures never propagate into the
//! submission flow — the client degrades to no-offline-capability mode,
//! detected once at open time rather than on first write.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use vigia_core::{ObserverId, VenueId};
use vigia_reports::{EvidenceImage, GeoPoint, ReportForm, ReportKind};

use crate::types::{LocalId, PendingReport, QueueAvailability, ReportDraft};

/// SQLite-backed queue of [`PendingReport`] entries.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct PendingQueue {
    pool: Option<SqlitePool>,
}

impl PendingQueue {
    /// Open (or create) the queue database at `path`.
    ///
    /// Never fails: when storage cannot be opened the queue comes up
    /// [`QueueAvailability::Unavailable`] and every operation degrades to a
    /// logged no-op.
    pub async fn open(path: &Path) -> Self {
        match Self::init(path).await {
            Ok(pool) => Self { pool: Some(pool) },
            Err(err) => {
                tracing::warn!("local queue unavailable; offline capture disabled: {err:?}");
                Self { pool: None }
            }
        }
    }

    /// Open a private in-memory queue (tests and ephemeral sessions).
    pub async fn open_in_memory() -> Self {
        let options = SqliteConnectOptions::new().in_memory(true);
        let connect = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await;

        match connect {
            Ok(pool) => match Self::create_schema(&pool).await {
                Ok(()) => Self { pool: Some(pool) },
                Err(err) => {
                    tracing::warn!("in-memory queue unavailable: {err:?}");
                    Self { pool: None }
                }
            },
            Err(err) => {
                tracing::warn!("in-memory queue unavailable: {err:?}");
                Self { pool: None }
            }
        }
    }

    /// A queue handle with no backing storage (degraded mode).
    pub fn unavailable() -> Self {
        Self { pool: None }
    }

    pub fn availability(&self) -> QueueAvailability {
        if self.pool.is_some() {
            QueueAvailability::Available
        } else {
            QueueAvailability::Unavailable
        }
    }

    async fn init(path: &Path) -> anyhow::Result<SqlitePool> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create queue directory at {parent:?}"))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open queue database at {path:?}"))?;

        Self::create_schema(&pool).await?;
        Ok(pool)
    }

    async fn create_schema(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_reports (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                observer_id  TEXT NOT NULL,
                venue_id     TEXT NOT NULL,
                report_kind  TEXT NOT NULL,
                captured_at  TEXT NOT NULL,
                form_data    TEXT NOT NULL,
                geo          TEXT NULL,
                evidence     TEXT NULL,
                queued_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .context("failed to create pending_reports table")?;

        Ok(())
    }

    /// Persist a draft and assign its local id.
    ///
    /// Returns `None` — after logging — when storage is unavailable or the
    /// insert fails; the caller treats offline capture as best-effort and
    /// must not fail its own flow.
    pub async fn enqueue(&self, draft: &ReportDraft) -> Option<LocalId> {
        let Some(pool) = &self.pool else {
            tracing::warn!("local queue unavailable; report not captured offline");
            return None;
        };

        let form_data = match serde_json::to_string(&draft.form) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!("failed to serialize form data for enqueue: {err:?}");
                return None;
            }
        };
        let geo = match draft.geo.map(|g| serde_json::to_string(&g)).transpose() {
            Ok(geo) => geo,
            Err(err) => {
                tracing::error!("failed to serialize geo for enqueue: {err:?}");
                return None;
            }
        };
        let evidence = draft.evidence.as_ref().map(EvidenceImage::to_data_url);

        let result = sqlx::query(
            r#"
            INSERT INTO pending_reports (
                observer_id,
                venue_id,
                report_kind,
                captured_at,
                form_data,
                geo,
                evidence,
                queued_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(draft.observer_id.to_string())
        .bind(draft.venue_id.as_str())
        .bind(draft.kind.as_str())
        .bind(draft.captured_at.to_rfc3339())
        .bind(form_data)
        .bind(geo)
        .bind(evidence)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await;

        match result {
            Ok(done) => {
                let local_id = LocalId(done.last_insert_rowid());
                tracing::info!(%local_id, venue = %draft.venue_id, "report enqueued for later sync");
                Some(local_id)
            }
            Err(err) => {
                tracing::error!("failed to enqueue report: {err:?}");
                None
            }
        }
    }

    /// All queued entries, in local enumeration (insertion) order.
    pub async fn list_all(&self) -> Vec<PendingReport> {
        let Some(pool) = &self.pool else {
            return Vec::new();
        };

        let rows = sqlx::query(
            r#"
            SELECT
                id,
                observer_id,
                venue_id,
                report_kind,
                captured_at,
                form_data,
                geo,
                evidence
            FROM pending_reports
            ORDER BY id ASC
            "#,
        )
        .fetch_all(pool)
        .await;

        match rows {
            Ok(rows) => rows
                .into_iter()
                .filter_map(|row| match row_to_pending(row) {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        tracing::error!("skipping undecodable queue entry: {err:?}");
                        None
                    }
                })
                .collect(),
            Err(err) => {
                tracing::error!("failed to list pending reports: {err:?}");
                Vec::new()
            }
        }
    }

    /// Delete one entry. Removing an already-absent id is a no-op.
    pub async fn remove(&self, local_id: LocalId) {
        let Some(pool) = &self.pool else {
            return;
        };

        let result = sqlx::query("DELETE FROM pending_reports WHERE id = ?1")
            .bind(local_id.0)
            .execute(pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                tracing::debug!(%local_id, "queue entry already absent");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(%local_id, "failed to remove queue entry: {err:?}");
            }
        }
    }

    /// Current number of queued entries.
    pub async fn depth(&self) -> usize {
        let Some(pool) = &self.pool else {
            return 0;
        };

        let row = sqlx::query("SELECT COUNT(*) AS count FROM pending_reports")
            .fetch_one(pool)
            .await;

        match row {
            Ok(row) => row.try_get::<i64, _>("count").unwrap_or(0) as usize,
            Err(err) => {
                tracing::error!("failed to count pending reports: {err:?}");
                0
            }
        }
    }
}

/// Map a database row into a [`PendingReport`].
fn row_to_pending(row: SqliteRow) -> anyhow::Result<PendingReport> {
    let id: i64 = row.try_get("id")?;

    let observer_str: String = row.try_get("observer_id")?;
    let observer_id = observer_str
        .parse::<ObserverId>()
        .context("invalid observer_id in pending_reports")?;

    let venue_str: String = row.try_get("venue_id")?;
    let venue_id = venue_str
        .parse::<VenueId>()
        .context("invalid venue_id in pending_reports")?;

    let kind_str: String = row.try_get("report_kind")?;
    let kind = kind_str
        .parse::<ReportKind>()
        .context("invalid report_kind in pending_reports")?;

    let captured_str: String = row.try_get("captured_at")?;
    let captured_at = DateTime::parse_from_rfc3339(&captured_str)
        .map(|dt| dt.with_timezone(&Utc))
        .context("invalid captured_at in pending_reports")?;

    let form_str: String = row.try_get("form_data")?;
    let form: ReportForm =
        serde_json::from_str(&form_str).context("invalid form_data in pending_reports")?;

    let geo_str: Option<String> = row.try_get("geo")?;
    let geo = geo_str
        .map(|s| serde_json::from_str::<GeoPoint>(&s))
        .transpose()
        .context("invalid geo in pending_reports")?;

    let evidence_str: Option<String> = row.try_get("evidence")?;
    let evidence = evidence_str
        .map(|s| EvidenceImage::from_data_url(&s))
        .transpose()
        .context("invalid evidence in pending_reports")?;

    Ok(PendingReport {
        local_id: LocalId(id),
        draft: ReportDraft {
            observer_id,
            venue_id,
            kind,
            captured_at,
            form,
            geo,
            evidence,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigia_reports::{IncidentCategory, IncidentFields, Severity};

    fn sample_draft() -> ReportDraft {
        let form = ReportForm::new()
            .with_field("tables_open", 8)
            .with_incident(IncidentFields::new(
                IncidentCategory::Proselytism,
                Severity::Medium,
                "Campaign material inside the venue",
            ));

        ReportDraft::new(
            ObserverId::new(),
            VenueId::new("venue-7").unwrap(),
            ReportKind::Midday,
            Utc::now(),
            form,
        )
        .with_geo(GeoPoint::new(-16.5, -68.15).unwrap())
        .with_evidence(EvidenceImage::jpeg(vec![0xff, 0xd8, 0xff]))
    }

    #[tokio::test]
    async fn enqueue_assigns_monotonic_ids_and_round_trips() {
        let queue = PendingQueue::open_in_memory().await;
        assert_eq!(queue.availability(), QueueAvailability::Available);

        let draft = sample_draft();
        let first = queue.enqueue(&draft).await.unwrap();
        let second = queue.enqueue(&draft).await.unwrap();
        assert!(second.0 > first.0);

        let entries = queue.list_all().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].local_id, first);
        assert_eq!(entries[0].draft.captured_at, draft.captured_at);
        assert_eq!(entries[0].draft.observer_id, draft.observer_id);
        assert_eq!(entries[0].draft.venue_id, draft.venue_id);
        assert_eq!(entries[0].draft.kind, draft.kind);
        assert_eq!(entries[0].draft.form, draft.form);
        assert_eq!(entries[0].draft.geo, draft.geo);
        assert_eq!(entries[0].draft.evidence, draft.evidence);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let queue = PendingQueue::open_in_memory().await;
        let id = queue.enqueue(&sample_draft()).await.unwrap();

        queue.remove(id).await;
        assert_eq!(queue.depth().await, 0);

        // Absent id: no-op, no panic.
        queue.remove(id).await;
        queue.remove(LocalId(9999)).await;
        assert_eq!(queue.depth().await, 0);
    }

    #[tokio::test]
    async fn unavailable_queue_degrades_silently() {
        let queue = PendingQueue::unavailable();
        assert_eq!(queue.availability(), QueueAvailability::Unavailable);

        assert!(queue.enqueue(&sample_draft()).await.is_none());
        assert!(queue.list_all().await.is_empty());
        assert_eq!(queue.depth().await, 0);
        queue.remove(LocalId(1)).await;
    }

    #[tokio::test]
    async fn unopenable_path_yields_unavailable_queue() {
        let queue = PendingQueue::open(Path::new("/dev/null/vigia/queue.db")).await;
        assert_eq!(queue.availability(), QueueAvailability::Unavailable);
        assert!(queue.enqueue(&sample_draft()).await.is_none());
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");

        let draft = sample_draft();
        {
            let queue = PendingQueue::open(&path).await;
            queue.enqueue(&draft).await.unwrap();
        }

        let reopened = PendingQueue::open(&path).await;
        let entries = reopened.list_all().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].draft.venue_id, draft.venue_id);
        assert_eq!(entries[0].draft.evidence, draft.evidence);
    }
}
