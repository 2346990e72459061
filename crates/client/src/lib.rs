//! `vigia-client` — offline-capable report submission pipeline.
//!
//! **Responsibility:** accept reports from the submission UI and guarantee
//! they reach the remote store exactly once, whatever the connectivity:
//! - Durable local queue of pending reports (SQLite, survives restarts)
//! - Connectivity monitoring with transition-triggered and scheduled sync
//! - Direct submission with queue-as-backup fallback
//! - Sequential, fail-fast queue replay with purge of terminally-invalid
//!   entries
//! - Read-only sync status surface for the UI
//!
//! The remote store is an external collaborator (`vigia-remote`); dashboard
//! aggregates are eventually consistent and never see queued-but-unsynced
//! reports.

pub mod config;
pub mod connectivity;
pub mod queue;
pub mod status;
pub mod submitter;
pub mod sync;
pub mod types;
pub mod worker;


pub use config::ClientConfig;
pub use connectivity::ConnectivityMonitor;
pub use queue::PendingQueue;
pub use status::{IndicatorView, StatusIndicator};
pub use submitter::{ReportSubmitter, SubmitFailure, SubmitOutcome};
pub use sync::{PassReport, PassSummary, SkipReason, SyncEngine};
pub use types::{
    ConnectivityState, LocalId, PassStatus, PendingReport, QueueAvailability, ReportDraft,
    SyncSignal,
};
pub use worker::{SyncWorker, SyncWorkerHandle};
