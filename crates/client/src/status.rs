//! Read-only sync status surface.

use tokio::sync::watch;

use crate::types::{PassStatus, SyncSignal};

/// Render-ready projection of the sync signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorView {
    pub headline: &'static str,
    pub detail: String,
    pub pending: usize,
    pub status: PassStatus,
}

/// Passive observer of queue depth and last pass outcome.
///
/// Performs no business logic: it re-derives its view from the signal the
/// sync engine publishes, and hides entirely when there is nothing to show.
#[derive(Debug)]
pub struct StatusIndicator {
    signal: watch::Receiver<SyncSignal>,
}

impl StatusIndicator {
    pub fn new(signal: watch::Receiver<SyncSignal>) -> Self {
        Self { signal }
    }

    /// Current view, or `None` when the indicator should be hidden (empty
    /// queue, neutral status).
    pub fn view(&self) -> Option<IndicatorView> {
        let signal = *self.signal.borrow();

        if signal.pending == 0 && signal.status == PassStatus::Idle {
            return None;
        }

        let headline = match signal.status {
            PassStatus::Syncing => "Syncing...",
            PassStatus::Success => "Synced",
            PassStatus::Error => "Sync failed",
            PassStatus::Idle => "Pending data",
        };

        let detail = match signal.status {
            PassStatus::Syncing => "Uploading reports".to_string(),
            PassStatus::Error => "Sync halted; will retry automatically".to_string(),
            _ => format!("{} local records", signal.pending),
        };

        Some(IndicatorView {
            headline,
            detail,
            pending: signal.pending,
            status: signal.status,
        })
    }
}
