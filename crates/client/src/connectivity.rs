//! Online/offline state tracking.

use tokio::sync::watch;

use vigia_remote::RemoteStore;

use crate::types::ConnectivityState;

/// Tracks the client's connectivity flag and publishes transitions.
///
/// This is a passive listener: the flag is flipped by whoever observes the
/// platform signal (the sync worker's periodic probe, or an embedding shell
/// forwarding online/offline events). Subscribers are only woken on actual
/// transitions, never on redundant sets.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<ConnectivityState>,
}

impl ConnectivityMonitor {
    pub fn new(initial: ConnectivityState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    /// Build a monitor seeded from the remote store's current reachability.
    pub async fn probe<S: RemoteStore>(store: &S) -> Self {
        let initial = if store.health_check().await {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        };
        tracing::info!(?initial, "connectivity monitor started");
        Self::new(initial)
    }

    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    /// Cheap flag consulted by the submitter to pick the submit-vs-enqueue
    /// path without polling the network itself.
    pub fn is_online(&self) -> bool {
        self.state() == ConnectivityState::Online
    }

    /// Mark the client online; returns true when this was a transition.
    pub fn set_online(&self) -> bool {
        self.transition(ConnectivityState::Online)
    }

    /// Mark the client offline; returns true when this was a transition.
    pub fn set_offline(&self) -> bool {
        self.transition(ConnectivityState::Offline)
    }

    fn transition(&self, next: ConnectivityState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::info!(state = ?next, "connectivity transition");
        }
        changed
    }

    /// Subscribe to transitions (used by the sync worker to trigger an
    /// immediate pass when the client comes back online).
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundant_sets_do_not_notify() {
        let monitor = ConnectivityMonitor::new(ConnectivityState::Online);
        let rx = monitor.subscribe();

        assert!(!monitor.set_online());
        assert!(!rx.has_changed().unwrap());

        assert!(monitor.set_offline());
        assert!(rx.has_changed().unwrap());
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn transition_wakes_subscribers() {
        let monitor = ConnectivityMonitor::new(ConnectivityState::Offline);
        let mut rx = monitor.subscribe();

        monitor.set_online();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectivityState::Online);
    }

    #[tokio::test]
    async fn probe_seeds_from_reachability() {
        let store = vigia_remote::InMemoryStore::new();
        let monitor = ConnectivityMonitor::probe(&store).await;
        assert!(monitor.is_online());

        store.set_healthy(false);
        let monitor = ConnectivityMonitor::probe(&store).await;
        assert!(!monitor.is_online());
    }
}
