//! Live channel connection state
//!
//! Tracks the `disconnected -> connecting -> connected -> authorized` lifecycle
//! and the epoch of the current transport.

use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Transport up, `authorize` sent, events not yet trusted
    Connected,
    Authorized,
}

/// Connection lifecycle for one client, published to observers
#[derive(Debug)]
pub struct ConnectionTracker {
    state: ConnectionState,
    /// Identifies the current transport; `None` while disconnected
    epoch: Option<Uuid>,
    epochs_authorized: u64,
    publisher: watch::Sender<ConnectionState>,
}

impl ConnectionTracker {
    pub fn new() -> (Self, watch::Receiver<ConnectionState>) {
        let (publisher, receiver) = watch::channel(ConnectionState::Disconnected);
        (
            Self {
                state: ConnectionState::Disconnected,
                epoch: None,
                epochs_authorized: 0,
                publisher,
            },
            receiver,
        )
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn epoch(&self) -> Option<Uuid> {
        self.epoch
    }

    /// Number of epochs that completed the authorization handshake
    pub fn epochs_authorized(&self) -> u64 {
        self.epochs_authorized
    }

    pub fn begin_connect(&mut self) {
        self.set(ConnectionState::Connecting);
    }

    /// Transport established; starts a new epoch
    pub fn established(&mut self) -> Uuid {
        let epoch = Uuid::new_v4();
        self.epoch = Some(epoch);
        self.set(ConnectionState::Connected);
        epoch
    }

    /// Server acknowledged `authorize`.
    ///
    /// Only valid from `Connected`; returns false (and changes nothing) for a
    /// duplicate or out-of-place acknowledgement.
    pub fn authorized(&mut self) -> bool {
        if self.state != ConnectionState::Connected {
            return false;
        }
        self.epochs_authorized += 1;
        self.set(ConnectionState::Authorized);
        true
    }

    /// Transport lost from any state
    pub fn lost(&mut self) {
        self.epoch = None;
        self.set(ConnectionState::Disconnected);
    }

    /// Content events are applied only within an authorized epoch
    pub fn accepts_events(&self) -> bool {
        self.state == ConnectionState::Authorized
    }

    fn set(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, epoch = ?self.epoch, "Connection state changed");
        }
        self.state = state;
        // No observers left is fine; the tracker still drives the client
        let _ = self.publisher.send(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let (mut tracker, observer) = ConnectionTracker::new();
        assert_eq!(tracker.state(), ConnectionState::Disconnected);

        tracker.begin_connect();
        assert_eq!(*observer.borrow(), ConnectionState::Connecting);

        let epoch = tracker.established();
        assert_eq!(tracker.epoch(), Some(epoch));
        assert!(!tracker.accepts_events());

        assert!(tracker.authorized());
        assert!(tracker.accepts_events());
        assert_eq!(*observer.borrow(), ConnectionState::Authorized);

        tracker.lost();
        assert_eq!(tracker.state(), ConnectionState::Disconnected);
        assert_eq!(tracker.epoch(), None);
        assert!(!tracker.accepts_events());
    }

    #[test]
    fn test_authorized_requires_connected() {
        let (mut tracker, _observer) = ConnectionTracker::new();
        assert!(!tracker.authorized());

        tracker.begin_connect();
        assert!(!tracker.authorized());

        tracker.established();
        assert!(tracker.authorized());
        // Duplicate acknowledgement within the same epoch
        assert!(!tracker.authorized());
        assert_eq!(tracker.epochs_authorized(), 1);
    }

    #[test]
    fn test_reconnect_resets_authorization() {
        let (mut tracker, _observer) = ConnectionTracker::new();
        tracker.begin_connect();
        let first = tracker.established();
        tracker.authorized();
        tracker.lost();

        tracker.begin_connect();
        let second = tracker.established();
        assert_ne!(first, second);
        assert!(!tracker.accepts_events());

        assert!(tracker.authorized());
        assert_eq!(tracker.epochs_authorized(), 2);
    }
}
