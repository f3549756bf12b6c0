// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard that reports a connection's end
//! to the hub exactly once.

use crate::core::hub::HubEvent;
use crate::core::state::ConnectionId;
use tokio::sync::mpsc;
use tracing::debug;

/// Sends `HubEvent::Closed` when the reader task's scope is exited, whether it
/// returned normally, failed, or was aborted.
pub struct ConnectionGuard {
    pub(crate) id: ConnectionId,
    pub(crate) events: mpsc::UnboundedSender<HubEvent>,
    /// Set when the hub already knows the connection is gone.
    pub(crate) dismissed: bool,
}

impl ConnectionGuard {
    pub(crate) fn new(id: ConnectionId, events: mpsc::UnboundedSender<HubEvent>) -> Self {
        Self {
            id,
            events,
            dismissed: false,
        }
    }

    /// Skips the `Closed` report in this guard's `Drop` implementation.
    pub(crate) fn dismiss(&mut self) {
        self.dismissed = true;
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.dismissed {
            debug!(
                "ConnectionGuard for connection {} dropped after the hub closed it.",
                self.id
            );
            return;
        }
        debug!("ConnectionGuard reporting connection {} closed", self.id);
        // The hub may already be gone during shutdown.
        let _ = self.events.send(HubEvent::Closed { id: self.id });
    }
}
