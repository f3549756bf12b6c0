// src/core/state/transfers.rs

//! The transfer guard: at most one in-flight download per connection.

use super::ConnectionId;
use crate::core::ChatError;
use dashmap::DashSet;
use std::sync::Arc;
use tracing::debug;

/// The set of connections with a transfer in progress.
///
/// Shared between the multiplexer, which sets markers on request, and the
/// tasks that run transfers, which clear them when done.
#[derive(Debug, Clone, Default)]
pub struct TransferGuard {
    active: Arc<DashSet<ConnectionId>>,
}

impl TransferGuard {
    pub fn new() -> Self {
        Default::default()
    }

    /// Atomically sets the marker for `id` if it is not already set.
    pub fn try_begin(&self, id: ConnectionId) -> Result<TransferMarker, ChatError> {
        if !self.active.insert(id) {
            return Err(ChatError::TransferInProgress);
        }
        debug!("Transfer marker set for connection {}", id);
        Ok(TransferMarker {
            active: self.active.clone(),
            id,
        })
    }

    pub fn is_active(&self, id: ConnectionId) -> bool {
        self.active.contains(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

/// An RAII marker for one in-flight transfer. Dropping it clears the marker,
/// whether the transfer finished, failed, or its task was torn down.
#[derive(Debug)]
pub struct TransferMarker {
    active: Arc<DashSet<ConnectionId>>,
    id: ConnectionId,
}

impl TransferMarker {
    pub fn connection_id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for TransferMarker {
    fn drop(&mut self) {
        self.active.remove(&self.id);
        debug!("Transfer marker cleared for connection {}", self.id);
    }
}
