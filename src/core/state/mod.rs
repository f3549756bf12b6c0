// src/core/state/mod.rs

//! Registries that describe who is connected, who is in which group, and who
//! currently has a file transfer in flight.

mod groups;
mod sessions;
mod transfers;

pub use groups::GroupRegistry;
pub use sessions::SessionRegistry;
pub use transfers::{TransferGuard, TransferMarker};

/// Identity key for a live connection. Assigned once on accept, never reused.
pub type ConnectionId = u64;
