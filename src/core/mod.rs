// src/core/mod.rs

//! The central module containing the chat core: registries, the command
//! interpreter, the transfer engine, and the wire protocol.

pub mod commands;
pub mod errors;
pub mod hub;
pub mod protocol;
pub mod state;
pub mod transfer;

pub use commands::Command;
pub use errors::ChatError;
pub use hub::{Hub, HubEvent, Outbound};
pub use protocol::{ServerFrame, TransferCodec};
