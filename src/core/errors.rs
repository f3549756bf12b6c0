// src/core/errors.rs

//! Defines the error type for everything a chat session can be told "no" about.

use thiserror::Error;

/// The main error enum for the chat core.
///
/// The `Display` output of each variant is the exact notice text a client sees,
/// minus the `[server]` tag added by [`ChatError::notice`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    // --- Protocol usage errors ---
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("{0} is not a valid command\nplease use /help for a list of valid commands")]
    UnknownCommand(String),

    // --- Not-found errors ---
    #[error("User [{0}] not found")]
    UserNotFound(String),

    #[error("Not a member of [{0}]")]
    NotAMember(String),

    #[error("File not found")]
    FileNotFound,

    #[error("No shared files available")]
    NoSharedFiles,

    #[error("Protocol must be tcp or udp")]
    InvalidProtocol,

    // --- State conflicts ---
    #[error("Username already taken")]
    UsernameTaken,

    #[error("Connection is already registered")]
    AlreadyRegistered,

    #[error("Already in [{0}]")]
    AlreadyInGroup(String),

    #[error("File transfer already in progress")]
    TransferInProgress,
}

impl ChatError {
    /// Renders the error as the notice line sent back to the issuing connection.
    pub fn notice(&self) -> String {
        format!("{} {self}", crate::core::protocol::SERVER_TAG)
    }
}
