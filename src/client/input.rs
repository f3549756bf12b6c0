// src/client/input.rs

//! The command encoder: turns a line typed by the user into what, if
//! anything, goes on the wire.

use std::fmt;

/// The transport used when `/get <file>` names none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadProtocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for DownloadProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadProtocol::Tcp => write!(f, "tcp"),
            DownloadProtocol::Udp => write!(f, "udp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Send the line as is.
    Send(String),
    /// Send the line, then end the session.
    SendAndExit(String),
    /// Switch the default download transport. Nothing is sent.
    SetProtocol(DownloadProtocol),
    /// Bind a datagram endpoint, then send `/get <filename> udp <port>`.
    RequestDatagram { filename: String },
    /// Blank input.
    Ignore,
}

/// Interprets one line of user input under the current download protocol.
pub fn interpret(line: &str, protocol: DownloadProtocol) -> InputAction {
    let line = line.trim();
    if line.is_empty() {
        return InputAction::Ignore;
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["/protocol", "tcp", ..] => InputAction::SetProtocol(DownloadProtocol::Tcp),
        ["/protocol", "udp", ..] => InputAction::SetProtocol(DownloadProtocol::Udp),
        ["/get", filename] => match protocol {
            DownloadProtocol::Tcp => InputAction::Send(format!("/get {filename} tcp")),
            DownloadProtocol::Udp => InputAction::RequestDatagram {
                filename: filename.to_string(),
            },
        },
        ["/q"] | ["/quit", ..] => InputAction::SendAndExit("/quit".to_string()),
        _ => InputAction::Send(line.to_string()),
    }
}

/// The request sent once a datagram endpoint is bound on `port`.
pub fn datagram_request(filename: &str, port: u16) -> String {
    format!("/get {filename} udp {port}")
}
