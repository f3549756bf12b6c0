// src/core/protocol/mod.rs

//! Wire constants and the text formats shared by the server and the client.

pub mod frame;
pub use frame::{FrameError, ServerFrame, TransferCodec};

use bytes::Bytes;

/// Bytes requested per receive call on either side of a connection.
pub const READ_UNIT: usize = 1024;

/// Size of a file chunk on the stream and of a datagram on the datagram channel.
pub const CHUNK_SIZE: usize = 4096;

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Leading token of a streaming transfer header.
pub const FILE_PREFIX: &str = "FILE ";

/// Leading token of a datagram transfer notice.
pub const FILE_UDP_PREFIX: &str = "FILE_UDP ";

/// Tag placed in front of every notice that originates from the server itself.
pub const SERVER_TAG: &str = "[server]";

pub const HELP_TEXT: &str = "[server] here is a list of valid commands:
/msg <username> <message> - Privately messages the user
/quit - Exits the chat
/join <groupname> - Joins a group if it exists if not creates it
/leave <groupname> - Leaves a group if you're in it
/group <groupname> <message> - Sends a message to everyone in the specified group if you're a member of it
/files - Lists all the files in the shared space available for download
/get <filename> - Downloads the specified file to a personal folder (by default using TCP)
/protocol <tcp|udp> - Changes the download protocol to either TCP or UDP";

/// Header line that opens a streaming transfer. Includes the trailing newline.
pub fn stream_header(name: &str, size: u64) -> String {
    format!("{FILE_PREFIX}{name} {size}\n")
}

/// Notice announcing a datagram transfer. Excludes the trailing newline.
pub fn datagram_notice(name: &str, size: u64) -> String {
    format!("{FILE_UDP_PREFIX}{name} {size}")
}

/// Terminates a text message with a newline so the receiving decoder can delimit it.
pub fn text_frame(message: &str) -> Bytes {
    let mut line = String::with_capacity(message.len() + 1);
    line.push_str(message);
    line.push('\n');
    Bytes::from(line)
}

/// Splits `<name> <size>` as it follows one of the transfer prefixes.
///
/// The size is taken from the last space so that the name is whatever precedes it.
pub(crate) fn parse_name_and_size(rest: &str) -> Option<(String, u64)> {
    let (name, size) = rest.trim_end().rsplit_once(' ')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let size = size.parse::<u64>().ok()?;
    Some((name.to_string(), size))
}
