// src/core/protocol/frame.rs

//! Implements the client-side framing decoder that separates chat lines from
//! the binary file transfers the server embeds in the same byte stream.

use super::{FILE_PREFIX, FILE_UDP_PREFIX, parse_name_and_size};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::codec::Decoder;

/// Upper bound for a single text line, protecting the client from a peer that
/// never sends a newline.
const MAX_LINE_LEN: usize = 64 * 1024;

/// A single unit decoded from the server's byte stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// A plain chat or control line, without its newline.
    Text(String),
    /// A streaming transfer header. Exactly `size` bytes of body follow.
    FileStart { name: String, size: u64 },
    /// A slice of the streaming transfer body.
    FileChunk(Bytes),
    /// The body of the current streaming transfer has been fully consumed.
    FileEnd,
    /// A datagram transfer notice. The body arrives on a separate datagram endpoint.
    DatagramNotice { name: String, size: u64 },
}

#[derive(Error, Debug, Clone)]
pub enum FrameError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("line exceeds {MAX_LINE_LEN} bytes without a newline")]
    LineTooLong,

    #[error("connection closed with {remaining} bytes of the transfer outstanding")]
    Truncated { remaining: u64 },
}

impl From<std::io::Error> for FrameError {
    fn from(e: std::io::Error) -> Self {
        FrameError::Io(Arc::new(e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    AwaitingHeader,
    AwaitingBody { remaining: u64 },
}

/// A `tokio_util::codec` decoder for the server-to-client stream.
///
/// Text is newline-delimited. A `FILE <name> <size>` line switches the decoder
/// into body mode, where exactly `size` raw bytes are handed out as
/// [`ServerFrame::FileChunk`]s regardless of how the transport splits them, and
/// any bytes past the body stay buffered for the next line.
#[derive(Debug)]
pub struct TransferCodec {
    state: DecodeState,
    /// Offset up to which the buffer is known to hold no newline.
    next_index: usize,
}

impl TransferCodec {
    pub fn new() -> Self {
        Self {
            state: DecodeState::AwaitingHeader,
            next_index: 0,
        }
    }

    /// Returns true while a streaming transfer body is being consumed.
    pub fn in_transfer(&self) -> bool {
        matches!(self.state, DecodeState::AwaitingBody { .. })
    }

    fn classify(&mut self, line: String) -> ServerFrame {
        if let Some(rest) = line.strip_prefix(FILE_UDP_PREFIX)
            && let Some((name, size)) = parse_name_and_size(rest)
        {
            return ServerFrame::DatagramNotice { name, size };
        }
        if let Some(rest) = line.strip_prefix(FILE_PREFIX)
            && let Some((name, size)) = parse_name_and_size(rest)
        {
            self.state = DecodeState::AwaitingBody { remaining: size };
            return ServerFrame::FileStart { name, size };
        }
        // A line that merely looks like a header is shown as chat.
        ServerFrame::Text(line)
    }

    fn take_line(&mut self, src: &mut BytesMut, end: usize) -> String {
        let raw = src.split_to(end);
        self.next_index = 0;
        let mut content: &[u8] = &raw;
        if let Some(stripped) = content.strip_suffix(b"\n") {
            content = stripped;
        }
        if let Some(stripped) = content.strip_suffix(b"\r") {
            content = stripped;
        }
        String::from_utf8_lossy(content).into_owned()
    }
}

impl Default for TransferCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for TransferCodec {
    type Item = ServerFrame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.state {
            DecodeState::AwaitingBody { remaining: 0 } => {
                self.state = DecodeState::AwaitingHeader;
                Ok(Some(ServerFrame::FileEnd))
            }
            DecodeState::AwaitingBody { remaining } => {
                if src.is_empty() {
                    return Ok(None);
                }
                let take = remaining.min(src.len() as u64) as usize;
                let chunk = src.split_to(take).freeze();
                self.state = DecodeState::AwaitingBody {
                    remaining: remaining - take as u64,
                };
                Ok(Some(ServerFrame::FileChunk(chunk)))
            }
            DecodeState::AwaitingHeader => {
                let newline = src[self.next_index..].iter().position(|b| *b == b'\n');
                match newline {
                    Some(offset) => {
                        let end = self.next_index + offset + 1;
                        let line = self.take_line(src, end);
                        Ok(Some(self.classify(line)))
                    }
                    None if src.len() > MAX_LINE_LEN => Err(FrameError::LineTooLong),
                    None => {
                        self.next_index = src.len();
                        Ok(None)
                    }
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        match self.state {
            DecodeState::AwaitingBody { remaining } => Err(FrameError::Truncated { remaining }),
            DecodeState::AwaitingHeader if src.is_empty() => Ok(None),
            DecodeState::AwaitingHeader => {
                // The peer closed after an unterminated line.
                let end = src.len();
                let line = self.take_line(src, end);
                Ok(Some(self.classify(line)))
            }
        }
    }
}
