// src/core/transfer.rs

//! The file transfer engine: the shared-directory listing, the streaming
//! sender that frames a file onto the requester's own connection, and the
//! datagram sender that sprays a file at a client-declared UDP port.

use crate::core::protocol;
use crate::core::state::TransferMarker;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UdpSocket;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum TransferError {
    /// Failed before anything was put on the wire.
    #[error("file unavailable: {0}")]
    Unavailable(io::Error),

    /// Failed after the header went out. The receiver sees a short transfer.
    #[error("transfer aborted: {0}")]
    Aborted(io::Error),
}

impl TransferError {
    /// True if the peer may have seen part of the transfer.
    pub fn is_partial(&self) -> bool {
        matches!(self, TransferError::Aborted(_))
    }
}

/// A streaming transfer queued on a connection's outbox.
///
/// The marker travels with the job, so the guard is released exactly when the
/// job finishes or is dropped unexecuted.
#[derive(Debug)]
pub struct StreamJob {
    pub name: String,
    pub path: PathBuf,
    pub chunk_size: usize,
    pub marker: TransferMarker,
}

/// Resolves a requested name against the shared directory.
///
/// The name is joined as given; no traversal filtering is applied.
pub fn resolve_shared_file(shared_dir: &Path, filename: &str) -> Option<(PathBuf, u64)> {
    let path = shared_dir.join(filename);
    let metadata = std::fs::metadata(&path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    Some((path, metadata.len()))
}

/// Lists the regular files in the shared directory, sorted lexicographically.
pub fn list_shared_files(shared_dir: &Path) -> io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(shared_dir)? {
        let entry = entry?;
        // Follow symlinks, like a plain `is_file` check on the path would.
        let is_file = std::fs::metadata(entry.path())
            .map(|m| m.is_file())
            .unwrap_or(false);
        if is_file {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    files.sort();
    Ok(files)
}

/// Reads until `buf` is full or the reader is exhausted. Returns the bytes read.
async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Writes `FILE <name> <size>\n` followed by exactly `size` bytes of the file.
///
/// `size` is the file's length when it is opened. Returns the body bytes sent.
pub async fn stream_file<W: AsyncWrite + Unpin>(
    writer: &mut W,
    job: StreamJob,
) -> Result<u64, TransferError> {
    let StreamJob {
        name,
        path,
        chunk_size,
        marker,
    } = job;

    let file = File::open(&path).await.map_err(TransferError::Unavailable)?;
    let size = file
        .metadata()
        .await
        .map_err(TransferError::Unavailable)?
        .len();

    info!(
        "Streaming '{}' ({} bytes) to connection {}",
        name,
        size,
        marker.connection_id()
    );
    writer
        .write_all(protocol::stream_header(&name, size).as_bytes())
        .await
        .map_err(TransferError::Aborted)?;

    let mut body = file.take(size);
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut sent = 0u64;
    while sent < size {
        let n = read_chunk(&mut body, &mut buf)
            .await
            .map_err(TransferError::Aborted)?;
        if n == 0 {
            return Err(TransferError::Aborted(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shrank during transfer",
            )));
        }
        writer
            .write_all(&buf[..n])
            .await
            .map_err(TransferError::Aborted)?;
        sent += n as u64;
    }
    writer.flush().await.map_err(TransferError::Aborted)?;

    drop(marker);
    Ok(sent)
}

/// Sends the file as a sequence of `chunk_size` datagrams to `target`.
///
/// No acknowledgement, ordering, or retransmission. Returns the bytes sent.
pub async fn send_datagrams(
    target: SocketAddr,
    path: PathBuf,
    chunk_size: usize,
) -> Result<u64, TransferError> {
    let local: SocketAddr = if target.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local)
        .await
        .map_err(TransferError::Unavailable)?;
    let mut file = File::open(&path).await.map_err(TransferError::Unavailable)?;

    let mut buf = vec![0u8; chunk_size.clamp(1, protocol::MAX_DATAGRAM_SIZE)];
    let mut sent = 0u64;
    loop {
        let n = read_chunk(&mut file, &mut buf)
            .await
            .map_err(TransferError::Aborted)?;
        if n == 0 {
            break;
        }
        socket
            .send_to(&buf[..n], target)
            .await
            .map_err(TransferError::Aborted)?;
        sent += n as u64;
    }
    debug!("Sent {} bytes of {} to {}", sent, path.display(), target);
    Ok(sent)
}
