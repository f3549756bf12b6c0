// src/client/downloads.rs

//! Writes downloaded files under `<downloads>/<username>/`.
//!
//! File names from the server are joined as given.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Receive buffer for one datagram; larger than any chunk the server sends.
const DATAGRAM_BUFFER: usize = 64 * 1024;

#[derive(Debug)]
struct ActiveDownload {
    name: String,
    size: u64,
    written: u64,
    /// `None` once a disk error occurred. The body is still consumed.
    file: Option<File>,
    error: Option<io::Error>,
}

/// The result of a finished streaming download.
#[derive(Debug)]
pub struct Finished {
    pub name: String,
    pub size: u64,
    pub path: PathBuf,
    pub error: Option<io::Error>,
}

/// Collects the body of streaming transfers as the decoder hands it out.
#[derive(Debug)]
pub struct DownloadSink {
    dir: PathBuf,
    active: Option<ActiveDownload>,
}

impl DownloadSink {
    /// Downloads for `username` land in `<root>/<username>/`.
    pub fn new(root: &Path, username: &str) -> Self {
        Self {
            dir: root.join(username),
            active: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Opens the destination for a new transfer.
    pub async fn begin(&mut self, name: &str, size: u64) {
        let path = self.path_for(name);
        let (file, error) = match create_file(&path).await {
            Ok(file) => (Some(file), None),
            Err(e) => {
                warn!("Cannot create {}: {}", path.display(), e);
                (None, Some(e))
            }
        };
        self.active = Some(ActiveDownload {
            name: name.to_string(),
            size,
            written: 0,
            file,
            error,
        });
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) {
        let Some(active) = self.active.as_mut() else {
            debug!("Dropping {} bytes outside of a transfer", chunk.len());
            return;
        };
        active.written += chunk.len() as u64;
        if let Some(file) = active.file.as_mut()
            && let Err(e) = file.write_all(chunk).await
        {
            warn!("Write to download '{}' failed: {}", active.name, e);
            active.file = None;
            active.error = Some(e);
        }
    }

    /// Flushes and closes the current transfer.
    pub async fn finish(&mut self) -> Option<Finished> {
        let mut active = self.active.take()?;
        if let Some(mut file) = active.file.take()
            && let Err(e) = file.flush().await
        {
            active.error = Some(e);
        }
        Some(Finished {
            path: self.path_for(&active.name),
            name: active.name,
            size: active.written.min(active.size),
            error: active.error,
        })
    }

    pub fn in_progress(&self) -> bool {
        self.active.is_some()
    }
}

async fn create_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    File::create(path).await
}

/// Receives datagrams on `socket` and appends them to `path` in arrival order
/// until `size` bytes have been written. The socket is released afterwards.
pub async fn receive_datagrams(socket: UdpSocket, path: &Path, size: u64) -> io::Result<u64> {
    let mut file = create_file(path).await?;
    let mut buf = vec![0u8; DATAGRAM_BUFFER];
    let mut received = 0u64;
    while received < size {
        let (n, from) = socket.recv_from(&mut buf).await?;
        let take = (n as u64).min(size - received) as usize;
        file.write_all(&buf[..take]).await?;
        received += take as u64;
        debug!("Datagram of {} bytes from {} ({}/{})", n, from, received, size);
    }
    file.flush().await?;
    Ok(received)
}
