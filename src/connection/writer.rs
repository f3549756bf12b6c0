// src/connection/writer.rs

//! The writer task: the only code that writes to a connection.
//!
//! Text messages and streaming transfers leave in the order they were queued,
//! so a chat line can never land inside a framed file body.

use crate::core::hub::Outbound;
use crate::core::state::ConnectionId;
use crate::core::transfer;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Drains `outbox` until every sender is dropped or a write fails, then shuts
/// the write half down.
pub async fn run<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut outbox: mpsc::UnboundedReceiver<Outbound>,
    id: ConnectionId,
) {
    while let Some(item) = outbox.recv().await {
        match item {
            Outbound::Text(frame) => {
                if let Err(e) = writer.write_all(&frame).await {
                    debug!("Write to connection {} failed: {}", id, e);
                    break;
                }
            }
            Outbound::File(job) => {
                let name = job.name.clone();
                match transfer::stream_file(&mut writer, job).await {
                    Ok(sent) => info!("Streamed '{}' to connection {} ({} bytes)", name, id, sent),
                    Err(e) if e.is_partial() => {
                        // The frame is broken, so nothing more can be written safely.
                        warn!("Streaming '{}' to connection {} aborted: {}", name, id, e);
                        break;
                    }
                    Err(e) => warn!("Could not stream '{}' to connection {}: {}", name, id, e),
                }
            }
        }
    }
    let _ = writer.shutdown().await;
    debug!("Writer for connection {} finished", id);
}
