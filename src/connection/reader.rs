// src/connection/reader.rs

//! The reader task: performs bounded reads on a connection and forwards each
//! unit to the multiplexer.

use super::guard::ConnectionGuard;
use crate::core::hub::HubEvent;
use crate::core::state::ConnectionId;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

pub struct ReaderContext {
    pub id: ConnectionId,
    pub events: mpsc::UnboundedSender<HubEvent>,
    /// Fires when the hub closes this connection.
    pub kill_rx: oneshot::Receiver<()>,
    pub shutdown_rx: broadcast::Receiver<()>,
    /// Bytes requested per read call.
    pub read_unit: usize,
}

/// Reads until EOF, a read error, a hub close, or server shutdown.
///
/// EOF and read errors are both reported to the hub as `Closed`.
pub async fn run<R: AsyncRead + Unpin>(mut reader: R, ctx: ReaderContext) {
    let ReaderContext {
        id,
        events,
        mut kill_rx,
        mut shutdown_rx,
        read_unit,
    } = ctx;
    let mut guard = ConnectionGuard::new(id, events.clone());
    let mut buf = vec![0u8; read_unit];

    loop {
        tokio::select! {
            biased;

            _ = &mut kill_rx => {
                debug!("Reader for connection {} stopped by the hub", id);
                guard.dismiss();
                return;
            }
            _ = shutdown_rx.recv() => {
                debug!("Reader for connection {} stopped by shutdown", id);
                guard.dismiss();
                return;
            }
            res = reader.read(&mut buf) => {
                match res {
                    Ok(0) => {
                        debug!("Connection {} reached EOF", id);
                        return;
                    }
                    Ok(n) => {
                        let data = Bytes::copy_from_slice(&buf[..n]);
                        if events.send(HubEvent::Data { id, data }).is_err() {
                            guard.dismiss();
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Read error on connection {}: {}", id, e);
                        return;
                    }
                }
            }
        }
    }
}
