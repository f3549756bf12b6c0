// src/server/connection_loop.rs

//! Contains the connection multiplexer: accepts connections, routes reader
//! events into the hub, and handles graceful shutdown.

use super::context::ServerContext;
use crate::connection::{ReaderContext, run_reader, run_writer};
use crate::core::state::ConnectionId;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How long shutdown waits for writers to flush before aborting them.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// The main server loop. Runs until `shutdown` resolves.
pub async fn run(mut ctx: ServerContext, shutdown: impl Future<Output = ()>) {
    let mut connection_id_counter: ConnectionId = 0;
    let mut connection_tasks = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Shutdown wins, then pending hub events, then new connections.
            biased;

            _ = &mut shutdown => {
                info!("Shutdown requested.");
                break;
            }

            // Every registry mutation happens here, on this task.
            Some(event) = ctx.events_rx.recv() => {
                ctx.hub.handle_event(event);
            }

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        info!("Accepted new connection from: {}", addr);
                        connection_id_counter = connection_id_counter.wrapping_add(1);
                        spawn_connection(&mut ctx, &mut connection_tasks, socket, addr, connection_id_counter);
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            }

            // Reap finished reader and writer tasks.
            Some(res) = connection_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A connection task panicked: {e:?}");
                }
            }
        }
    }

    // --- Graceful shutdown ---
    info!("Shutting down. Sending signal to all connections.");
    if ctx.shutdown_tx.send(()).is_err() {
        debug!("No reader tasks were listening for the shutdown signal.");
    }
    ctx.hub.shutdown();

    // Writers drain what is queued and exit once their outboxes close.
    if tokio::time::timeout(DRAIN_TIMEOUT, async {
        while connection_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for connections to drain. Aborting the rest.");
        connection_tasks.shutdown().await;
    }
    info!("Server shutdown complete.");
}

/// Registers a new connection with the hub and spawns its reader and writer.
fn spawn_connection(
    ctx: &mut ServerContext,
    tasks: &mut JoinSet<()>,
    socket: TcpStream,
    addr: SocketAddr,
    id: ConnectionId,
) {
    if let Err(e) = socket.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
    }
    let (read_half, write_half) = socket.into_split();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    // The connection stays unregistered until its first line arrives.
    let kill_rx = ctx.hub.attach(id, addr, outbox_tx);

    let reader_ctx = ReaderContext {
        id,
        events: ctx.events_tx.clone(),
        kill_rx,
        shutdown_rx: ctx.shutdown_tx.subscribe(),
        read_unit: ctx.config.read_unit,
    };
    tasks.spawn(run_reader(read_half, reader_ctx));
    tasks.spawn(run_writer(write_half, outbox_rx, id));
}
