// src/server/initialization.rs

//! Handles server initialization: checking the shared directory, binding the
//! listener, and building the hub.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::hub::Hub;
use crate::core::state::TransferGuard;
use crate::core::transfer;
use anyhow::{Context, Result, bail};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Binds the configured address and builds the server context.
pub async fn setup(config: Config) -> Result<ServerContext> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    setup_with_listener(config, listener)
}

/// Builds the server context around an already-bound listener.
pub fn setup_with_listener(config: Config, listener: TcpListener) -> Result<ServerContext> {
    check_shared_dir(&config)?;

    match listener.local_addr() {
        Ok(addr) => info!("Chat server listening on {}", addr),
        Err(e) => warn!("Listening on an unknown address: {}", e),
    }

    let (shutdown_tx, _) = broadcast::channel(1);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let hub = Hub::new(
        config.shared_dir.clone(),
        config.chunk_size,
        TransferGuard::new(),
    );

    Ok(ServerContext {
        config,
        listener,
        hub,
        events_tx,
        events_rx,
        shutdown_tx,
    })
}

fn check_shared_dir(config: &Config) -> Result<()> {
    let dir = &config.shared_dir;
    if !dir.is_dir() {
        bail!("Shared directory '{}' does not exist", dir.display());
    }
    match transfer::list_shared_files(dir) {
        Ok(files) => info!(
            "Serving {} shared file(s) from '{}'",
            files.len(),
            dir.display()
        ),
        Err(e) => warn!("Shared directory '{}' is not readable: {}", dir.display(), e),
    }
    Ok(())
}
