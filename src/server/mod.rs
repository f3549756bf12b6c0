// src/server/mod.rs

use crate::config::Config;
use anyhow::{Context, Result};
use std::future::Future;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

mod connection_loop;
mod context;
mod initialization;

pub use context::ServerContext;

/// The main server startup function: binds the configured port and serves
/// until SIGINT or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    let shutdown = shutdown_signal()?;
    let server_context = initialization::setup(config).await?;
    connection_loop::run(server_context, shutdown).await;
    Ok(())
}

/// Serves on an already-bound listener until `shutdown` resolves.
pub async fn run_with_listener(
    config: Config,
    listener: TcpListener,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let server_context = initialization::setup_with_listener(config, listener)?;
    connection_loop::run(server_context, shutdown).await;
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
        }
    })
}
