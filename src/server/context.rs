// src/server/context.rs

use crate::config::Config;
use crate::core::hub::{Hub, HubEvent};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

/// Holds all the initialized state required to run the server's main loop.
pub struct ServerContext {
    pub config: Config,
    pub listener: TcpListener,
    pub hub: Hub,
    /// Cloned into every reader task.
    pub events_tx: mpsc::UnboundedSender<HubEvent>,
    pub events_rx: mpsc::UnboundedReceiver<HubEvent>,
    pub shutdown_tx: broadcast::Sender<()>,
}
