// src/core/hub.rs

//! The `Hub` is the command interpreter and session state machine.
//!
//! It is owned by the connection multiplexer task and is the only code that
//! mutates the session and group registries, so neither needs a lock. All
//! output leaves through per-connection outboxes drained by writer tasks; the
//! hub never awaits a peer.

use crate::core::ChatError;
use crate::core::commands::{Command, GetRequest, Transport};
use crate::core::protocol::{self, HELP_TEXT, SERVER_TAG};
use crate::core::state::{ConnectionId, GroupRegistry, SessionRegistry, TransferGuard};
use crate::core::transfer::{self, StreamJob};
use bytes::Bytes;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Events sent from connection reader tasks to the multiplexer.
#[derive(Debug)]
pub enum HubEvent {
    /// One read unit from a connection.
    Data { id: ConnectionId, data: Bytes },
    /// The connection hit EOF or a read error.
    Closed { id: ConnectionId },
}

/// An item queued for a connection's writer task.
#[derive(Debug)]
pub enum Outbound {
    /// A newline-terminated text message.
    Text(Bytes),
    /// A streaming transfer, written in full before the next item.
    File(StreamJob),
}

/// The hub's handle on a live connection.
#[derive(Debug)]
struct Peer {
    addr: SocketAddr,
    outbox: mpsc::UnboundedSender<Outbound>,
    kill: oneshot::Sender<()>,
}

#[derive(Debug)]
pub struct Hub {
    peers: HashMap<ConnectionId, Peer>,
    sessions: SessionRegistry,
    groups: GroupRegistry,
    transfers: TransferGuard,
    shared_dir: PathBuf,
    chunk_size: usize,
}

impl Hub {
    pub fn new(shared_dir: PathBuf, chunk_size: usize, transfers: TransferGuard) -> Self {
        Self {
            peers: HashMap::new(),
            sessions: SessionRegistry::new(),
            groups: GroupRegistry::new(),
            transfers,
            shared_dir,
            chunk_size,
        }
    }

    /// Adds a freshly accepted, unregistered connection.
    ///
    /// The returned receiver fires when the hub closes the connection, telling
    /// its reader task to stop.
    pub fn attach(
        &mut self,
        id: ConnectionId,
        addr: SocketAddr,
        outbox: mpsc::UnboundedSender<Outbound>,
    ) -> oneshot::Receiver<()> {
        let (kill, kill_rx) = oneshot::channel();
        self.peers.insert(id, Peer { addr, outbox, kill });
        debug!("Connection {} from {} attached", id, addr);
        kill_rx
    }

    pub fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Data { id, data } => self.handle_data(id, &data),
            HubEvent::Closed { id } => self.disconnect(id),
        }
    }

    /// Processes one read unit. Each non-blank line is handled in order; the
    /// first line of an unregistered connection is its proposed username.
    pub fn handle_data(&mut self, id: ConnectionId, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        for line in text.split('\n') {
            if !self.peers.contains_key(&id) {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if self.sessions.is_registered(id) {
                self.dispatch(id, line);
            } else {
                self.register(id, line);
            }
        }
    }

    // --- Registration ---

    /// Registers `username` for `id`, or rejects it and closes the connection.
    fn register(&mut self, id: ConnectionId, username: &str) {
        match self.sessions.register(id, username) {
            Ok(()) => {
                info!("Connection {} registered as '{}'", id, username);
                let notice = format!("{SERVER_TAG} [{username}] joined");
                self.cast(self.session_ids(), Some(id), &notice);
            }
            Err(e) => {
                info!("Rejected username '{}' for connection {}: {}", username, id, e);
                self.notify(id, &e.notice());
                self.close(id);
            }
        }
    }

    // --- Command dispatch ---

    /// Runs one line from a registered session. Failures become a notice to
    /// the sender only.
    fn dispatch(&mut self, id: ConnectionId, line: &str) {
        // A running transfer is reported before any /get argument error.
        if Command::is_get(line) && self.transfers.is_active(id) {
            self.notify(id, &ChatError::TransferInProgress.notice());
            return;
        }

        let result = Command::parse(line).and_then(|command| {
            debug!("Connection {} issued {}", id, command.name());
            self.execute(id, command)
        });
        if let Err(e) = result {
            debug!("Command from connection {} failed: {}", id, e);
            self.notify(id, &e.notice());
        }
    }

    fn execute(&mut self, id: ConnectionId, command: Command) -> Result<(), ChatError> {
        let username = self.sessions.username(id).unwrap_or_default().to_string();
        match command {
            Command::Quit => {
                info!("'{}' quit", username);
                self.end_session(id, "left");
            }
            // Unknown recipients are an error for the sender alone.
            Command::Msg { to, text } => {
                let target = self
                    .sessions
                    .lookup(&to)
                    .ok_or(ChatError::UserNotFound(to))?;
                self.notify(target, &format!("[private] {username}> {text}"));
            }
            Command::Join { group } => {
                self.groups.join(&group, id)?;
                let notice = format!("{SERVER_TAG} [{username}] joined [{group}]");
                self.cast(self.group_ids(&group), Some(id), &notice);
            }
            Command::Leave { group } => {
                self.groups.leave(&group, id)?;
                let notice = format!("{SERVER_TAG} [{username}] left [{group}]");
                self.cast(self.group_ids(&group), Some(id), &notice);
            }
            Command::Group { group, text } => {
                if !self.groups.is_member(&group, id) {
                    return Err(ChatError::NotAMember(group));
                }
                let message = format!("[{group}] {username}> {text}");
                self.cast(self.group_ids(&group), Some(id), &message);
            }
            // A listing failure reads the same as an empty directory.
            Command::Files => {
                let files = transfer::list_shared_files(&self.shared_dir).unwrap_or_else(|e| {
                    warn!(
                        "Failed to list shared directory {}: {}",
                        self.shared_dir.display(),
                        e
                    );
                    Vec::new()
                });
                if files.is_empty() {
                    return Err(ChatError::NoSharedFiles);
                }
                self.notify(id, &format!("Shared files:\n{}", files.join("\n")));
            }
            Command::Get(request) => self.start_transfer(id, request)?,
            Command::Help => self.notify(id, HELP_TEXT),
            Command::Chat(text) => {
                let message = format!("{username}> {text}");
                self.cast(self.session_ids(), Some(id), &message);
            }
        }
        Ok(())
    }

    // --- File transfers ---

    /// Checks the guard, then the file, then the transport.
    fn start_transfer(&mut self, id: ConnectionId, request: GetRequest) -> Result<(), ChatError> {
        let marker = self.transfers.try_begin(id)?;
        let (path, size) = transfer::resolve_shared_file(&self.shared_dir, &request.filename)
            .ok_or(ChatError::FileNotFound)?;
        // The requester may already be gone.
        let Some(peer) = self.peers.get(&id) else {
            return Ok(());
        };

        match request.transport {
            Transport::Tcp => {
                let job = StreamJob {
                    name: request.filename,
                    path,
                    chunk_size: self.chunk_size,
                    marker,
                };
                // A closed outbox hands the job back and its marker drops with it.
                let _ = peer.outbox.send(Outbound::File(job));
            }
            Transport::Udp { port } => {
                let target = SocketAddr::new(peer.addr.ip(), port);
                let notice = protocol::datagram_notice(&request.filename, size);
                let _ = peer.outbox.send(Outbound::Text(protocol::text_frame(&notice)));
                // The marker covers the notice only; the datagrams may still be in flight.
                drop(marker);

                info!(
                    "Sending '{}' ({} bytes) as datagrams to {}",
                    request.filename, size, target
                );
                let chunk_size = self.chunk_size;
                tokio::spawn(async move {
                    match transfer::send_datagrams(target, path, chunk_size).await {
                        Ok(sent) => info!("Datagram transfer to {} finished ({} bytes)", target, sent),
                        Err(e) => warn!("Datagram transfer to {} failed: {}", target, e),
                    }
                });
            }
            Transport::Other(_) => return Err(ChatError::InvalidProtocol),
        }
        Ok(())
    }

    // --- Teardown ---

    /// Handles a connection whose reader reported EOF or a read error.
    pub fn disconnect(&mut self, id: ConnectionId) {
        if self.sessions.is_registered(id) {
            if let Some(name) = self.sessions.username(id) {
                info!("'{}' disconnected", name);
            }
            self.end_session(id, "disconnected");
        } else if self.peers.contains_key(&id) {
            debug!("Unregistered connection {} closed", id);
            self.close(id);
        }
    }

    /// Announces the departure, removes the session everywhere, and closes.
    fn end_session(&mut self, id: ConnectionId, how: &str) {
        if let Some(name) = self.sessions.username(id) {
            let notice = format!("{SERVER_TAG} [{name}] {how}");
            self.cast(self.session_ids(), Some(id), &notice);
        }
        let emptied = self.groups.remove_everywhere(id);
        if !emptied.is_empty() {
            debug!("Connection {} left groups {:?}", id, emptied);
        }
        self.sessions.remove(id);
        self.close(id);
    }

    /// Drops the connection's outbox and stops its reader.
    fn close(&mut self, id: ConnectionId) {
        if let Some(peer) = self.peers.remove(&id) {
            let _ = peer.kill.send(());
            debug!("Connection {} from {} closed", id, peer.addr);
        }
    }

    /// Closes every connection. Used on server shutdown.
    pub fn shutdown(&mut self) {
        let ids: Vec<ConnectionId> = self.peers.keys().copied().collect();
        for id in ids {
            self.close(id);
        }
    }

    // --- Delivery ---

    /// Sends `message` to every connection in `targets` except `exclude`.
    /// Send failures are ignored.
    fn cast(&self, targets: Vec<ConnectionId>, exclude: Option<ConnectionId>, message: &str) {
        info!(target: "relaychat::traffic", "{}", message);
        let frame = protocol::text_frame(message);
        for target in targets {
            if Some(target) == exclude {
                continue;
            }
            if let Some(peer) = self.peers.get(&target) {
                let _ = peer.outbox.send(Outbound::Text(frame.clone()));
            }
        }
    }

    fn notify(&self, id: ConnectionId, message: &str) {
        if let Some(peer) = self.peers.get(&id) {
            let _ = peer.outbox.send(Outbound::Text(protocol::text_frame(message)));
        }
    }

    // --- Accessors ---

    fn session_ids(&self) -> Vec<ConnectionId> {
        self.sessions.ids().collect()
    }

    fn group_ids(&self, group: &str) -> Vec<ConnectionId> {
        self.groups
            .members(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    pub fn is_attached(&self, id: ConnectionId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.peers.len()
    }
}
