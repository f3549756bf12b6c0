// src/client/mod.rs

//! The chat client: a receive task that decodes the server stream into chat
//! lines and downloads, and an input loop that encodes user commands.

pub mod downloads;
pub mod input;

pub use downloads::DownloadSink;
pub use input::{DownloadProtocol, InputAction};

use crate::core::ChatError;
use crate::core::commands::{Command, GET_USAGE};
use crate::core::protocol::{FrameError, READ_UNIT, ServerFrame, TransferCodec};
use anyhow::{Context, Result};
use futures::StreamExt;
use parking_lot::Mutex;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

/// A datagram endpoint bound ahead of a `/get ... udp` request, waiting for
/// the server's notice.
pub type PendingDatagram = Arc<Mutex<Option<UdpSocket>>>;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub username: String,
    pub host: String,
    pub port: u16,
    /// Root under which `<username>/` download directories are created.
    pub downloads: PathBuf,
}

/// What the receive task reports to the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Message(String),
    Downloaded {
        name: String,
        size: u64,
        via: DownloadProtocol,
    },
    DownloadFailed {
        name: String,
        reason: String,
    },
    Disconnected,
}

impl std::fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientEvent::Message(text) => write!(f, "{text}"),
            ClientEvent::Downloaded {
                name,
                size,
                via: DownloadProtocol::Tcp,
            } => write!(f, "Downloaded {name} ({size} bytes)"),
            ClientEvent::Downloaded {
                name,
                size,
                via: DownloadProtocol::Udp,
            } => write!(f, "Downloaded {name} ({size} bytes via UDP)"),
            ClientEvent::DownloadFailed { name, reason } => {
                write!(f, "Download of {name} failed: {reason}")
            }
            ClientEvent::Disconnected => write!(f, "[server] Disconnected"),
        }
    }
}

/// Decodes the server stream until it ends, reporting everything on `events`.
pub async fn receive_loop<R: AsyncRead + Unpin>(
    reader: R,
    mut sink: DownloadSink,
    pending: PendingDatagram,
    events: mpsc::UnboundedSender<ClientEvent>,
) {
    let mut frames = FramedRead::with_capacity(reader, TransferCodec::new(), READ_UNIT);

    while let Some(frame) = frames.next().await {
        let event = match frame {
            Ok(ServerFrame::Text(text)) => {
                if is_get_rejection(&text) && pending.lock().take().is_some() {
                    debug!("Released the parked datagram endpoint after: {}", text);
                }
                Some(ClientEvent::Message(text))
            }
            Ok(ServerFrame::FileStart { name, size }) => {
                debug!("Receiving '{}' ({} bytes) in-band", name, size);
                sink.begin(&name, size).await;
                None
            }
            Ok(ServerFrame::FileChunk(chunk)) => {
                sink.write_chunk(&chunk).await;
                None
            }
            Ok(ServerFrame::FileEnd) => sink.finish().await.map(|done| match done.error {
                None => ClientEvent::Downloaded {
                    name: done.name,
                    size: done.size,
                    via: DownloadProtocol::Tcp,
                },
                Some(e) => ClientEvent::DownloadFailed {
                    name: done.name,
                    reason: e.to_string(),
                },
            }),
            Ok(ServerFrame::DatagramNotice { name, size }) => {
                Some(receive_datagram_file(&sink, &pending, name, size).await)
            }
            Err(FrameError::Truncated { remaining }) => {
                if let Some(done) = sink.finish().await {
                    let _ = events.send(ClientEvent::DownloadFailed {
                        name: done.name,
                        reason: format!("connection closed with {remaining} bytes outstanding"),
                    });
                }
                break;
            }
            Err(e) => {
                warn!("Receive failed: {}", e);
                break;
            }
        };
        if let Some(event) = event
            && events.send(event).is_err()
        {
            return;
        }
    }
    let _ = events.send(ClientEvent::Disconnected);
}

async fn receive_datagram_file(
    sink: &DownloadSink,
    pending: &PendingDatagram,
    name: String,
    size: u64,
) -> ClientEvent {
    let socket = pending.lock().take();
    let Some(socket) = socket else {
        return ClientEvent::DownloadFailed {
            name,
            reason: "no datagram endpoint was bound for this transfer".to_string(),
        };
    };
    let path = sink.path_for(&name);
    match downloads::receive_datagrams(socket, &path, size).await {
        Ok(size) => ClientEvent::Downloaded {
            name,
            size,
            via: DownloadProtocol::Udp,
        },
        Err(e) => ClientEvent::DownloadFailed {
            name,
            reason: e.to_string(),
        },
    }
}

/// True for the notices the server answers a refused `/get` with. A datagram
/// endpoint parked for that request will never receive anything.
fn is_get_rejection(text: &str) -> bool {
    [
        ChatError::FileNotFound,
        ChatError::InvalidProtocol,
        ChatError::TransferInProgress,
        ChatError::Usage(GET_USAGE),
    ]
    .iter()
    .any(|e| e.notice() == text)
}

/// Binds a datagram endpoint on an ephemeral port of the same family as `server`.
pub async fn bind_datagram_endpoint(server: SocketAddr) -> std::io::Result<UdpSocket> {
    let local: SocketAddr = if server.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    UdpSocket::bind(local).await
}

async fn send_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Connects, registers, and runs the interactive session until the user
/// quits, stdin closes, or the server goes away.
pub async fn run(options: ClientOptions) -> Result<()> {
    let stream = TcpStream::connect((options.host.as_str(), options.port))
        .await
        .with_context(|| format!("Failed to connect to {}:{}", options.host, options.port))?;
    let server_addr = stream.peer_addr().context("Failed to read the server address")?;
    info!("Connected to {}", server_addr);

    let (read_half, mut write_half) = stream.into_split();
    send_line(&mut write_half, &options.username)
        .await
        .context("Failed to send the username")?;

    let pending: PendingDatagram = Arc::new(Mutex::new(None));
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let sink = DownloadSink::new(&options.downloads, &options.username);
    info!("Downloads are saved under {}", sink.dir().display());
    let receiver = tokio::spawn(receive_loop(
        read_half,
        sink,
        pending.clone(),
        events_tx,
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut protocol = DownloadProtocol::default();

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                match event {
                    Some(ClientEvent::Disconnected) | None => {
                        println!("{}", ClientEvent::Disconnected);
                        break;
                    }
                    Some(event) => println!("{event}"),
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                match input::interpret(&line, protocol) {
                    InputAction::Ignore => {}
                    InputAction::SetProtocol(p) => {
                        protocol = p;
                        println!("Protocol set to {protocol}");
                    }
                    InputAction::Send(text) => {
                        if Command::is_get(&text) {
                            // A typed-out request names its own port.
                            pending.lock().take();
                        }
                        send_line(&mut write_half, &text).await.context("Failed to send")?;
                    }
                    InputAction::SendAndExit(text) => {
                        send_line(&mut write_half, &text).await.context("Failed to send")?;
                        break;
                    }
                    InputAction::RequestDatagram { filename } => {
                        let socket = bind_datagram_endpoint(server_addr)
                            .await
                            .context("Failed to bind a datagram endpoint")?;
                        let port = socket.local_addr()?.port();
                        *pending.lock() = Some(socket);
                        send_line(&mut write_half, &input::datagram_request(&filename, port))
                            .await
                            .context("Failed to send")?;
                    }
                }
            }
        }
    }

    let _ = write_half.shutdown().await;
    receiver.abort();
    Ok(())
}
