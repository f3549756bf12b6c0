// tests/integration/end_to_end_test.rs

//! End-to-end tests against a real server on an ephemeral port
//! Tests: registration, chat routing, streaming and datagram transfers, quit, disconnect

use super::test_helpers::{TestClient, TestServer};
use relaychat::client::{self, ClientEvent, DownloadProtocol, DownloadSink, PendingDatagram};
use relaychat::core::protocol::ServerFrame;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;

/// A body that contains newlines and a fake header, so any framing slip shows.
fn tricky_content(len: usize) -> Vec<u8> {
    let pattern = b"FILE fake.txt 3\nalice> not chat\n\x00\xff";
    pattern.iter().copied().cycle().take(len).collect()
}

#[tokio::test]
async fn test_chat_between_two_clients() {
    let server = TestServer::start(&[]).await;
    let mut alice = TestClient::login(server.addr, "alice").await;
    let mut bob = TestClient::login(server.addr, "bob").await;

    assert_eq!(alice.expect_text().await, "[server] [bob] joined");

    bob.send("hello all").await;
    assert_eq!(alice.expect_text().await, "bob> hello all");

    alice.send("/msg bob psst").await;
    assert_eq!(bob.expect_text().await, "[private] alice> psst");

    server.stop().await;
}

#[tokio::test]
async fn test_duplicate_username_is_closed() {
    let server = TestServer::start(&[]).await;
    let _alice = TestClient::login(server.addr, "alice").await;

    let mut imposter = TestClient::connect(server.addr).await;
    imposter.send("alice").await;
    assert_eq!(imposter.expect_text().await, "[server] Username already taken");
    imposter.expect_closed().await;

    server.stop().await;
}

#[tokio::test]
async fn test_msg_to_unknown_user_reaches_nobody_else() {
    let server = TestServer::start(&[]).await;
    let mut bob = TestClient::login(server.addr, "bob").await;
    let mut carol = TestClient::login(server.addr, "carol").await;
    assert_eq!(bob.expect_text().await, "[server] [carol] joined");

    bob.send("/msg alice hello there").await;
    assert_eq!(bob.expect_text().await, "[server] User [alice] not found");

    // Carol's next frame is her own sync reply, not a stray message.
    carol.sync().await;

    server.stop().await;
}

#[tokio::test]
async fn test_streaming_transfer_round_trip() {
    let content = tricky_content(10_000);
    let server = TestServer::start(&[("data.bin", &content)]).await;
    let mut alice = TestClient::login(server.addr, "alice").await;
    let mut bob = TestClient::login(server.addr, "bob").await;
    assert_eq!(alice.expect_text().await, "[server] [bob] joined");

    alice.send("/get data.bin tcp").await;
    bob.send("chat during the transfer").await;

    // The chat line arrives either before the header or after the whole body.
    let mut saw_chat = false;
    let mut file = None;
    while file.is_none() || !saw_chat {
        match alice.next_frame().await {
            Some(ServerFrame::Text(text)) => {
                assert_eq!(text, "bob> chat during the transfer");
                saw_chat = true;
            }
            Some(ServerFrame::FileStart { name, size }) => {
                assert_eq!(name, "data.bin");
                assert_eq!(size, 10_000);
                let mut body = Vec::new();
                loop {
                    match alice.next_frame().await {
                        Some(ServerFrame::FileChunk(chunk)) => body.extend_from_slice(&chunk),
                        Some(ServerFrame::FileEnd) => break,
                        other => panic!("Frame inside the file body: {other:?}"),
                    }
                }
                file = Some(body);
            }
            other => panic!("Unexpected frame: {other:?}"),
        }
    }
    assert_eq!(file.unwrap(), content);

    // The connection is still usable afterwards.
    alice.send("/get data.bin tcp").await;
    let (name, body) = alice.expect_file().await;
    assert_eq!(name, "data.bin");
    assert_eq!(body, content);

    server.stop().await;
}

#[tokio::test]
async fn test_empty_file_transfer() {
    let server = TestServer::start(&[("empty.txt", b"")]).await;
    let mut alice = TestClient::login(server.addr, "alice").await;

    alice.send("/get empty.txt tcp").await;
    let (name, body) = alice.expect_file().await;
    assert_eq!(name, "empty.txt");
    assert!(body.is_empty());
    alice.sync().await;

    server.stop().await;
}

#[tokio::test]
async fn test_datagram_transfer_round_trip() {
    let content = tricky_content(6_000);
    let server = TestServer::start(&[("small.bin", &content)]).await;
    let mut alice = TestClient::login(server.addr, "alice").await;

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    alice.send(&format!("/get small.bin udp {port}")).await;

    match alice.next_frame().await {
        Some(ServerFrame::DatagramNotice { name, size }) => {
            assert_eq!(name, "small.bin");
            assert_eq!(size, 6_000);
        }
        other => panic!("Expected a datagram notice, got {other:?}"),
    }

    let mut received = Vec::new();
    let mut buf = vec![0u8; 65_536];
    while received.len() < content.len() {
        let (n, _) = tokio::time::timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
            .await
            .expect("Timed out waiting for datagrams")
            .unwrap();
        received.extend_from_slice(&buf[..n]);
    }
    assert_eq!(received, content);

    server.stop().await;
}

#[tokio::test]
async fn test_quit_and_disconnect_are_announced() {
    let server = TestServer::start(&[]).await;
    let mut alice = TestClient::login(server.addr, "alice").await;
    let mut bob = TestClient::login(server.addr, "bob").await;
    let carol = TestClient::login(server.addr, "carol").await;
    assert_eq!(alice.expect_text().await, "[server] [bob] joined");
    assert_eq!(alice.expect_text().await, "[server] [carol] joined");
    assert_eq!(bob.expect_text().await, "[server] [carol] joined");

    bob.send("/quit").await;
    assert_eq!(alice.expect_text().await, "[server] [bob] left");
    bob.expect_closed().await;

    drop(carol);
    assert_eq!(alice.expect_text().await, "[server] [carol] disconnected");

    // Both names can be taken again.
    let _bob = TestClient::login(server.addr, "bob").await;
    assert_eq!(alice.expect_text().await, "[server] [bob] joined");

    server.stop().await;
}

// ===== Client receive loop =====

async fn connect_receiver(
    server: &TestServer,
    username: &str,
    downloads: &TempDir,
) -> (
    tokio::net::tcp::OwnedWriteHalf,
    PendingDatagram,
    mpsc::UnboundedReceiver<ClientEvent>,
) {
    let stream = TcpStream::connect(server.addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    write_half
        .write_all(format!("{username}\n").as_bytes())
        .await
        .unwrap();

    let pending: PendingDatagram = Arc::new(parking_lot::Mutex::new(None));
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let sink = DownloadSink::new(downloads.path(), username);
    tokio::spawn(client::receive_loop(
        read_half,
        sink,
        pending.clone(),
        events_tx,
    ));
    (write_half, pending, events_rx)
}

async fn next_download(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("Timed out waiting for a client event")
            .expect("Receive loop ended");
        match event {
            ClientEvent::Message(_) => continue,
            other => return other,
        }
    }
}

#[tokio::test]
async fn test_client_saves_streamed_downloads() {
    let content = tricky_content(12_345);
    let server = TestServer::start(&[("notes.bin", &content)]).await;
    let downloads = TempDir::new().unwrap();
    let (mut writer, _pending, mut events) = connect_receiver(&server, "dave", &downloads).await;

    writer.write_all(b"/get notes.bin tcp\n").await.unwrap();
    assert_eq!(
        next_download(&mut events).await,
        ClientEvent::Downloaded {
            name: "notes.bin".into(),
            size: 12_345,
            via: DownloadProtocol::Tcp,
        }
    );
    let saved = std::fs::read(downloads.path().join("dave").join("notes.bin")).unwrap();
    assert_eq!(saved, content);

    server.stop().await;
}

#[tokio::test]
async fn test_client_saves_datagram_downloads() {
    let content = tricky_content(5_000);
    let server = TestServer::start(&[("d.bin", &content)]).await;
    let downloads = TempDir::new().unwrap();
    let (mut writer, pending, mut events) = connect_receiver(&server, "erin", &downloads).await;

    let socket = client::bind_datagram_endpoint(server.addr).await.unwrap();
    let port = socket.local_addr().unwrap().port();
    *pending.lock() = Some(socket);
    writer
        .write_all(format!("/get d.bin udp {port}\n").as_bytes())
        .await
        .unwrap();

    assert_eq!(
        next_download(&mut events).await,
        ClientEvent::Downloaded {
            name: "d.bin".into(),
            size: 5_000,
            via: DownloadProtocol::Udp,
        }
    );
    assert!(pending.lock().is_none());
    let saved = std::fs::read(downloads.path().join("erin").join("d.bin")).unwrap();
    assert_eq!(saved, content);

    server.stop().await;
}

#[tokio::test]
async fn test_client_releases_endpoint_after_refused_datagram_get() {
    let server = TestServer::start(&[("d.bin", b"data")]).await;
    let downloads = TempDir::new().unwrap();
    let (mut writer, pending, mut events) = connect_receiver(&server, "gina", &downloads).await;

    let socket = client::bind_datagram_endpoint(server.addr).await.unwrap();
    let port = socket.local_addr().unwrap().port();
    *pending.lock() = Some(socket);
    writer
        .write_all(format!("/get nope.bin udp {port}\n").as_bytes())
        .await
        .unwrap();

    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("Timed out waiting for the refusal")
            .expect("Receive loop ended");
        if event == ClientEvent::Message("[server] File not found".into()) {
            break;
        }
    }
    assert!(pending.lock().is_none());

    // A later datagram notice without an endpoint is reported, not waited on.
    let other = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let other_port = other.local_addr().unwrap().port();
    writer
        .write_all(format!("/get d.bin udp {other_port}\n").as_bytes())
        .await
        .unwrap();
    assert!(matches!(
        next_download(&mut events).await,
        ClientEvent::DownloadFailed { name, .. } if name == "d.bin"
    ));

    server.stop().await;
}

#[tokio::test]
async fn test_client_reports_disconnect() {
    let server = TestServer::start(&[]).await;
    let downloads = TempDir::new().unwrap();
    let (mut writer, _pending, mut events) = connect_receiver(&server, "frank", &downloads).await;

    writer.write_all(b"/quit\n").await.unwrap();
    assert_eq!(next_download(&mut events).await, ClientEvent::Disconnected);

    server.stop().await;
}
