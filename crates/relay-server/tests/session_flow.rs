//! End-to-end tests of the relay over real loopback sockets.
//!
//! Each test starts a [`Multiplexer`] on `127.0.0.1:0`, connects plain TCP
//! clients that speak the 128-byte frame protocol, and checks exactly what
//! every client receives.
//!
//! # Avoiding races
//!
//! A TCP connect succeeds as soon as the kernel queues the connection, long
//! before the relay admits it.  [`TestClient::join`] therefore waits for the
//! client's own join notice before returning, so the next client is only
//! started once the previous one holds its slot.

use std::net::SocketAddr;
use std::time::Duration;

use relay_core::{read_frame, write_frame, Frame};
use relay_server::domain::RelayConfig;
use relay_server::infrastructure::network::{bind_listener, RelayError};
use relay_server::multiplexer::{Multiplexer, ShutdownReport};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const SILENCE: Duration = Duration::from_millis(200);

// ── Harness ───────────────────────────────────────────────────────────────────

struct Relay {
    addr: SocketAddr,
    console: mpsc::Sender<String>,
    handle: JoinHandle<Result<ShutdownReport, RelayError>>,
}

impl Relay {
    async fn start(capacity: usize, drain_timeout: Duration) -> Self {
        let config = RelayConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            capacity,
            admission_timeout: Duration::from_secs(2),
            drain_timeout,
        };
        let listener = bind_listener(config.bind_addr).await.unwrap();
        let (console, console_rx) = mpsc::channel(4);
        let relay = Multiplexer::new(config, listener, console_rx).unwrap();
        let addr = relay.local_addr().unwrap();
        let handle = tokio::spawn(relay.run());
        Self {
            addr,
            console,
            handle,
        }
    }

    async fn operator(&self, line: &str) {
        self.console.send(line.to_string()).await.unwrap();
    }

    async fn wait(self) -> ShutdownReport {
        timeout(RECV_TIMEOUT, self.handle)
            .await
            .expect("relay did not stop")
            .unwrap()
            .unwrap()
    }
}

struct TestClient {
    stream: TcpStream,
}

impl TestClient {
    /// Connects and sends the name, without waiting for admission.
    async fn connect(addr: SocketAddr, name: &str) -> Self {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(&mut stream, &Frame::from_text(name)).await.unwrap();
        Self { stream }
    }

    /// Connects and waits until the relay has admitted us.
    async fn join(addr: SocketAddr, name: &str) -> Self {
        let mut client = Self::connect(addr, name).await;
        let notice = client.recv().await;
        assert!(
            notice.starts_with(&format!("->{name} has logged in")),
            "unexpected first frame for {name}: {notice:?}"
        );
        client
    }

    async fn say(&mut self, text: &str) {
        write_frame(&mut self.stream, &Frame::from_text(text))
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> String {
        timeout(RECV_TIMEOUT, read_frame(&mut self.stream))
            .await
            .expect("timed out waiting for a frame")
            .expect("read failed")
            .expect("relay closed the connection")
            .text()
            .into_owned()
    }

    async fn recv_n(&mut self, n: usize) -> Vec<String> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.recv().await);
        }
        out
    }

    async fn expect_silence(&mut self) {
        let result = timeout(SILENCE, read_frame(&mut self.stream)).await;
        assert!(result.is_err(), "expected no frame, got {result:?}");
    }

    async fn expect_closed(&mut self) {
        let result = timeout(RECV_TIMEOUT, read_frame(&mut self.stream))
            .await
            .expect("relay did not close the connection");
        assert!(
            matches!(result, Ok(None) | Err(_)),
            "expected close, got {result:?}"
        );
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_slot_relay_admits_waiting_client_after_logout() {
    // Arrange: capacity 1
    let relay = Relay::start(1, Duration::from_secs(5)).await;

    // Act: Alice fills the only slot
    let mut alice = TestClient::connect(relay.addr, "Alice").await;

    // Assert: her join notice carries the capacity warning
    assert_eq!(
        alice.recv().await,
        "->Alice has logged in, 0 slots free\n** user limit reached **\n"
    );

    // Act: Bob connects and waits in the backlog
    let mut bob = TestClient::connect(relay.addr, "Bob").await;
    bob.expect_silence().await;

    // Act: Alice logs out
    alice.say("LOGOUT").await;

    // Assert: Alice gets the echo and is closed; Bob is admitted
    assert_eq!(alice.recv().await, "LOGOUT");
    alice.expect_closed().await;
    assert_eq!(
        bob.recv().await,
        "->Bob has logged in, 0 slots free\n** user limit reached **\n"
    );
}

#[tokio::test]
async fn test_full_relay_stops_accepting_until_a_slot_frees() {
    // Arrange: capacity 2, both slots taken
    let relay = Relay::start(2, Duration::from_secs(5)).await;
    let mut alice = TestClient::join(relay.addr, "alice").await;
    let bob = TestClient::join(relay.addr, "bob").await;
    alice.recv().await; // bob's join

    // Act: carol queues, then bob drops without LOGOUT
    let mut carol = TestClient::connect(relay.addr, "carol").await;
    carol.expect_silence().await;
    drop(bob.stream);

    // Assert: alice hears bob leave, then carol join
    assert_eq!(alice.recv().await, "<-bob has logged out, 1 slots free\n");
    assert_eq!(
        alice.recv().await,
        "->carol has logged in, 0 slots free\n** user limit reached **\n"
    );
    assert_eq!(
        carol.recv_n(2).await,
        [
            "->carol has logged in, 0 slots free\n** user limit reached **\n",
            "->alice is already logged in\n",
        ]
    );
}

#[tokio::test]
async fn test_chat_reaches_every_client_and_roster_lists_peers() {
    // Arrange
    let relay = Relay::start(10, Duration::from_secs(5)).await;
    let mut alice = TestClient::join(relay.addr, "alice").await;
    let mut bob = TestClient::join(relay.addr, "bob").await;
    let mut carol = TestClient::connect(relay.addr, "carol").await;

    // Assert: roster for each newcomer, join notices for the others
    assert_eq!(bob.recv().await, "->alice is already logged in\n");
    assert_eq!(
        carol.recv_n(3).await,
        [
            "->carol has logged in, 7 slots free\n",
            "->alice is already logged in\n",
            "->bob is already logged in\n",
        ]
    );
    assert_eq!(
        alice.recv_n(2).await,
        [
            "->bob has logged in, 8 slots free\n",
            "->carol has logged in, 7 slots free\n",
        ]
    );
    assert_eq!(bob.recv().await, "->carol has logged in, 7 slots free\n");

    // Act
    bob.say("hi all").await;

    // Assert: everyone, the sender included, gets exactly one copy
    for client in [&mut alice, &mut bob, &mut carol] {
        assert_eq!(client.recv().await, "bob: hi all\n");
        client.expect_silence().await;
    }
}

#[tokio::test]
async fn test_near_miss_logout_is_relayed_as_chat() {
    let relay = Relay::start(10, Duration::from_secs(5)).await;
    let mut alice = TestClient::join(relay.addr, "alice").await;

    alice.say("logout").await;

    assert_eq!(alice.recv().await, "alice: logout\n");
}

/// Runs alice and bob, ends alice's session (with `LOGOUT` when `graceful`,
/// by dropping the socket otherwise) and returns what bob saw.
async fn leave_notice_seen_by_peer(graceful: bool) -> String {
    let relay = Relay::start(10, Duration::from_secs(5)).await;
    let mut alice = TestClient::join(relay.addr, "alice").await;
    let mut bob = TestClient::join(relay.addr, "bob").await;
    bob.recv().await; // roster

    if graceful {
        alice.say("LOGOUT").await;
    } else {
        drop(alice);
    }

    bob.recv().await
}

#[tokio::test]
async fn test_logout_and_abrupt_close_look_the_same_to_peers() {
    // Act
    let graceful = leave_notice_seen_by_peer(true).await;
    let abrupt = leave_notice_seen_by_peer(false).await;

    // Assert
    assert_eq!(graceful, "<-alice has logged out, 9 slots free\n");
    assert_eq!(graceful, abrupt);
}

#[tokio::test]
async fn test_shutdown_waits_for_every_client_to_disconnect() {
    // Arrange: three clients
    let relay = Relay::start(10, Duration::from_secs(10)).await;
    let mut clients = Vec::new();
    for name in ["a", "b", "c"] {
        clients.push(TestClient::join(relay.addr, name).await);
    }

    // Act
    relay.operator("SERVER_END").await;

    // Assert: every client is told, in its own stream, after the notices
    for client in clients.iter_mut() {
        loop {
            if client.recv().await == "SERVER_END" {
                break;
            }
        }
    }

    // Act / Assert: the relay keeps running (and listening) until the last
    // client has gone
    while let Some(client) = clients.pop() {
        sleep(SILENCE).await;
        assert!(!relay.handle.is_finished(), "relay stopped with clients left");
        assert!(TcpStream::connect(relay.addr).await.is_ok());
        drop(client);
    }

    let addr = relay.addr;
    let report = relay.wait().await;
    assert_eq!(report, ShutdownReport { drained: 3, forced: 0 });
    assert!(
        TcpStream::connect(addr).await.is_err(),
        "listener must be released after the drain"
    );
}

#[tokio::test]
async fn test_drain_timeout_closes_clients_that_stay() {
    // Arrange
    let relay = Relay::start(10, Duration::from_millis(300)).await;
    let mut stubborn = TestClient::join(relay.addr, "stubborn").await;

    // Act
    relay.operator("SERVER_END").await;
    let report = relay.wait().await;

    // Assert
    assert_eq!(report, ShutdownReport { drained: 0, forced: 1 });
    assert_eq!(stubborn.recv().await, "SERVER_END");
    stubborn.expect_closed().await;
}

#[tokio::test]
async fn test_shutdown_with_no_clients_stops_immediately() {
    let relay = Relay::start(10, Duration::from_secs(30)).await;
    relay.operator("SERVER_END").await;
    assert_eq!(relay.wait().await, ShutdownReport::default());
}

#[tokio::test]
async fn test_unknown_console_command_is_ignored() {
    // Arrange
    let relay = Relay::start(10, Duration::from_secs(5)).await;
    let mut alice = TestClient::join(relay.addr, "alice").await;

    // Act
    relay.operator("server_end").await;
    relay.operator("").await;
    alice.say("still here").await;

    // Assert
    assert_eq!(alice.recv().await, "alice: still here\n");
    assert!(!relay.handle.is_finished());
}

#[tokio::test]
async fn test_broken_newcomers_do_not_disturb_the_relay() {
    // Arrange
    let relay = Relay::start(2, Duration::from_secs(5)).await;
    let mut alice = TestClient::join(relay.addr, "alice").await;

    // Act: one connection leaves without a name, another sends half a frame
    drop(TcpStream::connect(relay.addr).await.unwrap());
    let mut partial = TcpStream::connect(relay.addr).await.unwrap();
    partial.write_all(b"mall").await.unwrap();
    drop(partial);
    let mut bob = TestClient::join(relay.addr, "bob").await;

    // Assert: neither broken attempt took a slot or produced a notice
    assert_eq!(
        alice.recv().await,
        "->bob has logged in, 0 slots free\n** user limit reached **\n"
    );
    assert_eq!(bob.recv().await, "->alice is already logged in\n");
}

#[tokio::test]
async fn test_client_dying_mid_frame_is_terminated_alone() {
    // Arrange
    let relay = Relay::start(10, Duration::from_secs(5)).await;
    let mut alice = TestClient::join(relay.addr, "alice").await;
    let mut bob = TestClient::join(relay.addr, "bob").await;
    alice.recv().await; // bob's join
    bob.recv().await; // roster

    // Act: bob writes part of a frame and vanishes
    bob.stream.write_all(&[b'x'; 30]).await.unwrap();
    drop(bob);

    // Assert: alice sees the ordinary leave notice and can keep chatting
    assert_eq!(alice.recv().await, "<-bob has logged out, 9 slots free\n");
    alice.say("anyone?").await;
    assert_eq!(alice.recv().await, "alice: anyone?\n");
}
