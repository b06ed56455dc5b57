//! Per-client connection handle and reader task.
//!
//! Every admitted client's socket is split in two:
//!
//! ```text
//!              ┌──────────── TcpStream ────────────┐
//!              │                                   │
//!        OwnedReadHalf                       OwnedWriteHalf
//!              │                                   │
//!     spawn_reader() task                 Connection (in the table)
//!              │                                   ▲
//!   SessionEnvelope ──► mpsc ──► multiplexer ──────┘ send(frame)
//! ```
//!
//! The reader task only ever reads; it reports each complete frame, a clean
//! close, or a read failure.  Writes happen on the multiplexer task through
//! [`Connection::send`], so the session table has exactly one owner.

use std::io;
use std::net::SocketAddr;

use relay_core::{read_frame, write_frame, Frame};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::domain::session_table::{SessionId, SlotIndex};

/// What a reader task observed on its socket.
#[derive(Debug)]
pub enum SessionEvent {
    /// One complete frame arrived.
    Frame(Frame),
    /// The peer closed the socket between frames.
    Closed,
    /// Reading failed, or the peer hung up in the middle of a frame.
    Failed(io::Error),
}

/// A [`SessionEvent`] tagged with the occupancy it belongs to.
#[derive(Debug)]
pub struct SessionEnvelope {
    pub slot: SlotIndex,
    pub session: SessionId,
    pub event: SessionEvent,
}

/// Spawns the task that reads frames for one session.
///
/// The task ends after reporting `Closed` or `Failed`, or as soon as the
/// multiplexer drops its receiver.
pub fn spawn_reader<R>(
    mut reader: R,
    slot: SlotIndex,
    session: SessionId,
    events: mpsc::Sender<SessionEnvelope>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let event = match read_frame(&mut reader).await {
                Ok(Some(frame)) => SessionEvent::Frame(frame),
                Ok(None) => SessionEvent::Closed,
                Err(e) => SessionEvent::Failed(e),
            };
            let last = !matches!(event, SessionEvent::Frame(_));
            trace!(slot, %session, ?event, "session event");

            let envelope = SessionEnvelope {
                slot,
                session,
                event,
            };
            if events.send(envelope).await.is_err() {
                debug!(slot, "event channel closed; reader exiting");
                return;
            }
            if last {
                return;
            }
        }
    })
}

/// Server-side handle to one admitted client.
///
/// Generic over the write half so the delivery rules can be exercised with
/// in-memory writers; the relay itself always uses a TCP write half.
#[derive(Debug)]
pub struct Connection<W = OwnedWriteHalf> {
    peer: SocketAddr,
    writer: W,
    reader: Option<JoinHandle<()>>,
}

impl<W> Connection<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(peer: SocketAddr, writer: W) -> Self {
        Self {
            peer,
            writer,
            reader: None,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Ties the reader task's lifetime to this connection.
    pub fn attach_reader(&mut self, reader: JoinHandle<()>) {
        self.reader = Some(reader);
    }

    /// Writes one frame.
    ///
    /// # Errors
    ///
    /// Returns the underlying write error; the caller terminates the session.
    pub async fn send(&mut self, frame: &Frame) -> io::Result<()> {
        write_frame(&mut self.writer, frame).await
    }

    /// Stops the reader task and closes the socket.
    pub async fn close(mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Err(e) = self.writer.shutdown().await {
            debug!(peer = %self.peer, "shutdown after close: {e}");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
