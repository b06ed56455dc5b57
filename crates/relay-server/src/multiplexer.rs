//! Multiplexer: the single task that owns every session.
//!
//! All relay state (the [`SessionLifecycle`] and, through it, the session
//! table and every client's write half) lives on this one task.  Nothing is
//! shared, so nothing is locked.  The loop sleeps in `tokio::select!` until
//! one of three things happens:
//!
//! ```text
//!             ┌────────────────────── select! (biased) ─────────────────────┐
//!             │                                                             │
//!   listener.accept()      events_rx.recv()              console_rx.recv()
//!   (only while a slot     (frames / closes / failures   (operator lines,
//!    is free)               from every reader task)       Ctrl-C)
//!             │                     │                             │
//!          admit()          relay() / terminate()           SERVER_END?
//!             └──────────► deliver(deliveries) ◄───────┘          │
//!                                                              shutdown()
//! ```
//!
//! # Back-pressure
//!
//! While every slot is taken the accept branch is disabled.  New clients
//! wait in the kernel's listen backlog and are accepted, in order, as soon
//! as a slot frees up.
//!
//! # Write failures
//!
//! A failed write terminates that one session with
//! [`TerminationReason::IoError`].  Its leave notice is queued behind the
//! deliveries still pending, and a failure while writing *that* notice is
//! handled the same way, so one dead client never stops the others from
//! hearing about it.
//!
//! # Shutdown
//!
//! `SERVER_END` goes to every session.  The loop then only watches for
//! sessions closing, until all have closed or `drain_timeout` has passed.
//! Whatever is still open at the deadline is closed by the server.  The
//! listener is dropped last.

use std::collections::VecDeque;
use std::net::SocketAddr;

use tokio::io::AsyncWrite;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::application::session_lifecycle::{
    Delivery, LifecycleError, RelayOutcome, SessionLifecycle, Termination, TerminationReason,
};
use crate::domain::config::RelayConfig;
use crate::domain::session_table::{SessionId, SlotIndex};
use crate::infrastructure::console::{ConsoleError, OperatorCommand};
use crate::infrastructure::network::{
    read_display_name, spawn_reader, Connection, RelayError, SessionEnvelope, SessionEvent,
};

/// Buffer size of the channel carrying reader-task events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How the drain after `SERVER_END` went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sessions that closed on their own after `SERVER_END`.
    pub drained: usize,
    /// Sessions the server had to close: still open at the drain deadline,
    /// or unreachable when `SERVER_END` was written.
    pub forced: usize,
}

/// The relay's event loop.
pub struct Multiplexer {
    config: RelayConfig,
    listener: TcpListener,
    lifecycle: SessionLifecycle<Connection>,
    events_tx: mpsc::Sender<SessionEnvelope>,
    events_rx: mpsc::Receiver<SessionEnvelope>,
    console_rx: mpsc::Receiver<String>,
    console_open: bool,
}

impl Multiplexer {
    /// Wraps an already bound `listener`.  Operator lines arrive on
    /// `console_rx`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Table`] if `config.capacity` is 0.
    pub fn new(
        config: RelayConfig,
        listener: TcpListener,
        console_rx: mpsc::Receiver<String>,
    ) -> Result<Self, LifecycleError> {
        let lifecycle = SessionLifecycle::new(config.capacity)?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config,
            listener,
            lifecycle,
            events_tx,
            events_rx,
            console_rx,
            console_open: true,
        })
    }

    /// Address the listener is actually bound to (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Io`] if the socket cannot report its address.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves clients until the operator sends `SERVER_END`, then drains.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Io`] only if the listener's address cannot be
    /// read at startup.  Per-client failures never end the loop.
    pub async fn run(mut self) -> Result<ShutdownReport, RelayError> {
        info!(
            addr = %self.local_addr()?,
            capacity = self.config.capacity,
            "relay ready"
        );

        loop {
            let accepting = self.lifecycle.has_free_slot();

            tokio::select! {
                biased;

                accepted = self.listener.accept(), if accepting => match accepted {
                    Ok((stream, peer)) => self.admit(stream, peer).await,
                    Err(e) => warn!("accept failed: {e}"),
                },

                Some(envelope) = self.events_rx.recv() => {
                    self.on_session_event(envelope).await;
                }

                line = self.console_rx.recv(), if self.console_open => match line {
                    Some(line) => {
                        if self.on_console_line(&line) {
                            break;
                        }
                    }
                    None => {
                        debug!("console input closed");
                        self.console_open = false;
                    }
                },
            }
        }

        Ok(self.shutdown().await)
    }

    // ── Admission ─────────────────────────────────────────────────────────────

    async fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
        debug!(%peer, "connection accepted");
        let (mut read_half, write_half) = stream.into_split();

        let name = match read_display_name(&mut read_half, self.config.admission_timeout).await {
            Ok(name) => name,
            Err(e) => {
                warn!(%peer, "admission abandoned: {e}");
                return;
            }
        };

        let admission = match self.lifecycle.admit(&name, Connection::new(peer, write_half)) {
            Ok(admission) => admission,
            Err(e) => {
                warn!(%peer, "admission refused: {e}");
                return;
            }
        };

        let reader = spawn_reader(
            read_half,
            admission.slot,
            admission.session,
            self.events_tx.clone(),
        );
        if let Some(conn) = self.lifecycle.handle_mut(admission.slot, admission.session) {
            conn.attach_reader(reader);
        }

        deliver(&mut self.lifecycle, admission.deliveries).await;
    }

    // ── Session events ────────────────────────────────────────────────────────

    async fn on_session_event(&mut self, envelope: SessionEnvelope) {
        let SessionEnvelope {
            slot,
            session,
            event,
        } = envelope;

        match event {
            SessionEvent::Frame(frame) => match self.lifecycle.relay(slot, session, &frame) {
                RelayOutcome::Broadcast(deliveries) => {
                    deliver(&mut self.lifecycle, deliveries).await;
                }
                RelayOutcome::Terminated(termination) => self.finish(termination).await,
                RelayOutcome::Stale => {}
            },
            SessionEvent::Closed => {
                self.end_session(slot, session, TerminationReason::PeerClosed)
                    .await;
            }
            SessionEvent::Failed(e) => {
                warn!(slot, "read failed: {e}");
                self.end_session(slot, session, TerminationReason::IoError)
                    .await;
            }
        }
    }

    async fn end_session(
        &mut self,
        slot: SlotIndex,
        session: SessionId,
        reason: TerminationReason,
    ) {
        match self.lifecycle.terminate(slot, session, reason) {
            Some(termination) => self.finish(termination).await,
            None => debug!(slot, %session, "ignoring close of stale session"),
        }
    }

    /// Echoes `LOGOUT` if asked to, closes the departing client, then tells
    /// everyone else.
    async fn finish(&mut self, termination: Termination<Connection>) {
        let Termination {
            session,
            farewell,
            deliveries,
        } = termination;

        let mut conn = session.into_handle();
        if let Some(frame) = farewell {
            if let Err(e) = conn.send(&frame).await {
                debug!(peer = %conn.peer(), "LOGOUT echo not delivered: {e}");
            }
        }
        conn.close().await;

        deliver(&mut self.lifecycle, deliveries).await;
    }

    // ── Console ───────────────────────────────────────────────────────────────

    /// Returns `true` when the line asks the relay to stop.
    fn on_console_line(&self, line: &str) -> bool {
        match OperatorCommand::parse(line) {
            Ok(OperatorCommand::ServerEnd) => {
                info!(
                    active = self.lifecycle.table().active_count(),
                    "SERVER_END received; shutting down"
                );
                true
            }
            Err(ConsoleError::Empty) => false,
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────

    async fn shutdown(mut self) -> ShutdownReport {
        let mut report = ShutdownReport {
            drained: 0,
            forced: announce_server_end(&mut self.lifecycle).await,
        };

        let deadline = Instant::now() + self.config.drain_timeout;
        while self.lifecycle.table().active_count() > 0 {
            let envelope = match timeout_at(deadline, self.events_rx.recv()).await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        remaining = self.lifecycle.table().active_count(),
                        "drain timeout reached"
                    );
                    break;
                }
            };

            let SessionEnvelope {
                slot,
                session,
                event,
            } = envelope;
            match event {
                SessionEvent::Frame(_) => {
                    debug!(slot, "ignoring frame received while draining");
                }
                SessionEvent::Closed | SessionEvent::Failed(_) => {
                    if let Some(gone) = self.lifecycle.evict(slot, session) {
                        info!(slot, name = gone.name(), "session drained");
                        gone.into_handle().close().await;
                        report.drained += 1;
                    }
                }
            }
        }

        for (slot, session) in self.lifecycle.table().active_slots() {
            if let Some(gone) = self.lifecycle.evict(slot, session) {
                warn!(slot, name = gone.name(), "closing session that did not drain");
                gone.into_handle().close().await;
                report.forced += 1;
            }
        }

        drop(self.listener);
        info!(
            drained = report.drained,
            forced = report.forced,
            "relay stopped"
        );
        report
    }
}

// ── Delivery ──────────────────────────────────────────────────────────────────

/// Writes every delivery in order.  Deliveries addressed to a session that
/// has since left are skipped.
async fn deliver<W>(
    lifecycle: &mut SessionLifecycle<Connection<W>>,
    deliveries: Vec<Delivery>,
) where
    W: AsyncWrite + Unpin,
{
    let mut queue = VecDeque::from(deliveries);

    while let Some(Delivery {
        slot,
        session,
        frame,
    }) = queue.pop_front()
    {
        let Some(conn) = lifecycle.handle_mut(slot, session) else {
            continue;
        };
        let Err(e) = conn.send(&frame).await else {
            continue;
        };
        warn!(slot, peer = %conn.peer(), "write failed: {e}");

        if let Some(termination) = lifecycle.terminate(slot, session, TerminationReason::IoError) {
            termination.session.into_handle().close().await;
            queue.extend(termination.deliveries);
        }
    }
}

/// Sends `SERVER_END` to every session.  Sessions that cannot be written to
/// are closed on the spot; returns how many.
async fn announce_server_end<W>(lifecycle: &mut SessionLifecycle<Connection<W>>) -> usize
where
    W: AsyncWrite + Unpin,
{
    let mut unreachable = 0;

    for Delivery {
        slot,
        session,
        frame,
    } in lifecycle.shutdown_notice()
    {
        let Some(conn) = lifecycle.handle_mut(slot, session) else {
            continue;
        };
        if let Err(e) = conn.send(&frame).await {
            warn!(slot, peer = %conn.peer(), "SERVER_END not delivered: {e}");
            if let Some(gone) = lifecycle.evict(slot, session) {
                gone.into_handle().close().await;
                unreachable += 1;
            }
        }
    }

    unreachable
}

// ── Tests ─────────────────────────────────────────────────────────────────────
