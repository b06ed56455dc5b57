//! SessionLifecycle: admission, relay, and termination of chat sessions.
//!
//! This use case owns the [`SessionTable`] and decides *what* every client
//! should receive.  It never touches a socket: each operation returns an
//! ordered list of [`Delivery`] values (one frame addressed to one session)
//! and the multiplexer writes them out.
//!
//! # Session lifecycle (for beginners)
//!
//! ```text
//!            admit(name)                 relay(LOGOUT) / peer closed / I/O error
//!  Empty  ───────────────►  Active  ─────────────────────────────────────────►  Empty
//!                             │  ▲
//!                             └──┘ relay(chat text): broadcast "<name>: <text>"
//! ```
//!
//! # Delivery ordering on admission
//!
//! The join notice is broadcast first, to every active session in slot order
//! (the newcomer included).  Only then does the newcomer receive one
//! "already logged in" notice per peer, also in slot order.

use relay_core::protocol::clamp_display_name;
use relay_core::{ClientMessage, Frame, ServerMessage};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::session_table::{Session, SessionId, SessionTable, SlotIndex, TableError};

/// Error type for lifecycle operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error(transparent)]
    Table(#[from] TableError),
}

/// One frame to write to one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub slot: SlotIndex,
    /// Occupant the frame is meant for; if the slot changed hands in the
    /// meantime the delivery is dropped.
    pub session: SessionId,
    pub frame: Frame,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The client sent `LOGOUT`.
    Logout,
    /// The client closed its socket without sending `LOGOUT`.
    PeerClosed,
    /// Reading from or writing to the client failed.
    IoError,
}

/// Result of a successful admission.
#[derive(Debug)]
pub struct Admission {
    pub slot: SlotIndex,
    pub session: SessionId,
    pub deliveries: Vec<Delivery>,
}

/// Result of ending a session.
#[derive(Debug)]
pub struct Termination<H> {
    /// The released session; its handle must be closed by the caller.
    pub session: Session<H>,
    /// `LOGOUT` echo to write to the departing client *before* closing it.
    /// Only present for [`TerminationReason::Logout`].
    pub farewell: Option<Frame>,
    /// Leave notice for every session still active.
    pub deliveries: Vec<Delivery>,
}

/// What happened to a frame handed to [`SessionLifecycle::relay`].
#[derive(Debug)]
pub enum RelayOutcome<H> {
    /// A chat line to broadcast.
    Broadcast(Vec<Delivery>),
    /// The frame was `LOGOUT`; the session has ended.
    Terminated(Termination<H>),
    /// The frame came from a session that no longer occupies its slot.
    Stale,
}

/// Owner of the session table and the rules that mutate it.
#[derive(Debug)]
pub struct SessionLifecycle<H> {
    table: SessionTable<H>,
}

impl<H> SessionLifecycle<H> {
    /// Creates a lifecycle handler with `capacity` empty slots.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Table`] if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self, LifecycleError> {
        Ok(Self {
            table: SessionTable::with_capacity(capacity)?,
        })
    }

    /// Read-only view of the table.
    pub fn table(&self) -> &SessionTable<H> {
        &self.table
    }

    pub fn has_free_slot(&self) -> bool {
        !self.table.is_full()
    }

    /// Connection handle of the current occupant, or `None` if the slot has
    /// been freed or reassigned.
    pub fn handle_mut(&mut self, slot: SlotIndex, session: SessionId) -> Option<&mut H> {
        self.table
            .get_mut(slot)
            .filter(|s| s.id() == session)
            .map(Session::handle_mut)
    }

    /// Admits a client that has sent `raw_name` as its first frame.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Table`] if no slot is free.  The caller is
    /// expected to stop accepting while the table is full, so this only
    /// happens on misuse.
    pub fn admit(&mut self, raw_name: &str, handle: H) -> Result<Admission, LifecycleError> {
        let name = clamp_display_name(raw_name).to_string();
        let (slot, session) = self.table.admit(name.clone(), handle)?;

        let remaining = self.table.remaining();
        let joined = ServerMessage::Joined {
            name: name.clone(),
            slots_free: remaining,
            capacity_reached: remaining == 0,
        };
        info!(slot, "{}", joined.to_string().trim_end());

        let mut deliveries = self.broadcast(&joined.to_frame());
        deliveries.extend(
            self.table
                .active()
                .filter(|peer| peer.slot() != slot)
                .map(|peer| Delivery {
                    slot,
                    session,
                    frame: ServerMessage::AlreadyPresent {
                        name: peer.name().to_string(),
                    }
                    .to_frame(),
                }),
        );

        Ok(Admission {
            slot,
            session,
            deliveries,
        })
    }

    /// Handles one frame received from an active session.
    pub fn relay(
        &mut self,
        slot: SlotIndex,
        session: SessionId,
        frame: &Frame,
    ) -> RelayOutcome<H> {
        let Some(sender) = self.table.get(slot).filter(|s| s.id() == session) else {
            debug!(slot, %session, "dropping frame from stale session");
            return RelayOutcome::Stale;
        };

        match ClientMessage::from_frame(frame) {
            ClientMessage::Logout => match self.terminate(slot, session, TerminationReason::Logout)
            {
                Some(termination) => RelayOutcome::Terminated(termination),
                None => RelayOutcome::Stale,
            },
            ClientMessage::Chat(text) => {
                let chat = ServerMessage::Chat {
                    name: sender.name().to_string(),
                    text,
                };
                info!(slot, "{}", chat.to_string().trim_end());
                RelayOutcome::Broadcast(self.broadcast(&chat.to_frame()))
            }
        }
    }

    /// Ends a session and composes the leave notice.
    ///
    /// The notice is the same whatever the `reason`, so peers cannot tell a
    /// graceful logout from a dropped connection.  Returns `None` if the slot
    /// no longer belongs to `session`.
    pub fn terminate(
        &mut self,
        slot: SlotIndex,
        session: SessionId,
        reason: TerminationReason,
    ) -> Option<Termination<H>> {
        if !self.table.is_current(slot, session) {
            return None;
        }
        let released = self.table.release(slot)?;

        let left = ServerMessage::Left {
            name: released.name().to_string(),
            slots_free: self.table.remaining(),
        };
        info!(slot, ?reason, "{}", left.to_string().trim_end());

        let farewell =
            (reason == TerminationReason::Logout).then(|| ServerMessage::Logout.to_frame());
        let deliveries = self.broadcast(&left.to_frame());

        Some(Termination {
            session: released,
            farewell,
            deliveries,
        })
    }

    /// Removes a session without notifying anyone.  Used while draining,
    /// when every remaining client has already been told to close.
    pub fn evict(&mut self, slot: SlotIndex, session: SessionId) -> Option<Session<H>> {
        if !self.table.is_current(slot, session) {
            return None;
        }
        self.table.release(slot)
    }

    /// One `SERVER_END` frame for every active session.
    pub fn shutdown_notice(&self) -> Vec<Delivery> {
        self.broadcast(&ServerMessage::ServerEnd.to_frame())
    }

    fn broadcast(&self, frame: &Frame) -> Vec<Delivery> {
        self.table
            .active()
            .map(|s| Delivery {
                slot: s.slot(),
                session: s.id(),
                frame: frame.clone(),
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
