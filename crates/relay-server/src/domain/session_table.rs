//! SessionTable: the fixed-capacity registry of admitted clients.
//!
//! The table is an arena of slots addressed by a stable index.  Each slot is
//! either `Empty` or holds one `Active` session:
//!
//! ```text
//!  slot:   0        1        2        3
//!        ┌────────┬────────┬────────┬────────┐
//!        │ alice  │ Empty  │ carol  │ Empty  │   capacity = 4, active = 2
//!        └────────┴────────┴────────┴────────┘
//! ```
//!
//! Admission always takes the lowest-index `Empty` slot, so after `alice`
//! leaves the next newcomer lands in slot 0 again.  The table never grows:
//! once every slot is `Active`, [`SessionTable::admit`] refuses.
//!
//! The table is generic over the connection handle `H` so the lifecycle
//! rules can be tested without sockets.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Index of a slot in the table, in `0..capacity`.
pub type SlotIndex = usize;

/// Identifies one occupancy of a slot.
///
/// Slot indices are reused, so an event that was produced for the previous
/// occupant of slot 3 must not be applied to the current one.  Every
/// admission gets a fresh `SessionId` to tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Error type for session table operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("session table capacity must be at least 1")]
    ZeroCapacity,
    #[error("all {capacity} session slots are in use")]
    Full { capacity: usize },
}

/// One admitted client.
#[derive(Debug)]
pub struct Session<H> {
    slot: SlotIndex,
    id: SessionId,
    name: String,
    handle: H,
}

impl<H> Session<H> {
    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Display name captured at admission; never changes afterwards.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut H {
        &mut self.handle
    }

    /// Gives up the session record, returning the connection handle so the
    /// caller can close it.
    pub fn into_handle(self) -> H {
        self.handle
    }
}

#[derive(Debug)]
enum Slot<H> {
    Empty,
    Active(Session<H>),
}

/// Fixed-capacity arena of sessions.
#[derive(Debug)]
pub struct SessionTable<H> {
    slots: Vec<Slot<H>>,
    active: usize,
}

impl<H> SessionTable<H> {
    /// Creates a table with `capacity` empty slots.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::ZeroCapacity`] if `capacity` is 0; such a relay
    /// could never admit anyone.
    pub fn with_capacity(capacity: usize) -> Result<Self, TableError> {
        if capacity == 0 {
            return Err(TableError::ZeroCapacity);
        }
        let slots = (0..capacity).map(|_| Slot::Empty).collect();
        Ok(Self { slots, active: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Number of slots still free.
    pub fn remaining(&self) -> usize {
        self.capacity() - self.active
    }

    pub fn is_full(&self) -> bool {
        self.active == self.capacity()
    }

    /// Lowest-index `Empty` slot, if any.
    pub fn lowest_free(&self) -> Option<SlotIndex> {
        self.slots.iter().position(|s| matches!(s, Slot::Empty))
    }

    /// Registers a new session in the lowest free slot.
    ///
    /// Returns the slot and the fresh [`SessionId`] of its new occupant.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Full`] when every slot is active.
    pub fn admit(&mut self, name: String, handle: H) -> Result<(SlotIndex, SessionId), TableError> {
        let slot = self.lowest_free().ok_or(TableError::Full {
            capacity: self.capacity(),
        })?;
        let id = SessionId::new();
        self.slots[slot] = Slot::Active(Session {
            slot,
            id,
            name,
            handle,
        });
        self.active += 1;
        Ok((slot, id))
    }

    /// Frees `slot`, handing the session (and its handle) back to the caller.
    ///
    /// Returns `None` if the slot was already empty or out of range.
    pub fn release(&mut self, slot: SlotIndex) -> Option<Session<H>> {
        let entry = self.slots.get_mut(slot)?;
        match std::mem::replace(entry, Slot::Empty) {
            Slot::Active(session) => {
                self.active -= 1;
                Some(session)
            }
            Slot::Empty => None,
        }
    }

    pub fn get(&self, slot: SlotIndex) -> Option<&Session<H>> {
        match self.slots.get(slot)? {
            Slot::Active(session) => Some(session),
            Slot::Empty => None,
        }
    }

    pub fn get_mut(&mut self, slot: SlotIndex) -> Option<&mut Session<H>> {
        match self.slots.get_mut(slot)? {
            Slot::Active(session) => Some(session),
            Slot::Empty => None,
        }
    }

    /// `true` if `slot` is active and still occupied by session `id`.
    pub fn is_current(&self, slot: SlotIndex, id: SessionId) -> bool {
        self.get(slot).is_some_and(|s| s.id == id)
    }

    /// Active sessions in slot order.
    pub fn active(&self) -> impl Iterator<Item = &Session<H>> {
        self.slots.iter().filter_map(|s| match s {
            Slot::Active(session) => Some(session),
            Slot::Empty => None,
        })
    }

    /// `(slot, id)` of every active session, in slot order.
    pub fn active_slots(&self) -> Vec<(SlotIndex, SessionId)> {
        self.active().map(|s| (s.slot, s.id)).collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
