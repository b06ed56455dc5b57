//! The relay's message vocabulary.
//!
//! The protocol is deliberately tiny.  After connecting, a client sends its
//! display name as the first frame; every later frame is either the literal
//! `LOGOUT` token or a chat line.  The server answers with a handful of
//! human-readable notices and two control tokens:
//!
//! | Direction       | Payload                                               |
//! |-----------------|-------------------------------------------------------|
//! | client → server | `<display name>` (first frame only)                   |
//! | client → server | `LOGOUT`                                              |
//! | client → server | `<chat text>`                                         |
//! | server → client | `-><name> has logged in, N slots free\n` (+ warning)  |
//! | server → client | `-><name> is already logged in\n`                     |
//! | server → client | `<name>: <text>\n`                                    |
//! | server → client | `<-<name> has logged out, N slots free\n`             |
//! | server → client | `LOGOUT` (you may close now)                          |
//! | server → client | `SERVER_END` (close unconditionally)                  |

use std::fmt;

use crate::protocol::frame::{floor_char_boundary, Frame, MAX_PAYLOAD};

/// Token a client sends to leave, and the server echoes back to confirm.
pub const LOGOUT_TOKEN: &str = "LOGOUT";

/// Token the server broadcasts when the operator shuts it down.
pub const SERVER_END_TOKEN: &str = "SERVER_END";

/// Appended to the join notice that fills the last free slot.
pub const CAPACITY_WARNING: &str = "** user limit reached **\n";

/// Widest rendering of a slot count (`u64::MAX` has 20 digits).
const MAX_COUNT_DIGITS: usize = 20;

/// Bytes the join notice that fills the last slot adds around the name.
const JOIN_FULL_OVERHEAD: usize = "->".len()
    + " has logged in, ".len()
    + "0".len()
    + " slots free\n".len()
    + CAPACITY_WARNING.len();

/// Bytes any other join notice adds around the name.
const JOIN_OVERHEAD: usize =
    "->".len() + " has logged in, ".len() + MAX_COUNT_DIGITS + " slots free\n".len();

/// Bytes a leave notice adds around the name.
const LEAVE_OVERHEAD: usize =
    "<-".len() + " has logged out, ".len() + MAX_COUNT_DIGITS + " slots free\n".len();

const fn max(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

/// Longest display name the server keeps.
///
/// Every notice that carries a name still fits in one frame, newline and
/// capacity warning included.
pub const MAX_NAME_LEN: usize =
    MAX_PAYLOAD - max(JOIN_FULL_OVERHEAD, max(JOIN_OVERHEAD, LEAVE_OVERHEAD));

/// Trims surrounding whitespace (including a trailing `\r\n` some clients
/// send) and cuts the name to [`MAX_NAME_LEN`] bytes on a character
/// boundary.
pub fn clamp_display_name(raw: &str) -> &str {
    let name = raw.trim();
    &name[..floor_char_boundary(name, MAX_NAME_LEN)]
}

/// A frame received by the server from an already admitted client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// The client asks to leave.
    Logout,
    /// Anything else is chat text, relayed verbatim.
    Chat(String),
}

impl ClientMessage {
    /// Classifies a payload.  Only an exact `LOGOUT` match counts as a
    /// logout; `logout` or `LOGOUT ` are ordinary chat.
    pub fn from_payload(payload: &str) -> Self {
        if payload == LOGOUT_TOKEN {
            Self::Logout
        } else {
            Self::Chat(payload.to_string())
        }
    }

    /// Decodes a frame received from the wire.
    pub fn from_frame(frame: &Frame) -> Self {
        Self::from_payload(&frame.text())
    }

    /// Encodes the message for the wire, truncating oversized chat text.
    pub fn to_frame(&self) -> Frame {
        match self {
            Self::Logout => Frame::from_text(LOGOUT_TOKEN),
            Self::Chat(text) => Frame::from_text(text),
        }
    }
}

/// A frame produced by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Broadcast to everyone when a client is admitted.
    Joined {
        name: String,
        slots_free: usize,
        capacity_reached: bool,
    },
    /// Sent privately to a newcomer, once per peer already present.
    AlreadyPresent { name: String },
    /// A relayed chat line.
    Chat { name: String, text: String },
    /// Broadcast to the remaining clients when a session ends.
    Left { name: String, slots_free: usize },
    /// Echoed to a client that asked to log out.
    Logout,
    /// Broadcast when the operator ends the server.
    ServerEnd,
}

impl ServerMessage {
    /// Renders the message into a frame.  Text that does not fit is cut at the
    /// frame boundary, same as any other oversized payload.
    pub fn to_frame(&self) -> Frame {
        Frame::from_text(&self.to_string())
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined {
                name,
                slots_free,
                capacity_reached,
            } => {
                writeln!(f, "->{name} has logged in, {slots_free} slots free")?;
                if *capacity_reached {
                    f.write_str(CAPACITY_WARNING)?;
                }
                Ok(())
            }
            Self::AlreadyPresent { name } => writeln!(f, "->{name} is already logged in"),
            Self::Chat { name, text } => writeln!(f, "{name}: {text}"),
            Self::Left { name, slots_free } => {
                writeln!(f, "<-{name} has logged out, {slots_free} slots free")
            }
            Self::Logout => f.write_str(LOGOUT_TOKEN),
            Self::ServerEnd => f.write_str(SERVER_END_TOKEN),
        }
    }
}

/// What a client makes of a frame it received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerSignal {
    /// The server confirmed our logout; close and exit.
    Logout,
    /// The server is shutting down; close and exit.
    ServerEnd,
    /// Anything else is printed verbatim.
    Notice(String),
}

impl ServerSignal {
    /// Classifies a payload received by a client.
    pub fn from_payload(payload: &str) -> Self {
        match payload {
            LOGOUT_TOKEN => Self::Logout,
            SERVER_END_TOKEN => Self::ServerEnd,
            other => Self::Notice(other.to_string()),
        }
    }

    /// Decodes a frame received from the wire.
    pub fn from_frame(frame: &Frame) -> Self {
        Self::from_payload(&frame.text())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
