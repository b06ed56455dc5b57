//! # relay-core
//!
//! Shared wire protocol for the chat relay.  Both the server and the terminal
//! client depend on this crate.  It opens no sockets itself; the stream
//! helpers work on any `AsyncRead`/`AsyncWrite` the caller hands in.
//!
//! # Protocol overview (for beginners)
//!
//! Every message on the wire is a *frame* of exactly 128 bytes holding a
//! NUL-terminated string.  The first frame a client sends is its display
//! name.  After that, clients send chat lines or the `LOGOUT` token, and the
//! server sends back notices (joins, leaves, relayed chat) plus the `LOGOUT`
//! and `SERVER_END` control tokens.
//!
//! - **`protocol::frame`** – building and decoding fixed-size frames.
//! - **`protocol::messages`** – the typed vocabulary carried inside frames.
//! - **`protocol::stream`** – reading and writing whole frames on a stream.

pub mod protocol;

pub use protocol::frame::{Frame, ProtocolError, FRAME_SIZE};
pub use protocol::messages::{ClientMessage, ServerMessage, ServerSignal};
pub use protocol::stream::{read_frame, write_frame, FrameReader};
