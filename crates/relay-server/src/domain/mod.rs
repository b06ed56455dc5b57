//! Domain layer for the relay server.
//!
//! Pure types with no sockets, no async and no file access:
//!
//! - **`session_table`** – the fixed-capacity slot arena holding admitted
//!   sessions.
//! - **`config`** – the runtime settings the multiplexer runs with.

pub mod config;
pub mod session_table;

pub use config::RelayConfig;
pub use session_table::{Session, SessionId, SessionTable, SlotIndex, TableError};
