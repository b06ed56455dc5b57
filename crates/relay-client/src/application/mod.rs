//! Application layer for the terminal client.
//!
//! - **`chat_session`** – The session state machine: send the name, print
//!   what the relay says, forward what the user types, and recognise the two
//!   ways a session ends cleanly (`LOGOUT` echo and `SERVER_END`).

pub mod chat_session;

pub use chat_session::{run_session, ClientError, SessionEnd};
