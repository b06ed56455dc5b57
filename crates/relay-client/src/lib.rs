//! relay-client library entry point.
//!
//! Re-exports all public modules so that the binary entry point in
//! `main.rs` and the unit tests share the same module tree.
//!
//! # What does relay-client do? (for beginners)
//!
//! It is the smallest useful front end for the chat relay:
//!
//! 1. Connects to the relay over TCP and sends the user's display name.
//! 2. Prints every notice and chat line the relay sends.
//! 3. Sends every line the user types as a chat message.
//! 4. Leaves with `LOGOUT` (typed, or on end of input), and exits when the
//!    relay confirms or announces `SERVER_END`.

pub mod application;
pub mod infrastructure;
