//! Application layer use cases for the relay server.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The application layer sits between the domain (the session table and its
//! invariants) and the infrastructure (sockets, stdin, files).  It decides
//! *what* should happen when a client joins, speaks, or leaves, and hands
//! the resulting frames back to the caller to write.  Nothing in here opens
//! a socket, so every rule can be unit-tested with plain values.
//!
//! # Sub-modules
//!
//! - **`session_lifecycle`** – Admission, relay of chat lines, termination
//!   with leave notices, and the `SERVER_END` broadcast used on shutdown.

pub mod session_lifecycle;

pub use session_lifecycle::{
    Admission, Delivery, LifecycleError, RelayOutcome, SessionLifecycle, Termination,
    TerminationReason,
};
