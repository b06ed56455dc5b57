//! Infrastructure layer for the relay server.
//!
//! Contains OS-facing adapters: the listening socket and per-client
//! connections, the operator console on stdin, and the configuration file.
//!
//! **Dependency rule**: this layer may depend on `domain` and `relay_core`,
//! but MUST NOT be imported by the `application` or domain layers.

pub mod console;
pub mod network;
pub mod storage;
