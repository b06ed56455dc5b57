//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the relay's TOML settings file, falls back
//! to defaults when it does not exist, validates the values, and turns them
//! into the [`RelayConfig`](crate::domain::RelayConfig) the multiplexer runs
//! with.

pub mod config;
