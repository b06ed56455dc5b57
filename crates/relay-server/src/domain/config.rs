//! Runtime relay settings.
//!
//! [`RelayConfig`] is the single source of truth the multiplexer runs with.
//! It is built once at startup from the config file and CLI flags (see
//! `infrastructure::storage::config` and `main.rs`), or from defaults in
//! tests.  Keeping it a plain struct with no file or environment access
//! makes the multiplexer easy to start on an ephemeral port in tests.

use std::net::SocketAddr;
use std::time::Duration;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 10000;

/// Default number of concurrent sessions.
pub const DEFAULT_CAPACITY: usize = 10;

/// All runtime configuration for the relay server.
///
/// # Example
///
/// ```rust
/// use relay_server::domain::config::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 10000);
/// assert_eq!(cfg.capacity, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the listener binds to.  `0.0.0.0` accepts on all interfaces.
    pub bind_addr: SocketAddr,

    /// Maximum number of simultaneously active sessions.
    pub capacity: usize,

    /// How long a freshly accepted connection may take to send its display
    /// name before it is dropped.  The loop waits for the name inline, so
    /// this also bounds how long one slow newcomer can stall everyone else.
    pub admission_timeout: Duration,

    /// After `SERVER_END`, how long to wait for clients to close their
    /// sockets before the remaining ones are closed by the server.
    pub drain_timeout: Duration,
}

impl Default for RelayConfig {
    /// | Field             | Default         |
    /// |-------------------|-----------------|
    /// | bind_addr         | `0.0.0.0:10000` |
    /// | capacity          | 10              |
    /// | admission_timeout | 5 seconds       |
    /// | drain_timeout     | 30 seconds      |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            capacity: DEFAULT_CAPACITY,
            admission_timeout: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
