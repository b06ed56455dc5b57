//! Network infrastructure for the relay server.
//!
//! # Sub-modules
//!
//! - **`connection`** – The per-client [`Connection`] handle (write half plus
//!   the reader task) and the [`SessionEvent`]s its reader reports back to the
//!   multiplexer.
//!
//! This module itself owns the listening socket helpers: binding the
//! listener once at startup and reading a newcomer's display name within the
//! admission timeout.

pub mod connection;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use relay_core::read_frame;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::info;

pub use connection::{spawn_reader, Connection, SessionEnvelope, SessionEvent};

/// Error type for the transport layer.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The listening socket could not be created.  This is the only error
    /// that stops the server.
    #[error("bind failed on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A newcomer did not send its display name in time.
    #[error("no display name received within {0:?}")]
    AdmissionTimeout(Duration),

    /// A newcomer hung up before sending its display name.
    #[error("connection closed before a display name was received")]
    ClosedBeforeName,
}

/// Binds the relay's listening socket.
///
/// # Errors
///
/// Returns [`RelayError::Bind`] if the address is in use or cannot be bound.
pub async fn bind_listener(addr: SocketAddr) -> Result<TcpListener, RelayError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| RelayError::Bind { addr, source })?;
    info!("relay listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Reads the first frame of a new connection and returns its payload as the
/// raw display name.
///
/// # Errors
///
/// - [`RelayError::AdmissionTimeout`] if nothing complete arrives within
///   `limit`.
/// - [`RelayError::ClosedBeforeName`] if the peer closes first.
/// - [`RelayError::Io`] for read failures, including a truncated frame.
pub async fn read_display_name<R>(reader: &mut R, limit: Duration) -> Result<String, RelayError>
where
    R: AsyncRead + Unpin,
{
    match timeout(limit, read_frame(reader)).await {
        Ok(Ok(Some(frame))) => Ok(frame.text().into_owned()),
        Ok(Ok(None)) => Err(RelayError::ClosedBeforeName),
        Ok(Err(e)) => Err(RelayError::Io(e)),
        Err(_) => Err(RelayError::AdmissionTimeout(limit)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
