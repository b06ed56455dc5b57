//! Operator console: commands typed on the server's standard input.
//!
//! The only command is `SERVER_END`, which starts the graceful shutdown
//! sequence.  Anything else is reported and ignored.
//!
//! # Why a dedicated thread? (for beginners)
//!
//! Reading stdin is a blocking call.  Tokio's own `tokio::io::stdin()` runs
//! that call on the blocking pool, and a read that never returns would keep
//! the runtime from shutting down.  A plain `std::thread` has no such
//! problem: when `main` returns the process exits, whatever that thread is
//! doing.  Lines are handed to the async side with
//! [`mpsc::Sender::blocking_send`].

use std::io::{self, BufRead};
use std::thread;

use relay_core::protocol::SERVER_END_TOKEN;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A recognised operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Broadcast `SERVER_END`, drain every session, then exit.
    ServerEnd,
}

/// Why a console line was not a command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("empty console line")]
    Empty,
    #[error("unknown console command {0:?} (expected SERVER_END)")]
    Unknown(String),
}

impl OperatorCommand {
    /// Parses one console line.  Surrounding whitespace is ignored; the
    /// command itself is case-sensitive.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Empty`] for a blank line and
    /// [`ConsoleError::Unknown`] for anything else that is not a command.
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        match line.trim() {
            "" => Err(ConsoleError::Empty),
            SERVER_END_TOKEN => Ok(Self::ServerEnd),
            other => Err(ConsoleError::Unknown(other.to_string())),
        }
    }
}

/// Starts the thread that forwards stdin lines to `tx`.
///
/// # Errors
///
/// Returns an error if the OS refuses to create the thread.
pub fn spawn_stdin_reader(tx: mpsc::Sender<String>) -> io::Result<thread::JoinHandle<()>> {
    spawn_line_reader("console-stdin", io::BufReader::new(io::stdin()), tx)
}

/// Turns Ctrl+C presses, delivered as `()` on `interrupts`, into operator
/// input.
///
/// The first press sends `SERVER_END` on `console`, exactly as if the
/// operator had typed it.  Returns `true` when a second press arrives (the
/// operator does not want to wait for the drain) and `false` if the
/// interrupt source goes away first.
pub async fn forward_interrupts(
    mut interrupts: mpsc::Receiver<()>,
    console: mpsc::Sender<String>,
) -> bool {
    if interrupts.recv().await.is_none() {
        return false;
    }
    info!("received Ctrl+C; shutting down (press again to exit immediately)");
    if let Err(e) = console.send(SERVER_END_TOKEN.to_string()).await {
        debug!("relay already stopped; SERVER_END not forwarded: {e}");
    }

    interrupts.recv().await.is_some()
}

/// Forwards each line of `input` to `tx` until end of input, a read error,
/// or the receiver going away.
fn spawn_line_reader<R>(
    name: &str,
    input: R,
    tx: mpsc::Sender<String>,
) -> io::Result<thread::JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new().name(name.to_string()).spawn(move || {
        for line in input.lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!("console read failed: {e}");
                    return;
                }
            }
        }
        debug!("console input closed");
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
