//! Terminal input for the client.
//!
//! Stdin is read on a plain `std::thread` so that a read blocked waiting
//! for the user never keeps the Tokio runtime from exiting once the session
//! is over.

use std::io::{self, BufRead, Write};
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Asks for a display name until a non-blank one is entered.
///
/// Returns `Ok(None)` if input ends first.
///
/// # Errors
///
/// Returns any error from reading `input` or writing the prompt.
pub fn prompt_name<R, W>(mut input: R, mut prompt_out: W) -> io::Result<Option<String>>
where
    R: BufRead,
    W: Write,
{
    loop {
        write!(prompt_out, "display name: ")?;
        prompt_out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let name = line.trim();
        if !name.is_empty() {
            return Ok(Some(name.to_string()));
        }
    }
}

/// Starts the thread that forwards stdin lines to `tx`.
///
/// # Errors
///
/// Returns an error if the OS refuses to create the thread.
pub fn spawn_stdin_lines(tx: mpsc::Sender<String>) -> io::Result<thread::JoinHandle<()>> {
    spawn_lines(io::BufReader::new(io::stdin()), tx)
}

fn spawn_lines<R>(input: R, tx: mpsc::Sender<String>) -> io::Result<thread::JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("client-stdin".to_string())
        .spawn(move || {
            for line in input.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("stdin read failed: {e}");
                        break;
                    }
                };
                if tx.blocking_send(line).is_err() {
                    return;
                }
            }
            debug!("stdin closed");
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
