//! The client side of one chat session.
//!
//! [`run_session`] sends the display name, then waits on two sources at
//! once: frames from the relay and lines typed by the user.
//!
//! ```text
//!   relay ──frame──► ServerSignal::Notice   → printed as-is
//!                    ServerSignal::Logout   → session over (we asked to leave)
//!                    ServerSignal::ServerEnd → session over (relay shutting down)
//!                    EOF                    → session over (relay vanished)
//!
//!   user  ──line───► chat frame (blank lines skipped)
//!                    "LOGOUT" → sent, then wait for the relay's echo
//!                    end of input → LOGOUT sent on the user's behalf
//! ```
//!
//! The relay is polled first, so a burst of typing never delays the
//! `SERVER_END` notice.

use std::io;

use relay_core::{write_frame, ClientMessage, Frame, FrameReader, ServerSignal};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Errors that end a session abnormally.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Reading from or writing to the relay failed.
    #[error("connection I/O error: {0}")]
    Connection(#[from] io::Error),

    /// Printing to the terminal failed.
    #[error("terminal output error: {0}")]
    Output(#[source] io::Error),
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The relay confirmed our `LOGOUT`.
    LoggedOut,
    /// The operator shut the relay down.
    ServerEnded,
    /// The relay closed the connection without either handshake.
    ServerVanished,
}

/// Runs one session to completion.
///
/// `input` carries the user's lines; when it closes the client logs out.
/// Notices from the relay are written to `output` verbatim.
///
/// # Errors
///
/// Returns [`ClientError::Connection`] if the socket fails and
/// [`ClientError::Output`] if `output` cannot be written.
pub async fn run_session<R, W, O>(
    reader: R,
    mut writer: W,
    name: &str,
    mut input: mpsc::Receiver<String>,
    output: &mut O,
) -> Result<SessionEnd, ClientError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut frames = FrameReader::new(reader);
    write_frame(&mut writer, &Frame::from_text(name)).await?;
    debug!("display name sent");

    let mut input_open = true;
    let mut logout_sent = false;

    loop {
        tokio::select! {
            biased;

            received = frames.next_frame() => {
                let Some(frame) = received? else {
                    return Ok(if logout_sent {
                        SessionEnd::LoggedOut
                    } else {
                        SessionEnd::ServerVanished
                    });
                };
                match ServerSignal::from_frame(&frame) {
                    ServerSignal::Logout => return Ok(SessionEnd::LoggedOut),
                    ServerSignal::ServerEnd => return Ok(SessionEnd::ServerEnded),
                    ServerSignal::Notice(text) => {
                        output
                            .write_all(text.as_bytes())
                            .await
                            .map_err(ClientError::Output)?;
                        output.flush().await.map_err(ClientError::Output)?;
                    }
                }
            }

            line = input.recv(), if input_open => {
                let message = match line {
                    Some(line) => {
                        let text = line.trim_end_matches(['\r', '\n']);
                        if text.trim().is_empty() {
                            continue;
                        }
                        ClientMessage::from_payload(text)
                    }
                    None => {
                        info!("input closed; logging out");
                        input_open = false;
                        if logout_sent {
                            continue;
                        }
                        ClientMessage::Logout
                    }
                };

                write_frame(&mut writer, &message.to_frame()).await?;
                if message == ClientMessage::Logout {
                    debug!("LOGOUT sent; waiting for the relay to confirm");
                    logout_sent = true;
                    input_open = false;
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
