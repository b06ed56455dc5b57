//! Chat relay terminal client entry point.
//!
//! # Usage
//!
//! ```text
//! relay-client [OPTIONS]
//!
//! Options:
//!   --server <ADDR>  Relay address [default: 127.0.0.1:10000]
//!   --name   <NAME>  Display name (asked for interactively if omitted)
//! ```
//!
//! Every line typed is sent as a chat message.  Type `LOGOUT` (or close
//! stdin) to leave.
//!
//! # Exit status (for beginners)
//!
//! | Status | Meaning                                            |
//! |--------|----------------------------------------------------|
//! | 0      | Logged out, or the relay announced `SERVER_END`    |
//! | 1      | The relay disappeared, or the connection failed    |

use std::io;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use relay_client::application::{run_session, SessionEnd};
use relay_client::infrastructure::terminal::{prompt_name, spawn_stdin_lines};

/// Typed lines waiting to be sent.
const INPUT_CHANNEL_CAPACITY: usize = 64;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Terminal client for the chat relay.
#[derive(Debug, Parser)]
#[command(name = "relay-client", about = "Chat with everyone on a relay", version)]
struct Cli {
    /// Relay address as `host:port`.
    #[arg(long, env = "RELAY_SERVER", default_value = "127.0.0.1:10000")]
    server: String,

    /// Display name shown to other users.
    #[arg(long, env = "RELAY_NAME")]
    name: Option<String>,
}

impl Cli {
    /// The `--name` value trimmed, if it has anything left.
    fn given_name(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Quiet by default so logs don't interleave with the chat.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let name = match cli.given_name() {
        Some(name) => name,
        None => {
            let prompted =
                tokio::task::spawn_blocking(|| prompt_name(io::stdin().lock(), io::stdout()))
                    .await
                    .context("name prompt task failed")?
                    .context("failed to read display name")?;
            match prompted {
                Some(name) => name,
                None => bail!("no display name given"),
            }
        }
    };

    let stream = TcpStream::connect(&cli.server)
        .await
        .with_context(|| format!("cannot connect to {}", cli.server))?;
    info!(server = %cli.server, %name, "connected");
    let (read_half, write_half) = stream.into_split();

    let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
    spawn_stdin_lines(input_tx).context("failed to start input reader")?;

    let mut stdout = tokio::io::stdout();
    let end = run_session(read_half, write_half, &name, input_rx, &mut stdout).await?;

    Ok(match end {
        SessionEnd::LoggedOut => {
            println!("logged out");
            ExitCode::SUCCESS
        }
        SessionEnd::ServerEnded => {
            println!("server has shut down");
            ExitCode::SUCCESS
        }
        SessionEnd::ServerVanished => {
            eprintln!("server ended unexpectedly");
            ExitCode::FAILURE
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
