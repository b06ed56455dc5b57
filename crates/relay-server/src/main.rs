//! Chat relay server entry point.
//!
//! Accepts up to `capacity` chat clients on one TCP port, relays every chat
//! line to everyone, announces joins and leaves, and shuts down gracefully
//! when the operator types `SERVER_END` (or presses Ctrl+C).
//!
//! # Usage
//!
//! ```text
//! relay-server [OPTIONS]
//!
//! Options:
//!   --config        <PATH>  TOML config file (missing file = defaults)
//!   --bind          <IP>    Address to listen on [default: 0.0.0.0]
//!   --port          <PORT>  TCP port [default: 10000]
//!   --capacity      <N>     Maximum concurrent clients [default: 10]
//!   --drain-timeout <SECS>  Shutdown drain limit [default: 30]
//!   --write-config  <PATH>  Write the effective config as TOML and exit
//! ```
//!
//! # Precedence
//!
//! CLI flag (or its environment variable) > config file > built-in default.
//!
//! | Variable              | Flag              |
//! |-----------------------|-------------------|
//! | `RELAY_CONFIG`        | `--config`        |
//! | `RELAY_BIND`          | `--bind`          |
//! | `RELAY_PORT`          | `--port`          |
//! | `RELAY_CAPACITY`      | `--capacity`      |
//! | `RELAY_DRAIN_TIMEOUT` | `--drain-timeout` |

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use relay_server::infrastructure::console::{forward_interrupts, spawn_stdin_reader};
use relay_server::infrastructure::network::bind_listener;
use relay_server::infrastructure::storage::config::{load_config, save_config, ServerConfig};
use relay_server::multiplexer::Multiplexer;

/// Operator console lines waiting to be handled.
const CONSOLE_CHANNEL_CAPACITY: usize = 16;

/// Ctrl+C presses not yet handled.
const INTERRUPT_CHANNEL_CAPACITY: usize = 4;

/// Conventional status for a process ended by SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Multi-client chat relay.
#[derive(Debug, Parser)]
#[command(
    name = "relay-server",
    about = "Fixed-capacity chat relay with join/leave notices",
    version
)]
struct Cli {
    /// Path of the TOML configuration file.
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to listen on.
    #[arg(long, env = "RELAY_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "RELAY_PORT")]
    port: Option<u16>,

    /// Maximum number of simultaneously connected clients.
    #[arg(long, env = "RELAY_CAPACITY")]
    capacity: Option<usize>,

    /// Seconds to wait for clients to disconnect after `SERVER_END`.
    #[arg(long, env = "RELAY_DRAIN_TIMEOUT")]
    drain_timeout: Option<u64>,

    /// Write the effective configuration (file plus flags) to this path as
    /// TOML and exit.
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

impl Cli {
    /// Overrides the file settings with whatever was given on the command
    /// line.
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(bind) = &self.bind {
            config.network.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(capacity) = self.capacity {
            config.sessions.capacity = capacity;
        }
        if let Some(secs) = self.drain_timeout {
            config.sessions.drain_timeout_secs = secs;
        }
    }

    fn load(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    /// Handles `--write-config`.  Returns the path written, if any; the
    /// process should then exit.
    fn export(&self, config: &ServerConfig) -> anyhow::Result<Option<&Path>> {
        let Some(path) = self.write_config.as_deref() else {
            return Ok(None);
        };
        config
            .validate()
            .context("refusing to write an invalid configuration")?;
        save_config(path, config)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(Some(path))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.load()?;
    if let Some(path) = cli.export(&settings)? {
        println!("configuration written to {}", path.display());
        return Ok(());
    }

    // `RUST_LOG` wins; otherwise use the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.server.log_level)),
        )
        .init();

    let config = settings
        .to_relay_config()
        .context("invalid configuration")?;
    info!(
        "chat relay starting: capacity {}, drain timeout {:?}",
        config.capacity, config.drain_timeout
    );

    let listener = bind_listener(config.bind_addr)
        .await
        .with_context(|| format!("cannot listen on {}", config.bind_addr))?;

    // ── Operator console ──────────────────────────────────────────────────────
    let (console_tx, console_rx) = mpsc::channel(CONSOLE_CHANNEL_CAPACITY);
    spawn_stdin_reader(console_tx.clone()).context("failed to start console reader")?;

    // Ctrl+C takes the same path as typing SERVER_END; a second one exits
    // without waiting for the drain.
    let (interrupt_tx, interrupt_rx) = mpsc::channel(INTERRUPT_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for Ctrl+C signal: {e}");
                return;
            }
            if interrupt_tx.send(()).await.is_err() {
                return;
            }
        }
    });
    tokio::spawn(async move {
        if forward_interrupts(interrupt_rx, console_tx).await {
            warn!("second Ctrl+C; exiting without waiting for clients");
            std::process::exit(EXIT_INTERRUPTED);
        }
    });

    // ── Main loop ─────────────────────────────────────────────────────────────
    let relay = Multiplexer::new(config, listener, console_rx)?;
    let report = relay.run().await?;

    info!(
        "chat relay stopped: {} session(s) drained, {} closed by the server",
        report.drained, report.forced
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
