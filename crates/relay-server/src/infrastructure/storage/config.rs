//! TOML-based configuration for the relay server.
//!
//! The file is optional.  When it is absent every setting takes its default,
//! and any section or field left out of an existing file does too:
//!
//! ```toml
//! [server]
//! log_level = "info"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! port = 10000
//!
//! [sessions]
//! capacity = 10
//! admission_timeout_ms = 5000
//! drain_timeout_secs = 30
//! ```
//!
//! Command-line flags are applied on top of the loaded file in `main.rs`,
//! and [`ServerConfig::to_relay_config`] validates the result.
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{RelayConfig, DEFAULT_CAPACITY, DEFAULT_PORT};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The values parsed but make no sense together.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level relay configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub sessions: SessionSection,
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSection {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Listening socket settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port clients connect to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Session table and timing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSection {
    /// Maximum number of simultaneously connected clients.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// How long a newcomer has to send its display name.
    #[serde(default = "default_admission_timeout_ms")]
    pub admission_timeout_ms: u64,
    /// How long shutdown waits for clients to close after `SERVER_END`.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_admission_timeout_ms() -> u64 {
    5_000
}
fn default_drain_timeout_secs() -> u64 {
    30
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            admission_timeout_ms: default_admission_timeout_ms(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// Checks the values without building anything.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_relay_config().map(|_| ())
    }

    /// Builds the runtime settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the bind address is not an IP
    /// address, the capacity is 0, or either timeout is 0.
    pub fn to_relay_config(&self) -> Result<RelayConfig, ConfigError> {
        let ip: IpAddr = self.network.bind_address.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "bind_address {:?} is not an IP address",
                self.network.bind_address
            ))
        })?;
        if self.sessions.capacity == 0 {
            return Err(ConfigError::Invalid("capacity must be at least 1".into()));
        }
        if self.sessions.admission_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "admission_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.sessions.drain_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "drain_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(RelayConfig {
            bind_addr: SocketAddr::new(ip, self.network.port),
            capacity: self.sessions.capacity,
            admission_timeout: Duration::from_millis(self.sessions.admission_timeout_ms),
            drain_timeout: Duration::from_secs(self.sessions.drain_timeout_secs),
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `ServerConfig` from `path`, returning `ServerConfig::default()` if
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(file: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("relay-config-test-{}", uuid::Uuid::new_v4()))
            .join(file)
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_default_config_matches_relay_defaults() {
        // Arrange / Act
        let relay = ServerConfig::default().to_relay_config().unwrap();

        // Assert
        assert_eq!(relay, RelayConfig::default());
    }

    #[test]
    fn test_default_log_level_is_info() {
        assert_eq!(ServerConfig::default().server.log_level, "info");
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_partial_toml_fills_missing_fields() {
        // Arrange
        let text = "[sessions]\ncapacity = 3\n";

        // Act
        let cfg: ServerConfig = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(cfg.sessions.capacity, 3);
        assert_eq!(cfg.sessions.drain_timeout_secs, 30);
        assert_eq!(cfg.network.port, 10000);
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_zero_capacity_is_invalid() {
        let mut cfg = ServerConfig::default();
        cfg.sessions.capacity = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_hostname_bind_address_is_invalid() {
        let mut cfg = ServerConfig::default();
        cfg.network.bind_address = "localhost".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("localhost"));
    }

    #[test]
    fn test_zero_timeouts_are_invalid() {
        let mut cfg = ServerConfig::default();
        cfg.sessions.admission_timeout_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ServerConfig::default();
        cfg.sessions.drain_timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_to_relay_config_converts_units() {
        // Arrange
        let mut cfg = ServerConfig::default();
        cfg.network.bind_address = "127.0.0.1".to_string();
        cfg.network.port = 4000;
        cfg.sessions.admission_timeout_ms = 250;
        cfg.sessions.drain_timeout_secs = 2;

        // Act
        let relay = cfg.to_relay_config().unwrap();

        // Assert
        assert_eq!(relay.bind_addr, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(relay.admission_timeout, Duration::from_millis(250));
        assert_eq!(relay.drain_timeout, Duration::from_secs(2));
    }

    // ── File I/O ──────────────────────────────────────────────────────────────

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let cfg = load_config(&scratch_path("absent.toml")).unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        // Arrange
        let path = scratch_path("relay.toml");
        let mut cfg = ServerConfig::default();
        cfg.sessions.capacity = 2;
        cfg.server.log_level = "debug".to_string();

        // Act
        save_config(&path, &cfg).unwrap();
        let loaded = load_config(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_malformed_file_is_parse_error() {
        // Arrange
        let path = scratch_path("broken.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[sessions\ncapacity = ").unwrap();

        // Act
        let result = load_config(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
