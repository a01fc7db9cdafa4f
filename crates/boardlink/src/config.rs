//! Server configuration.
//!
//! Values are resolved in three layers, later ones winning:
//!
//! 1. built-in defaults ([`ServerConfig::default`])
//! 2. a JSON file named by `BOARDLINK_CONFIG`, if set
//! 3. environment overrides: `BOARDLINK_BIND`, `PORT`,
//!    `BOARDLINK_HEARTBEAT_MS`, `BOARDLINK_REAP_MS`, `BOARDLINK_FLUSH_MS`

use std::path::{Path, PathBuf};
use std::time::Duration;

use boardlink_relay::RelayConfig;
use boardlink_room::RegistryConfig;
use boardlink_transport::TransportConfig;
use serde::{Deserialize, Serialize};

/// Errors raised while resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`ServerConfig`].
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    /// A field that must be positive was zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket listener address.
    pub bind_addr: String,
    /// Period of the liveness sweep.
    pub heartbeat_interval_ms: u64,
    /// Period of the empty-room sweep.
    pub reap_interval_ms: u64,
    /// Coalescing window for relayed state.
    pub flush_interval_ms: u64,
    /// Relay sends are skipped while a destination has more than this many
    /// bytes waiting.
    pub max_buffered_bytes: usize,
    /// Display names are cut to this many characters.
    pub max_name_len: usize,
    /// Largest inbound WebSocket message.
    pub max_message_size: usize,
    /// Bound on the WebSocket upgrade handshake.
    pub handshake_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            heartbeat_interval_ms: 30_000,
            reap_interval_ms: 60_000,
            flush_interval_ms: 33,
            max_buffered_bytes: 1024 * 1024,
            max_name_len: 32,
            max_message_size: 1024 * 1024,
            handshake_timeout_ms: 5_000,
        }
    }
}

impl ServerConfig {
    /// Resolves configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration using `lookup` in place of the environment.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match lookup("BOARDLINK_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(bind) = lookup("BOARDLINK_BIND") {
            config.bind_addr = bind;
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = parse("PORT", &port)?;
            config.bind_addr = with_port(&config.bind_addr, port);
        }
        if let Some(ms) = lookup("BOARDLINK_HEARTBEAT_MS") {
            config.heartbeat_interval_ms = parse("BOARDLINK_HEARTBEAT_MS", &ms)?;
        }
        if let Some(ms) = lookup("BOARDLINK_REAP_MS") {
            config.reap_interval_ms = parse("BOARDLINK_REAP_MS", &ms)?;
        }
        if let Some(ms) = lookup("BOARDLINK_FLUSH_MS") {
            config.flush_interval_ms = parse("BOARDLINK_FLUSH_MS", &ms)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rejects values the timers and limits cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("reap_interval_ms", self.reap_interval_ms),
            ("flush_interval_ms", self.flush_interval_ms),
            ("handshake_timeout_ms", self.handshake_timeout_ms),
            ("max_message_size", self.max_message_size as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            max_message_size: self.max_message_size,
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
        }
    }

    pub(crate) fn relay(&self) -> RelayConfig {
        RelayConfig {
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            max_buffered_bytes: self.max_buffered_bytes,
        }
    }

    pub(crate) fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            max_name_len: self.max_name_len,
        }
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// Replaces the port of `addr`, keeping its host.
fn with_port(addr: &str, port: u16) -> String {
    let host = match addr.rsplit_once(':') {
        Some((host, _)) => host,
        None => addr,
    };
    format!("{host}:{port}")
}
