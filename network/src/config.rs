//! Server configuration with TOML file support.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wow_utils::LogFormat;

use crate::NetworkError;

/// Configuration for the quote server.
///
/// Can be loaded from a TOML file via [`ServerConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// How long a client has to return a solution, counted from stamp creation.
    #[serde(default = "default_challenge_expiration_ms")]
    pub challenge_expiration_ms: u64,

    /// Deadline for a whole connection, from accept to the quote.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Upper bound of a single accept wait before the loop re-checks for
    /// shutdown.
    #[serde(default = "default_accept_poll_ms")]
    pub accept_poll_ms: u64,

    /// Load tracker replenishment, in connections per second.
    #[serde(default = "default_bucket_rate")]
    pub bucket_rate: u32,

    /// Connections the load tracker absorbs before difficulty rises.
    #[serde(default = "default_bucket_capacity")]
    pub bucket_capacity: u32,

    /// Points of overflow per extra bit of difficulty.
    #[serde(default = "default_difficulty_step")]
    pub difficulty_step: u32,

    /// Longest solution line accepted from a client.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_challenge_expiration_ms() -> u64 {
    3_000
}

fn default_connection_timeout_ms() -> u64 {
    10_000
}

fn default_accept_poll_ms() -> u64 {
    200
}

fn default_bucket_rate() -> u32 {
    1
}

fn default_bucket_capacity() -> u32 {
    1_000
}

fn default_difficulty_step() -> u32 {
    100
}

fn default_max_line_len() -> usize {
    wow_work::DEFAULT_MAX_LINE_LEN
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, NetworkError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NetworkError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NetworkError> {
        toml::from_str(s).map_err(|e| NetworkError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NetworkError> {
        toml::to_string_pretty(self).map_err(|e| NetworkError::Config(e.to_string()))
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), NetworkError> {
        self.listen_addr.parse::<SocketAddr>().map_err(|e| {
            NetworkError::Config(format!("listen_addr {:?}: {e}", self.listen_addr))
        })?;

        let positive = [
            ("challenge_expiration_ms", self.challenge_expiration_ms),
            ("connection_timeout_ms", self.connection_timeout_ms),
            ("accept_poll_ms", self.accept_poll_ms),
            ("bucket_rate", u64::from(self.bucket_rate)),
            ("bucket_capacity", u64::from(self.bucket_capacity)),
            ("difficulty_step", u64::from(self.difficulty_step)),
            ("max_line_len", self.max_line_len as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(NetworkError::Config(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }

    pub fn challenge_expiration(&self) -> Duration {
        Duration::from_millis(self.challenge_expiration_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            challenge_expiration_ms: default_challenge_expiration_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
            accept_poll_ms: default_accept_poll_ms(),
            bucket_rate: default_bucket_rate(),
            bucket_capacity: default_bucket_capacity(),
            difficulty_step: default_difficulty_step(),
            max_line_len: default_max_line_len(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}
