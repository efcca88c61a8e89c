//! Runtime configuration
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields a working setup. `RUST_LOG` controls logging separately.

use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

/// Environment variable naming an optional JSON config file
pub const CONFIG_ENV: &str = "TCP_MUX_CONFIG";

/// Multiplexer configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Interface the listener binds to
    pub host: String,
    /// Default port (the CLI argument overrides it)
    pub port: u16,
    /// Buffer size of the two event channels feeding the dispatcher
    pub event_buffer: usize,
    /// Buffer size of each client's outbound line channel
    pub client_buffer: usize,
    /// Maximum number of handler callbacks executing at once (clamped by the pool)
    pub max_in_flight: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            event_buffer: 256,
            client_buffer: 32,
            max_in_flight: 256,
        }
    }
}

impl Config {
    /// Load a config from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from the file named by `TCP_MUX_CONFIG`, or use defaults
    pub fn from_env() -> Result<Self, AppError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
