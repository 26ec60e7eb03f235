//! Server configuration.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for the match server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind the HTTP surface to.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind the HTTP surface to.
    #[serde(default = "default_port")]
    port: u16,

    /// Prediction endpoint of the AI move oracle.
    #[serde(default = "default_oracle_url")]
    oracle_url: String,

    /// Oracle request timeout in milliseconds. Kept short so a slow model
    /// server delays a match by at most one tick.
    #[serde(default = "default_oracle_timeout_ms")]
    oracle_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_oracle_url() -> String {
    "http://tf:8501/v1/models/ttt:predict".to_string()
}

fn default_oracle_timeout_ms() -> u64 {
    200
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            oracle_url: default_oracle_url(),
            oracle_timeout_ms: default_oracle_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!(path = %path.as_ref().display(), "loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("failed to parse config: {e}")))?;

        info!(host = %config.host, port = config.port, "config loaded");
        Ok(config)
    }

    /// Loads from an optional file, falling back to defaults, then applies
    /// environment overrides (`ORACLE_URL`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Ok(url) = std::env::var("ORACLE_URL") {
            info!(oracle_url = %url, "oracle endpoint overridden from environment");
            config.oracle_url = url;
        }
        Ok(config)
    }

    /// Host to bind to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port to bind to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Overrides the bind address, e.g. from command-line flags.
    pub fn set_bind(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
    }

    /// Prediction endpoint of the AI move oracle.
    pub fn oracle_url(&self) -> &str {
        &self.oracle_url
    }

    /// Oracle request timeout.
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where the error occurred.
    pub line: u32,
    /// Source file where the error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error, capturing the caller's location.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(config.port(), 3000);
        assert_eq!(config.oracle_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: ServerConfig = toml::from_str("port = 8080\n").unwrap();
        assert_eq!(config.port(), 8080);
        assert_eq!(config.host(), "127.0.0.1");
    }

    #[test]
    fn test_bind_overrides() {
        let mut config = ServerConfig::default();
        config.set_bind(Some("0.0.0.0".into()), None);
        assert_eq!(config.host(), "0.0.0.0");
        assert_eq!(config.port(), 3000);
    }
}
