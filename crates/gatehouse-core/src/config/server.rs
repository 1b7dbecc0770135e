//! HTTP server configuration.

use super::{ConfigError, parse_duration};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:3000"
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub json_logs: bool,

    /// Render authorization denials as 401 like credential failures. When
    /// false they render as 403.
    #[serde(default = "default_true")]
    pub forbidden_as_unauthorized: bool,

    /// How long in-flight requests get to finish after shutdown starts
    /// (e.g. "20s").
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: String,
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_true() -> bool {
    true
}

fn default_shutdown_timeout() -> String {
    "20s".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            json_logs: false,
            forbidden_as_unauthorized: true,
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("server.shutdown_timeout", &self.shutdown_timeout)
    }
}
