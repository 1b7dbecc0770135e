//! Gatehouse configuration.
//!
//! One TOML file, every section optional:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:3000"
//!
//! [auth]
//! issuer = "service project"
//! private_key_file = "keys/54bb2165.pem"
//! token_ttl = "8760h"
//!
//! [policy]
//! authorization_file = "policies/authorization.datalog"
//!
//! [users]
//! backend = "file"
//! path = "data/users.json"
//! ```

pub mod auth;
pub mod policy;
pub mod server;
pub mod users;

pub use auth::{ADMIN_PASSWORD_ENV, AdminConfig, AuthConfig, RSA_ALGORITHMS};
pub use policy::PolicyConfig;
pub use server::ServerConfig;
pub use users::{UserBackend, UsersConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "GATEHOUSE_CONFIG";

/// Config file used when `GATEHOUSE_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "gatehouse.toml";

/// Errors raised while reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub users: UsersConfig,
}

impl AppConfig {
    /// Parse and validate TOML text.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.shutdown_timeout()?;
        self.auth.validate()
    }
}

/// Load configuration from `GATEHOUSE_CONFIG` or `gatehouse.toml`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::load(&config_path())
}

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub(crate) fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value)
        .map_err(|e| ConfigError::invalid(field, format!("{value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:3000");
        assert!(cfg.server.forbidden_as_unauthorized);
        assert_eq!(cfg.auth.issuer, "service project");
        assert_eq!(cfg.auth.algorithms, vec!["RS256"]);
        assert_eq!(
            cfg.auth.token_ttl().unwrap(),
            Duration::from_secs(8760 * 3600)
        );
        assert_eq!(cfg.users.backend, UserBackend::Memory);
    }

    #[test]
    fn test_sections() {
        let cfg = AppConfig::from_toml(
            r#"
            [server]
            bind = "127.0.0.1:9000"
            json_logs = true
            forbidden_as_unauthorized = false

            [auth]
            issuer = "billing"
            private_key_file = "keys/54bb2165.pem"
            public_key_files = ["keys/old.pub.pem"]
            algorithms = ["RS256", "PS256"]
            leeway_secs = 30
            token_ttl = "1h 30m"

            [auth.admin]
            email = "root@example.com"

            [policy]
            authorization_file = "authz.datalog"

            [users]
            backend = "file"
            path = "users.json"
            "#,
        )
        .unwrap();

        assert!(cfg.server.json_logs);
        assert!(!cfg.server.forbidden_as_unauthorized);
        assert_eq!(cfg.auth.issuer, "billing");
        assert_eq!(cfg.auth.public_key_files.len(), 1);
        assert_eq!(cfg.auth.leeway_secs, 30);
        assert_eq!(cfg.auth.token_ttl().unwrap(), Duration::from_secs(5400));
        assert_eq!(cfg.auth.admin.email, "root@example.com");
        assert_eq!(cfg.auth.admin.name, "Admin");
        assert!(cfg.policy.authentication_file.is_none());
        assert_eq!(cfg.users.backend, UserBackend::File);
    }

    #[test]
    fn test_rejects_non_rsa_algorithms() {
        for alg in ["HS256", "none", "ES256"] {
            let raw = format!("[auth]\nalgorithms = [\"{alg}\"]\n");
            let err = AppConfig::from_toml(&raw).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { ref field, .. } if field == "auth.algorithms"),
                "{alg}"
            );
        }
    }

    #[test]
    fn test_rejects_bad_ttl() {
        let err = AppConfig::from_toml("[auth]\ntoken_ttl = \"forever\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "auth.token_ttl"));

        let err = AppConfig::from_toml("[auth]\ntoken_ttl = \"0s\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_rejects_bad_toml() {
        let err = AppConfig::from_toml("[server\nbind = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.auth.token_ttl, "8760h");
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatehouse.toml");
        std::fs::write(&path, "[auth]\nissuer = \"from file\"\n").unwrap();

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.auth.issuer, "from file");
    }
}
