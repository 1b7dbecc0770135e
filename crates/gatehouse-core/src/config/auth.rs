//! Token and credential configuration.

use super::{ConfigError, parse_duration};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that overrides `[auth.admin].password`.
pub const ADMIN_PASSWORD_ENV: &str = "GATEHOUSE_ADMIN_PASSWORD";

/// Signature algorithms a deployment may allow. All RSA.
pub const RSA_ALGORITHMS: [&str; 6] = ["RS256", "RS384", "RS512", "PS256", "PS384", "PS512"];

/// `[auth]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Issuer written into tokens and required by the authentication policy.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// PEM private key used for signing. The key id is the file stem.
    /// When unset, an ephemeral key is generated at startup.
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,

    /// Extra trusted public keys (SPKI PEM), e.g. a key being rotated out.
    #[serde(default)]
    pub public_key_files: Vec<PathBuf>,

    /// Accepted `alg` header values.
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<String>,

    /// Clock skew tolerated on `exp`/`nbf`, in seconds.
    #[serde(default)]
    pub leeway_secs: u64,

    /// Lifetime of issued tokens (e.g. "8760h", "30d").
    #[serde(default = "default_token_ttl")]
    pub token_ttl: String,

    #[serde(default)]
    pub admin: AdminConfig,
}

fn default_issuer() -> String {
    "service project".to_string()
}

fn default_algorithms() -> Vec<String> {
    vec!["RS256".to_string()]
}

fn default_token_ttl() -> String {
    "8760h".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            private_key_file: None,
            public_key_files: Vec::new(),
            algorithms: default_algorithms(),
            leeway_secs: 0,
            token_ttl: default_token_ttl(),
            admin: AdminConfig::default(),
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Result<Duration, ConfigError> {
        parse_duration("auth.token_ttl", &self.token_ttl)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::invalid("auth.issuer", "must not be empty"));
        }
        if self.algorithms.is_empty() {
            return Err(ConfigError::invalid(
                "auth.algorithms",
                "at least one algorithm is required",
            ));
        }
        if let Some(alg) = self
            .algorithms
            .iter()
            .find(|alg| !RSA_ALGORITHMS.contains(&alg.as_str()))
        {
            return Err(ConfigError::invalid(
                "auth.algorithms",
                format!("{alg} is not allowed (expected one of {})", RSA_ALGORITHMS.join(", ")),
            ));
        }
        let ttl = self.token_ttl()?;
        if ttl.is_zero() {
            return Err(ConfigError::invalid("auth.token_ttl", "must be positive"));
        }
        Ok(())
    }
}

/// `[auth.admin]`: the user created when the store starts empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_name")]
    pub name: String,

    #[serde(default = "default_admin_email")]
    pub email: String,

    /// Prefer setting `GATEHOUSE_ADMIN_PASSWORD`. No admin is created when
    /// neither is set.
    #[serde(default)]
    pub password: Option<String>,
}

fn default_admin_name() -> String {
    "Admin".to_string()
}

fn default_admin_email() -> String {
    "admin@example.com".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            name: default_admin_name(),
            email: default_admin_email(),
            password: None,
        }
    }
}

impl AdminConfig {
    /// Password from the environment, then from the file.
    pub fn password(&self) -> Option<String> {
        std::env::var(ADMIN_PASSWORD_ENV)
            .ok()
            .or_else(|| self.password.clone())
            .filter(|p| !p.trim().is_empty())
    }
}
