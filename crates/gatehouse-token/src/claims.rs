//! Claim set carried by identity tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registered claims plus the application's role claims.
///
/// `sub`, `iss`, `iat` and `exp` are required; a token whose payload lacks any
/// of them does not deserialize and is rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the user).
    pub sub: String,

    /// Issuer.
    pub iss: String,

    /// Issued at (Unix seconds).
    pub iat: i64,

    /// Expires at (Unix seconds). The token is valid strictly before this.
    pub exp: i64,

    /// Not before (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Unique token id, reserved for replay tracking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Role names. Order and duplicates carry no meaning.
    #[serde(default, alias = "Roles")]
    pub roles: Vec<String>,
}

impl Claims {
    /// Claims issued at `now` and expiring `ttl` later, with no not-before.
    pub fn new(
        subject: impl Into<String>,
        issuer: impl Into<String>,
        roles: Vec<String>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let iat = now.timestamp();
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            sub: subject.into(),
            iss: issuer.into(),
            iat,
            exp: iat.saturating_add(ttl),
            nbf: None,
            jti: None,
            roles,
        }
    }

    /// Set the not-before time.
    pub fn not_before(mut self, nbf: DateTime<Utc>) -> Self {
        self.nbf = Some(nbf.timestamp());
        self
    }

    /// Set the unique token id.
    pub fn with_id(mut self, jti: impl Into<String>) -> Self {
        self.jti = Some(jti.into());
        self
    }

    /// Check whether the claim set names a role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Whether `now` lies within `[nbf, exp)`, widened by `leeway` seconds.
    pub fn is_active_at(&self, now: DateTime<Utc>, leeway: u64) -> bool {
        let now = now.timestamp();
        let leeway = i64::try_from(leeway).unwrap_or(i64::MAX);
        if now >= self.exp.saturating_add(leeway) {
            return false;
        }
        self.nbf
            .is_none_or(|nbf| now.saturating_add(leeway) >= nbf)
    }
}
