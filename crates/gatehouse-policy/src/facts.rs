//! Typed evaluation inputs.
//!
//! Each policy gets a small explicit struct. It is turned into Datalog facts
//! only when a query runs, and nothing else is visible to the rules.

use crate::error::PolicyError;
use biscuit_auth::builder::Fact;
use biscuit_auth::macros::fact;
use gatehouse_token::{Algorithm, decode_header, verify_signature};
use std::fmt;
use std::str::FromStr;

/// Something that can be presented to a policy as facts.
pub trait FactSet {
    fn to_facts(&self) -> Result<Vec<Fact>, PolicyError>;
}

/// Input to the authentication policy: exactly a public key, a token and an
/// expected issuer.
#[derive(Clone)]
pub struct AuthenticationFacts {
    pub public_key_pem: String,
    pub token: String,
    pub issuer: String,
}

impl AuthenticationFacts {
    pub fn new(
        public_key_pem: impl Into<String>,
        token: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            public_key_pem: public_key_pem.into(),
            token: token.into(),
            issuer: issuer.into(),
        }
    }
}

// Tokens and keys stay out of logs.
impl fmt::Debug for AuthenticationFacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationFacts")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl FactSet for AuthenticationFacts {
    /// Produces `expected_issuer($iss)`, `signature_verified($ok)` and, when
    /// the signature holds, `token_issuer($iss)`.
    fn to_facts(&self) -> Result<Vec<Fact>, PolicyError> {
        let verified_issuer = signature_issuer(&self.token, &self.public_key_pem);

        let mut facts = vec![
            fact!("expected_issuer({iss})", iss = self.issuer.clone()),
            fact!("signature_verified({ok})", ok = verified_issuer.is_some()),
        ];
        if let Some(iss) = verified_issuer {
            facts.push(fact!("token_issuer({iss})", iss = iss));
        }
        Ok(facts)
    }
}

/// Input to the authorization policy: roles, subject and the user id the
/// request targets, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationFacts {
    pub roles: Vec<String>,
    pub subject: String,
    pub user_id: Option<String>,
}

impl AuthorizationFacts {
    pub fn new(roles: Vec<String>, subject: impl Into<String>) -> Self {
        Self {
            roles,
            subject: subject.into(),
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

impl FactSet for AuthorizationFacts {
    fn to_facts(&self) -> Result<Vec<Fact>, PolicyError> {
        let mut facts = Vec::with_capacity(self.roles.len() + 2);
        for role in &self.roles {
            facts.push(fact!("role({role})", role = role.clone()));
        }
        if !self.subject.is_empty() {
            facts.push(fact!("subject({subject})", subject = self.subject.clone()));
        }
        if let Some(user_id) = &self.user_id {
            facts.push(fact!("user_id({id})", id = user_id.clone()));
        }
        Ok(facts)
    }
}

/// Verify `token`'s signature against `public_key_pem` and return its issuer
/// claim, or `None` when anything about the check fails.
///
/// Pure: no clock, no IO. Validity windows are the token verifier's job.
fn signature_issuer(token: &str, public_key_pem: &str) -> Option<String> {
    if public_key_pem.contains("PRIVATE KEY") {
        tracing::warn!("private key material offered as a verification key");
        return None;
    }

    let header = decode_header(token).ok()?;
    let algorithm = Algorithm::from_str(&header.alg).ok()?;
    if !is_rsa(algorithm) {
        return None;
    }

    verify_signature(token, public_key_pem, algorithm)
        .ok()
        .map(|claims| claims.iss)
}

fn is_rsa(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}
