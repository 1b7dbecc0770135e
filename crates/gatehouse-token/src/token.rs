//! Token creation and verification.

use crate::claims::Claims;
use crate::error::{ErrorKind, TokenError};
use crate::keys::KeyPair;
use crate::resolver::KeyResolver;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default token lifetime: one year.
pub const DEFAULT_TTL: Duration = Duration::from_secs(8760 * 60 * 60);

/// Signs claim sets with the process keypair.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keypair: Arc<KeyPair>,
    algorithm: Algorithm,
}

impl TokenIssuer {
    /// Create an RS256 issuer for the given keypair.
    pub fn new(keypair: Arc<KeyPair>) -> Self {
        Self {
            keypair,
            algorithm: Algorithm::RS256,
        }
    }

    /// Sign with a different RSA algorithm (RS384, RS512, PS256, ...).
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Issue a token for `subject` expiring `ttl` from now.
    pub fn issue(
        &self,
        subject: &str,
        issuer: &str,
        roles: Vec<String>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let claims = Claims::new(subject, issuer, roles, ttl, Utc::now());
        self.issue_claims(&claims)
    }

    /// Sign an explicit claim set.
    pub fn issue_claims(&self, claims: &Claims) -> Result<String, TokenError> {
        let mut header = Header::new(self.algorithm);
        header.kid = Some(self.keypair.kid().to_string());

        let token = jsonwebtoken::encode(&header, claims, self.keypair.encoding_key())
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        tracing::debug!(sub = %claims.sub, kid = %self.keypair.kid(), "issued token");
        Ok(token)
    }

    /// The signing key id.
    pub fn kid(&self) -> &str {
        self.keypair.kid()
    }
}

/// JOSE header fields the verifier looks at.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: Option<String>,
}

/// Decode a token's header without verifying anything.
pub fn decode_header(token: &str) -> Result<TokenHeader, TokenError> {
    let [header, _, _] = split(token)?;
    decode_segment(header, "header")
}

/// Verifies tokens against an algorithm allow-list and a key resolver.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    algorithms: Vec<Algorithm>,
    leeway: u64,
}

impl Default for TokenVerifier {
    fn default() -> Self {
        Self::new(vec![Algorithm::RS256])
    }
}

impl TokenVerifier {
    /// Create a verifier accepting only `algorithms`.
    pub fn new(algorithms: Vec<Algorithm>) -> Self {
        Self {
            algorithms,
            leeway: 0,
        }
    }

    /// Tolerate this much clock skew (seconds) on `exp` and `nbf`.
    pub fn with_leeway(mut self, leeway: u64) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    /// Verify a token and extract its claims.
    pub fn verify(&self, token: &str, keys: &dyn KeyResolver) -> Result<Claims, TokenError> {
        self.verify_at(token, keys, Utc::now())
    }

    /// Verify a token as of `now`.
    ///
    /// Checks run in order: structure, algorithm, claims, validity window,
    /// key lookup, signature. An expired token is therefore reported as a
    /// temporal violation even when its signature is also wrong.
    pub fn verify_at(
        &self,
        token: &str,
        keys: &dyn KeyResolver,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        let [header_b64, payload_b64, _] = split(token)?;

        let header: TokenHeader = decode_segment(header_b64, "header")?;
        let algorithm = Algorithm::from_str(&header.alg)
            .ok()
            .filter(|alg| self.algorithms.contains(alg))
            .ok_or_else(|| {
                TokenError::rejected(
                    ErrorKind::UnsupportedAlgorithm,
                    format!("algorithm {} is not allowed", header.alg),
                )
            })?;

        let claims: Claims = decode_segment(payload_b64, "payload")?;
        if claims.sub.is_empty() {
            return Err(TokenError::malformed("missing required claim: sub"));
        }
        if claims.iss.is_empty() {
            return Err(TokenError::malformed("missing required claim: iss"));
        }

        if !claims.is_active_at(now, self.leeway) {
            let message = if now.timestamp() >= claims.exp {
                format!("token expired at {}", claims.exp)
            } else {
                format!("token not valid before {}", claims.nbf.unwrap_or_default())
            };
            return Err(TokenError::rejected(ErrorKind::TemporalViolation, message));
        }

        let public_pem = keys.resolve(header.kid.as_deref(), &claims.iss)?;
        verify_signature(token, &public_pem, algorithm)?;

        Ok(claims)
    }
}

/// Check only the signature of `token` against a PEM public key.
///
/// Temporal and issuer checks are left to the caller.
pub fn verify_signature(
    token: &str,
    public_pem: &str,
    algorithm: Algorithm,
) -> Result<Claims, TokenError> {
    let key = DecodingKey::from_rsa_pem(public_pem.as_bytes()).map_err(|e| {
        TokenError::rejected(
            ErrorKind::BadSignature,
            format!("unusable verification key: {e}"),
        )
    })?;

    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<Claims>(token, &key, &validation)?;
    Ok(data.claims)
}

fn split(token: &str) -> Result<[&str; 3], TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    match parts.as_slice() {
        &[header, payload, signature] if !header.is_empty() && !payload.is_empty() => {
            Ok([header, payload, signature])
        }
        _ => Err(TokenError::malformed(format!(
            "expected 3 dot-separated segments, found {}",
            parts.len()
        ))),
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str, what: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::malformed(format!("invalid {what} encoding: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::malformed(format!("invalid {what}: {e}")))
}
