//! `gatehouse token issue` and `gatehouse token verify`

use super::read_public_key;
use anyhow::Context;
use gatehouse_token::{Claims, KeyPair, KeyResolver, TokenError, TokenIssuer, TokenVerifier};
use std::path::Path;
use std::sync::Arc;

/// Trusts exactly one public key, whatever the token's key id.
pub(crate) struct SingleKey(pub(crate) String);

impl KeyResolver for SingleKey {
    fn resolve(&self, _kid: Option<&str>, _issuer: &str) -> Result<String, TokenError> {
        Ok(self.0.clone())
    }
}

/// Sign a token with the private key in `key`.
pub fn issue(
    key: &Path,
    subject: &str,
    issuer: &str,
    roles: Vec<String>,
    ttl: &str,
) -> anyhow::Result<String> {
    let ttl = humantime::parse_duration(ttl).with_context(|| format!("invalid --ttl {ttl:?}"))?;
    let keypair = KeyPair::load_from_file(key)
        .with_context(|| format!("loading private key {}", key.display()))?;

    let token = TokenIssuer::new(Arc::new(keypair)).issue(subject, issuer, roles, ttl)?;
    Ok(token)
}

/// Verify `token` against the public key in `public_key`.
pub fn verify(public_key: &Path, token: &str) -> anyhow::Result<Claims> {
    let resolver = SingleKey(read_public_key(public_key)?);
    let claims = TokenVerifier::default()
        .verify(token.trim(), &resolver)
        .context("token rejected")?;
    Ok(claims)
}
