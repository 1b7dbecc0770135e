//! Verification key lookup.

use crate::error::{ErrorKind, TokenError};
use crate::keys::{KeyPair, key_id_from_path};
use jsonwebtoken::DecodingKey;
use std::collections::BTreeMap;
use std::path::Path;

/// Supplies the public key a token must verify against.
pub trait KeyResolver: Send + Sync {
    /// Return the public key (SPKI PEM) for a key id, or for the issuer when
    /// the token names no key id or one the resolver does not know.
    fn resolve(&self, kid: Option<&str>, issuer: &str) -> Result<String, TokenError>;
}

/// Trusted public keys indexed by key id and by issuer.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    by_kid: BTreeMap<String, String>,
    by_issuer: BTreeMap<String, String>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store trusting only the public half of `keypair`, also registered
    /// as the key for `issuer`.
    pub fn from_key_pair(keypair: &KeyPair, issuer: &str) -> Self {
        let mut store = Self::new();
        store
            .by_kid
            .insert(keypair.kid().to_string(), keypair.public_key_pem().to_string());
        store
            .by_issuer
            .insert(issuer.to_string(), keypair.public_key_pem().to_string());
        store
    }

    /// Trust a public key under a key id.
    pub fn insert(&mut self, kid: impl Into<String>, public_pem: &str) -> Result<(), TokenError> {
        check_public_pem(public_pem)?;
        self.by_kid.insert(kid.into(), public_pem.to_string());
        Ok(())
    }

    /// Trust a public key for tokens from `issuer` whose key id is absent or
    /// unknown.
    pub fn insert_for_issuer(
        &mut self,
        issuer: impl Into<String>,
        public_pem: &str,
    ) -> Result<(), TokenError> {
        check_public_pem(public_pem)?;
        self.by_issuer.insert(issuer.into(), public_pem.to_string());
        Ok(())
    }

    /// Trust the public key in a PEM file; the key id is the file stem.
    pub fn load_public_key_file(&mut self, path: &Path) -> Result<String, TokenError> {
        let pem = std::fs::read_to_string(path)?;
        let kid = key_id_from_path(path)?;
        self.insert(kid.clone(), &pem)?;
        Ok(kid)
    }

    /// Number of keys known by id.
    pub fn len(&self) -> usize {
        self.by_kid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kid.is_empty() && self.by_issuer.is_empty()
    }
}

impl KeyResolver for KeyStore {
    fn resolve(&self, kid: Option<&str>, issuer: &str) -> Result<String, TokenError> {
        let found = kid
            .and_then(|kid| self.by_kid.get(kid))
            .or_else(|| self.by_issuer.get(issuer));

        found.cloned().ok_or_else(|| {
            let what = kid.map_or_else(
                || format!("issuer {issuer}"),
                |k| format!("kid {k} or issuer {issuer}"),
            );
            TokenError::rejected(
                ErrorKind::BadSignature,
                format!("no verification key for {what}"),
            )
        })
    }
}

fn check_public_pem(pem: &str) -> Result<(), TokenError> {
    if pem.contains("PRIVATE KEY") {
        return Err(TokenError::KeyMaterial(
            "refusing to trust private key material as a verification key".into(),
        ));
    }
    DecodingKey::from_rsa_pem(pem.as_bytes())
        .map(|_| ())
        .map_err(|e| TokenError::KeyMaterial(format!("failed to parse public key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::fixtures::{PRIMARY, SECONDARY};
    use tempfile::tempdir;

    #[test]
    fn test_resolve_by_kid_and_issuer() {
        let mut store = KeyStore::from_key_pair(&PRIMARY, "service project");
        store.insert("secondary", SECONDARY.public_key_pem()).unwrap();

        assert_eq!(
            store.resolve(Some("primary"), "ignored").unwrap(),
            PRIMARY.public_key_pem()
        );
        assert_eq!(
            store.resolve(Some("secondary"), "ignored").unwrap(),
            SECONDARY.public_key_pem()
        );
        assert_eq!(
            store.resolve(None, "service project").unwrap(),
            PRIMARY.public_key_pem()
        );
    }

    #[test]
    fn test_unknown_key_is_bad_signature() {
        let store = KeyStore::from_key_pair(&PRIMARY, "service project");

        let err = store.resolve(Some("missing"), "someone else").unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BadSignature));

        let err = store.resolve(None, "someone else").unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BadSignature));
    }

    #[test]
    fn test_unknown_kid_falls_back_to_issuer() {
        let mut store = KeyStore::new();
        store
            .insert_for_issuer("service project", SECONDARY.public_key_pem())
            .unwrap();
        store.insert("primary", PRIMARY.public_key_pem()).unwrap();

        assert_eq!(
            store.resolve(Some("rotated-kid"), "service project").unwrap(),
            SECONDARY.public_key_pem()
        );
        // A known kid wins over the issuer entry.
        assert_eq!(
            store.resolve(Some("primary"), "service project").unwrap(),
            PRIMARY.public_key_pem()
        );
    }

    #[test]
    fn test_refuses_private_material() {
        let mut store = KeyStore::new();
        let err = store.insert("oops", PRIMARY.private_key_pem()).unwrap_err();
        assert!(matches!(err, TokenError::KeyMaterial(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_public_key_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rotated.pem");
        std::fs::write(&path, SECONDARY.public_key_pem()).unwrap();

        let mut store = KeyStore::new();
        let kid = store.load_public_key_file(&path).unwrap();
        assert_eq!(kid, "rotated");
        assert_eq!(store.len(), 1);
    }
}
