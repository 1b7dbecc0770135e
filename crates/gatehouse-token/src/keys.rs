//! RSA keypair management for token signing.

use crate::error::TokenError;
use crate::resolver::KeyResolver;
use jsonwebtoken::EncodingKey;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use std::path::Path;

/// Smallest modulus accepted for signing keys.
pub const MIN_KEY_BITS: usize = 2048;

/// An RSA keypair for signing tokens.
///
/// The private half never leaves this type except through
/// [`KeyPair::private_key_pem`], which exists for writing the key to disk.
pub struct KeyPair {
    kid: String,
    private_pem: String,
    public_pem: String,
    encoding_key: EncodingKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a new random 2048-bit keypair.
    pub fn generate(kid: impl Into<String>) -> Result<Self, TokenError> {
        Self::generate_with_bits(kid, MIN_KEY_BITS)
    }

    /// Generate a new random keypair with the given modulus size.
    pub fn generate_with_bits(kid: impl Into<String>, bits: usize) -> Result<Self, TokenError> {
        if bits < MIN_KEY_BITS {
            return Err(TokenError::KeyMaterial(format!(
                "{bits}-bit keys are too small (minimum {MIN_KEY_BITS})"
            )));
        }

        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| TokenError::KeyMaterial(e.to_string()))?;

        Self::from_rsa(kid.into(), private)
    }

    /// Load a keypair from a PEM private key (PKCS#8 or PKCS#1).
    pub fn from_private_key_pem(kid: impl Into<String>, pem: &str) -> Result<Self, TokenError> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| TokenError::KeyMaterial(format!("failed to parse private key: {e}")))?;

        Self::from_rsa(kid.into(), private)
    }

    /// Load a keypair from a private key file. The key id is the file stem.
    pub fn load_from_file(private_key_path: &Path) -> Result<Self, TokenError> {
        let pem = std::fs::read_to_string(private_key_path)?;
        let kid = key_id_from_path(private_key_path)?;
        Self::from_private_key_pem(kid, &pem)
    }

    fn from_rsa(kid: String, private: RsaPrivateKey) -> Result<Self, TokenError> {
        let bits = private.size() * 8;
        if bits < MIN_KEY_BITS {
            return Err(TokenError::KeyMaterial(format!(
                "{bits}-bit keys are too small (minimum {MIN_KEY_BITS})"
            )));
        }

        let private_pem = private
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| TokenError::KeyMaterial(e.to_string()))?
            .to_string();
        let public_pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| TokenError::KeyMaterial(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| TokenError::KeyMaterial(e.to_string()))?;

        Ok(Self {
            kid,
            private_pem,
            public_pem,
            encoding_key,
        })
    }

    /// Key id written into the `kid` header of tokens signed with this key.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Public key as SPKI PEM (`-----BEGIN PUBLIC KEY-----`).
    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }

    /// Private key as PKCS#1 PEM.
    pub fn private_key_pem(&self) -> &str {
        &self.private_pem
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// Save the keypair to files.
    pub fn save_to_files(
        &self,
        private_key_path: &Path,
        public_key_path: &Path,
    ) -> Result<(), TokenError> {
        std::fs::write(private_key_path, &self.private_pem)?;
        std::fs::write(public_key_path, &self.public_pem)?;
        Ok(())
    }
}

/// A keypair resolves its own public key, whatever the issuer.
impl KeyResolver for KeyPair {
    fn resolve(&self, kid: Option<&str>, _issuer: &str) -> Result<String, TokenError> {
        match kid {
            Some(kid) if kid != self.kid => Err(TokenError::rejected(
                crate::ErrorKind::BadSignature,
                format!("no verification key for kid {kid}"),
            )),
            _ => Ok(self.public_pem.clone()),
        }
    }
}

pub(crate) fn key_id_from_path(path: &Path) -> Result<String, TokenError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            TokenError::KeyMaterial(format!("cannot derive key id from {}", path.display()))
        })
}
