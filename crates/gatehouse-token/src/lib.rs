//! # gatehouse-token
//!
//! Signed identity tokens for Gatehouse.
//!
//! This crate provides functionality for:
//! - Generating and loading RSA keypairs (2048 bits minimum)
//! - Exporting the public half as PEM for policies and other processes
//! - Issuing JWTs carrying registered claims plus role claims
//! - Verifying tokens against an explicit algorithm allow-list and a key resolver
//!
//! ## Failure model
//!
//! Every verification failure carries an [`ErrorKind`]:
//!
//! | Kind | Cause |
//! |------|-------|
//! | `Malformed` | wrong segment count, bad base64/JSON, missing required claim |
//! | `UnsupportedAlgorithm` | `alg` header outside the allow-list (incl. `none`, HMAC) |
//! | `BadSignature` | no key for the token, or the signature does not verify |
//! | `TemporalViolation` | now is outside `[nbf, exp)` |
//!
//! All of them are terminal for the request that presented the token.

pub mod claims;
pub mod error;
pub mod keys;
pub mod resolver;
pub mod token;

pub use claims::Claims;
pub use error::{ErrorKind, TokenError};
pub use jsonwebtoken::Algorithm;
pub use keys::KeyPair;
pub use resolver::{KeyResolver, KeyStore};
pub use token::{
    DEFAULT_TTL, TokenHeader, TokenIssuer, TokenVerifier, decode_header, verify_signature,
};
