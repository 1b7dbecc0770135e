//! Error types for token handling.

use std::fmt;
use thiserror::Error;

/// Why a presented token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The token could not be parsed or lacks a required claim.
    Malformed,
    /// The token's algorithm is not in the allow-list.
    UnsupportedAlgorithm,
    /// The signature does not verify against the resolved key.
    BadSignature,
    /// The token is expired or not yet valid.
    TemporalViolation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Malformed => "malformed token",
            ErrorKind::UnsupportedAlgorithm => "unsupported algorithm",
            ErrorKind::BadSignature => "bad signature",
            ErrorKind::TemporalViolation => "token not valid at this time",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during token and key operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// A presented token was rejected.
    #[error("{kind}: {message}")]
    Rejected { kind: ErrorKind, message: String },

    /// Key material could not be generated, parsed or encoded.
    #[error("invalid key material: {0}")]
    KeyMaterial(String),

    /// Signing a new token failed.
    #[error("failed to sign token: {0}")]
    Signing(String),

    /// IO error (reading/writing keys).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TokenError {
    pub(crate) fn rejected(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Rejected {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::rejected(ErrorKind::Malformed, message)
    }

    /// The rejection kind, when this error came from verifying a token.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            TokenError::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind as Jwt;

        let kind = match e.kind() {
            Jwt::InvalidSignature | Jwt::InvalidRsaKey(_) | Jwt::InvalidKeyFormat => {
                ErrorKind::BadSignature
            }
            Jwt::InvalidAlgorithm | Jwt::InvalidAlgorithmName | Jwt::MissingAlgorithm => {
                ErrorKind::UnsupportedAlgorithm
            }
            Jwt::ExpiredSignature | Jwt::ImmatureSignature => ErrorKind::TemporalViolation,
            _ => ErrorKind::Malformed,
        };
        TokenError::rejected(kind, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_only_for_rejections() {
        let err = TokenError::rejected(ErrorKind::BadSignature, "nope");
        assert_eq!(err.kind(), Some(ErrorKind::BadSignature));
        assert!(err.to_string().starts_with("bad signature"));

        assert_eq!(TokenError::KeyMaterial("short".into()).kind(), None);
    }

    #[test]
    fn test_jwt_error_mapping() {
        use jsonwebtoken::errors::{Error, ErrorKind as Jwt};

        let cases = [
            (Jwt::InvalidSignature, ErrorKind::BadSignature),
            (Jwt::InvalidAlgorithm, ErrorKind::UnsupportedAlgorithm),
            (Jwt::ExpiredSignature, ErrorKind::TemporalViolation),
            (Jwt::InvalidToken, ErrorKind::Malformed),
        ];
        for (jwt, expected) in cases {
            let err = TokenError::from(Error::from(jwt));
            assert_eq!(err.kind(), Some(expected));
        }
    }
}
