//! The auth gateway: token verification followed by the two policy checks.
//!
//! ```text
//! Unauthenticated ──bearer──▶ TokenVerified ──authn policy──▶ PolicyAuthenticated
//!        │                         │                                │
//!        ▼                         ▼                                ▼ authz policy
//!  Denied(NoCredential)   Denied(InvalidToken)             Authorized ──▶ Dispatched
//!                                                  Denied(PolicyRejected) / Denied(Forbidden)
//! ```
//!
//! Every denial is terminal for the request.

use gatehouse_policy::{AuthenticationFacts, AuthorizationFacts, PolicyStore, Rule};
use gatehouse_token::{Claims, ErrorKind, KeyResolver, TokenError, TokenVerifier, decode_header};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why a request was denied.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no bearer credential presented")]
    NoCredential,

    #[error("invalid token ({kind}): {message}")]
    InvalidToken { kind: ErrorKind, message: String },

    #[error("token rejected by authentication policy")]
    PolicyRejected,

    #[error("not permitted by {rule}")]
    Forbidden { rule: Rule },

    /// Sign-in with a wrong or unknown email/password pair.
    #[error("invalid credentials")]
    BadCredentials,
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        AuthError::InvalidToken {
            kind: e.kind().unwrap_or(ErrorKind::Malformed),
            message: e.to_string(),
        }
    }
}

/// Verifies bearer tokens and evaluates policies for guarded routes.
///
/// All state is read-only after construction.
#[derive(Clone)]
pub struct AuthGateway {
    verifier: TokenVerifier,
    keys: Arc<dyn KeyResolver>,
    policies: Arc<PolicyStore>,
    issuer: String,
}

impl fmt::Debug for AuthGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGateway")
            .field("verifier", &self.verifier)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl AuthGateway {
    /// `issuer` is the issuer every accepted token must carry.
    pub fn new(
        verifier: TokenVerifier,
        keys: Arc<dyn KeyResolver>,
        policies: Arc<PolicyStore>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            verifier,
            keys,
            policies,
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Authenticate the value of an `Authorization` header.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Claims, AuthError> {
        let token = bearer_token(authorization)?;

        let claims = self.verifier.verify(token, self.keys.as_ref())?;

        let kid = decode_header(token)?.kid;
        let public_key_pem = self.keys.resolve(kid.as_deref(), &claims.iss)?;
        let facts = AuthenticationFacts::new(public_key_pem, token, self.issuer.as_str());
        if !self.policies.authenticate(&facts) {
            return Err(AuthError::PolicyRejected);
        }

        Ok(claims)
    }

    /// Check `claims` against `rule`, optionally for a targeted user id.
    pub fn authorize(
        &self,
        claims: &Claims,
        rule: Rule,
        user_id: Option<&str>,
    ) -> Result<(), AuthError> {
        let mut facts = AuthorizationFacts::new(claims.roles.clone(), claims.sub.as_str());
        if let Some(user_id) = user_id {
            facts = facts.with_user_id(user_id);
        }

        if self.policies.authorize(rule, &facts) {
            Ok(())
        } else {
            Err(AuthError::Forbidden { rule })
        }
    }
}

/// Extract the token from `Bearer <token>`.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::NoCredential)?;
    let (scheme, token) = value.split_once(' ').ok_or(AuthError::NoCredential)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::NoCredential);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::NoCredential);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_token::{DEFAULT_TTL, KeyPair, KeyStore, TokenIssuer};

    const PRIMARY_PEM: &str = include_str!("../../../testdata/keys/primary.pem");
    const ISSUER: &str = "service project";

    fn setup() -> (AuthGateway, TokenIssuer) {
        let keypair = Arc::new(KeyPair::from_private_key_pem("primary", PRIMARY_PEM).unwrap());
        let keys = KeyStore::from_key_pair(&keypair, ISSUER);
        let gateway = AuthGateway::new(
            TokenVerifier::default(),
            Arc::new(keys),
            Arc::new(PolicyStore::embedded().unwrap()),
            ISSUER,
        );
        (gateway, TokenIssuer::new(keypair))
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    #[test]
    fn test_bearer_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(Some("bearer  abc ")).unwrap(), "abc");

        for bad in [None, Some(""), Some("Bearer"), Some("Bearer "), Some("Basic abc")] {
            assert!(matches!(bearer_token(bad), Err(AuthError::NoCredential)), "{bad:?}");
        }
    }

    #[test]
    fn test_admin_passes_both_policies() {
        let (gateway, issuer) = setup();
        let token = issuer
            .issue("12345678", ISSUER, vec!["ADMIN".into()], DEFAULT_TTL)
            .unwrap();

        let claims = gateway.authenticate(Some(&bearer(&token))).unwrap();
        assert_eq!(claims.sub, "12345678");
        gateway.authorize(&claims, Rule::AdminOnly, None).unwrap();
    }

    #[test]
    fn test_invalid_token_carries_kind() {
        let (gateway, _) = setup();
        let err = gateway.authenticate(Some("Bearer a.b")).unwrap_err();
        assert!(matches!(
            err,
            AuthError::InvalidToken {
                kind: ErrorKind::Malformed,
                ..
            }
        ));
    }

    #[test]
    fn test_foreign_issuer_rejected_by_policy() {
        let (gateway, issuer) = setup();
        // Signed by a trusted key, but for another issuer.
        let token = issuer
            .issue("1", "another service", vec!["ADMIN".into()], DEFAULT_TTL)
            .unwrap();

        let err = gateway.authenticate(Some(&bearer(&token))).unwrap_err();
        assert!(matches!(err, AuthError::PolicyRejected));
    }

    #[test]
    fn test_user_denied_admin_rule() {
        let (gateway, issuer) = setup();
        let token = issuer
            .issue("7", ISSUER, vec!["USER".into()], DEFAULT_TTL)
            .unwrap();
        let claims = gateway.authenticate(Some(&bearer(&token))).unwrap();

        let err = gateway.authorize(&claims, Rule::AdminOnly, None).unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { rule: Rule::AdminOnly }));

        gateway
            .authorize(&claims, Rule::AdminOrSubject, Some("7"))
            .unwrap();
        assert!(
            gateway
                .authorize(&claims, Rule::AdminOrSubject, Some("8"))
                .is_err()
        );
    }

    #[test]
    fn test_no_roles_only_passes_any() {
        let (gateway, issuer) = setup();
        let token = issuer.issue("9", ISSUER, vec![], DEFAULT_TTL).unwrap();
        let claims = gateway.authenticate(Some(&bearer(&token))).unwrap();

        gateway.authorize(&claims, Rule::Any, None).unwrap();
        assert!(gateway.authorize(&claims, Rule::UserOnly, None).is_err());
    }
}
