//! Request-level errors and their wire representation.

use crate::gateway::AuthError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gatehouse_core::UserError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Everything a handler or stage can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A trusted error whose message is safe to show the caller.
    #[error("{message}")]
    Request { status: StatusCode, message: String },

    /// A single invalid input field.
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    /// Credential or permission failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A recovered panic from somewhere downstream.
    #[error("panic: {detail}")]
    Panic { detail: String },

    /// Anything else.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    /// The process must stop. Passes through error classification untouched
    /// so the serving loop sees it.
    #[error("shutdown requested: {0}")]
    Shutdown(String),
}

impl ApiError {
    pub fn request(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Request {
            status,
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, ApiError::Shutdown(_))
    }

    /// Status under the default classifier.
    pub fn status(&self) -> StatusCode {
        ErrorClassifier::default().classify(self).0
    }
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::NotFound => ApiError::NotFound,
            UserError::Conflict(_) => ApiError::Conflict(e.to_string()),
            UserError::Validation { field, message } => ApiError::Validation { field, message },
            UserError::AuthenticationFailed => ApiError::Auth(AuthError::BadCredentials),
            other => ApiError::Internal(anyhow::Error::new(other).context("user store")),
        }
    }
}

/// The only error body clients ever see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            fields: None,
        }
    }
}

/// Maps [`ApiError`]s to a status code and a public body.
///
/// Auth failures never say which check failed, and server-side failures
/// carry only the status text.
#[derive(Debug, Clone, Copy)]
pub struct ErrorClassifier {
    forbidden_as_unauthorized: bool,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            forbidden_as_unauthorized: true,
        }
    }
}

impl ErrorClassifier {
    /// `forbidden_as_unauthorized` renders authorization denials as 401
    /// instead of 403.
    pub fn new(forbidden_as_unauthorized: bool) -> Self {
        Self {
            forbidden_as_unauthorized,
        }
    }

    pub fn classify(&self, err: &ApiError) -> (StatusCode, ErrorResponse) {
        match err {
            ApiError::Request { status, message } => (*status, ErrorResponse::new(message.clone())),
            ApiError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: format!("{field}: {message}"),
                    fields: Some(BTreeMap::from([(field.clone(), message.clone())])),
                },
            ),
            ApiError::NotFound => generic(StatusCode::NOT_FOUND),
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, ErrorResponse::new(message.clone()))
            }
            ApiError::Auth(AuthError::Forbidden { .. }) if !self.forbidden_as_unauthorized => {
                generic(StatusCode::FORBIDDEN)
            }
            ApiError::Auth(_) => generic(StatusCode::UNAUTHORIZED),
            ApiError::Panic { .. } | ApiError::Internal(_) | ApiError::Shutdown(_) => {
                generic(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn respond(&self, err: &ApiError) -> Response {
        let (status, body) = self.classify(err);
        (status, Json(body)).into_response()
    }
}

fn generic(status: StatusCode) -> (StatusCode, ErrorResponse) {
    let text = status.canonical_reason().unwrap_or("Error");
    (status, ErrorResponse::new(text))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ErrorClassifier::default().respond(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_policy::Rule;
    use gatehouse_token::ErrorKind;

    fn classify(err: ApiError) -> (StatusCode, ErrorResponse) {
        ErrorClassifier::default().classify(&err)
    }

    #[test]
    fn test_auth_failures_are_generic_401() {
        let errors = [
            AuthError::NoCredential,
            AuthError::InvalidToken {
                kind: ErrorKind::BadSignature,
                message: "signature mismatch".into(),
            },
            AuthError::PolicyRejected,
            AuthError::Forbidden {
                rule: Rule::AdminOnly,
            },
            AuthError::BadCredentials,
        ];
        for err in errors {
            let (status, body) = classify(err.into());
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, ErrorResponse::new("Unauthorized"));
        }
    }

    #[test]
    fn test_forbidden_can_be_403() {
        let classifier = ErrorClassifier::new(false);
        let (status, body) = classifier.classify(&ApiError::Auth(AuthError::Forbidden {
            rule: Rule::AdminOnly,
        }));
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, "Forbidden");

        let (status, _) = classifier.classify(&ApiError::Auth(AuthError::NoCredential));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_internal_detail_never_leaks() {
        let errors = [
            ApiError::Internal(anyhow::anyhow!("connection to 10.0.0.3 refused")),
            ApiError::Panic {
                detail: "index out of bounds".into(),
            },
            ApiError::Shutdown("integrity check failed".into()),
        ];
        for err in errors {
            let (status, body) = classify(err);
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, ErrorResponse::new("Internal Server Error"));
        }
    }

    #[test]
    fn test_validation_names_field() {
        let (status, body) = classify(ApiError::validation("user_id", "must be a UUID"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "user_id: must be a UUID");
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "error": "user_id: must be a UUID",
                "fields": {"user_id": "must be a UUID"}
            })
        );
    }

    #[test]
    fn test_trusted_and_domain_errors() {
        let (status, body) = classify(ApiError::request(StatusCode::BAD_REQUEST, "bad json"));
        assert_eq!((status, body.error.as_str()), (StatusCode::BAD_REQUEST, "bad json"));

        assert_eq!(classify(ApiError::NotFound).0, StatusCode::NOT_FOUND);
        assert_eq!(
            classify(UserError::Conflict("a@b.c".into()).into()),
            (
                StatusCode::CONFLICT,
                ErrorResponse::new("email a@b.c is already in use")
            )
        );
        assert!(matches!(
            ApiError::from(UserError::AuthenticationFailed),
            ApiError::Auth(AuthError::BadCredentials)
        ));
    }

    #[test]
    fn test_body_shape() {
        let json = serde_json::to_value(ErrorResponse::new("Unauthorized")).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Unauthorized"}));
    }
}
