//! Sign-in and user records.

use crate::error::ApiError;
use crate::gateway::AuthError;
use crate::pipeline::{Handler, handler};
use crate::state::AppState;
use anyhow::Context;
use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use gatehouse_core::NewUser;
use gatehouse_core::user::{authenticate, create_user};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body returned by the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// `POST /v1/users/token`: exchange Basic credentials for a bearer token.
pub fn token(state: AppState) -> Handler {
    handler(move |req| {
        let state = state.clone();
        async move {
            let header = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok());
            let (email, password) = basic_credentials(header)?;

            let user = authenticate(state.users.as_ref(), &email, &password).await?;

            let token = state
                .tokens
                .issue(
                    &user.id.to_string(),
                    state.issuer(),
                    user.roles.clone(),
                    state.token_ttl,
                )
                .context("signing token")?;

            tracing::info!(user_id = %user.id, "issued token");
            Ok(Json(TokenResponse { token }).into_response())
        }
    })
}

/// `GET /v1/users/{user_id}`
pub fn query_by_id(state: AppState) -> Handler {
    handler(move |req| {
        let state = state.clone();
        async move {
            let (mut parts, _body) = req.into_parts();
            let Path(raw) = Path::<String>::from_request_parts(&mut parts, &())
                .await
                .map_err(|e| ApiError::request(e.status(), e.body_text()))?;
            let id = Uuid::parse_str(&raw)
                .map_err(|_| ApiError::validation("user_id", "must be a UUID"))?;

            let user = state.users.query_by_id(id).await?;
            Ok(Json(user.view()).into_response())
        }
    })
}

/// `POST /v1/users`
pub fn create(state: AppState) -> Handler {
    handler(move |req| {
        let state = state.clone();
        async move {
            let Json(new_user) = Json::<NewUser>::from_request(req, &())
                .await
                .map_err(|e| ApiError::request(e.status(), e.body_text()))?;

            let user = create_user(new_user, Utc::now()).await?;
            state.users.create(user.clone()).await?;

            tracing::info!(user_id = %user.id, roles = ?user.roles, "created user");
            Ok((StatusCode::CREATED, Json(user.view())).into_response())
        }
    })
}

/// Decode `Basic base64(email:password)`.
fn basic_credentials(header: Option<&str>) -> Result<(String, String), AuthError> {
    let value = header.ok_or(AuthError::NoCredential)?;
    let (scheme, encoded) = value.split_once(' ').ok_or(AuthError::NoCredential)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthError::NoCredential);
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthError::BadCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::BadCredentials)?;
    let (email, password) = decoded
        .split_once(':')
        .ok_or(AuthError::BadCredentials)?;
    Ok((email.to_string(), password.to_string()))
}
