//! Request-scoped values.

use crate::error::ApiError;
use crate::gateway::AuthError;
use axum::extract::Request;
use gatehouse_token::Claims;
use std::time::Instant;
use uuid::Uuid;

/// Per-request values set when the request enters the service.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: Uuid,
    pub started: Instant,
    pub remote_addr: String,
}

impl RequestContext {
    pub fn new(remote_addr: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            started: Instant::now(),
            remote_addr: remote_addr.into(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// The request's context, created and attached if it has none yet.
pub fn ensure_context(req: &mut Request) -> RequestContext {
    if let Some(ctx) = req.extensions().get::<RequestContext>() {
        return ctx.clone();
    }
    let ctx = RequestContext::default();
    req.extensions_mut().insert(ctx.clone());
    ctx
}

/// Trace id for log lines, or nil when the request never got a context.
pub fn trace_id(req: &Request) -> Uuid {
    req.extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.trace_id)
        .unwrap_or_default()
}

/// The verified claims attached by the Authenticate stage.
pub fn claims(req: &Request) -> Result<&Claims, ApiError> {
    req.extensions()
        .get::<Claims>()
        .ok_or(ApiError::Auth(AuthError::NoCredential))
}
