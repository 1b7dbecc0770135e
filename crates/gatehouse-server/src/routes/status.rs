//! Liveness, status and counters.

use crate::context::claims;
use crate::metrics::Metrics;
use crate::pipeline::{Handler, handler};
use axum::Json;
use axum::response::IntoResponse;
use serde_json::json;
use std::sync::Arc;

pub fn health() -> Handler {
    handler(|_req| async { Ok(Json(json!({ "status": "ok" })).into_response()) })
}

/// Service status. On guarded routes the caller's subject is echoed back.
pub fn status() -> Handler {
    handler(|req| async move {
        let mut body = json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        });
        if let Ok(claims) = claims(&req) {
            body["subject"] = json!(claims.sub);
            body["roles"] = json!(claims.roles);
        }
        Ok(Json(body).into_response())
    })
}

pub fn debug_vars(metrics: Arc<Metrics>) -> Handler {
    handler(move |_req| {
        let snapshot = metrics.snapshot();
        async move { Ok(Json(snapshot).into_response()) }
    })
}
