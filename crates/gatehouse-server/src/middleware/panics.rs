//! Panic containment.

use crate::context::trace_id;
use crate::error::ApiError;
use crate::metrics::Metrics;
use crate::pipeline::{Handler, Stage, handler};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Converts a panic anywhere downstream into [`ApiError::Panic`].
///
/// The panic message is logged here and kept in the error for the log line
/// written by the error stage; it never reaches the response.
#[derive(Debug, Clone)]
pub struct Panics {
    metrics: Arc<Metrics>,
}

impl Panics {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl Stage for Panics {
    fn name(&self) -> &'static str {
        "panics"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let metrics = self.metrics.clone();
        handler(move |req| {
            let next = next.clone();
            let metrics = metrics.clone();
            async move {
                let trace_id = trace_id(&req);

                // The call itself sits inside the async block so a panic
                // while building the future is caught too.
                let outcome = AssertUnwindSafe(async move { next(req).await })
                    .catch_unwind()
                    .await;

                outcome.unwrap_or_else(|payload| {
                    let detail = panic_message(payload.as_ref());
                    metrics.record_panic();
                    tracing::error!(trace_id = %trace_id, panic = %detail, "recovered from panic");
                    Err(ApiError::Panic { detail })
                })
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
