//! Request start/completion logging.

use crate::context::ensure_context;
use crate::pipeline::{Handler, Stage, handler};

/// Logs every request on the way in and on the way out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

impl Stage for Logger {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn wrap(&self, next: Handler) -> Handler {
        handler(move |mut req| {
            let next = next.clone();
            async move {
                let ctx = ensure_context(&mut req);
                let method = req.method().clone();
                let path = match req.uri().query() {
                    Some(query) => format!("{}?{query}", req.uri().path()),
                    None => req.uri().path().to_string(),
                };

                tracing::info!(
                    trace_id = %ctx.trace_id,
                    method = %method,
                    path = %path,
                    remote_addr = %ctx.remote_addr,
                    "request started"
                );

                let result = next(req).await;

                let status = match &result {
                    Ok(response) => response.status(),
                    Err(err) => err.status(),
                };
                tracing::info!(
                    trace_id = %ctx.trace_id,
                    method = %method,
                    path = %path,
                    remote_addr = %ctx.remote_addr,
                    status_code = status.as_u16(),
                    since = ?ctx.started.elapsed(),
                    "request completed"
                );

                result
            }
        })
    }
}
