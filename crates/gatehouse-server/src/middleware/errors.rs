//! Error classification: the only place error bodies are written.

use crate::context::trace_id;
use crate::error::{ApiError, ErrorClassifier};
use crate::pipeline::{Handler, Stage, handler};

/// Turns every downstream error into a response, except shutdown requests,
/// which are passed outward.
#[derive(Debug, Clone, Copy, Default)]
pub struct Errors {
    classifier: ErrorClassifier,
}

impl Errors {
    pub fn new(classifier: ErrorClassifier) -> Self {
        Self { classifier }
    }
}

impl Stage for Errors {
    fn name(&self) -> &'static str {
        "errors"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let classifier = self.classifier;
        handler(move |req| {
            let next = next.clone();
            async move {
                let trace_id = trace_id(&req);

                let err = match next(req).await {
                    Ok(response) => return Ok(response),
                    Err(err) => err,
                };

                if err.is_shutdown() {
                    tracing::error!(trace_id = %trace_id, error = %err, "shutdown requested");
                    return Err(err);
                }

                let response = classifier.respond(&err);
                if response.status().is_server_error() {
                    tracing::error!(trace_id = %trace_id, error = %format_args!("{err:#}"), "request failed");
                } else {
                    tracing::info!(trace_id = %trace_id, error = %err, status_code = response.status().as_u16(), "request rejected");
                }
                Ok(response)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use axum::body::{Body, to_bytes};
    use axum::extract::Request;
    use axum::http::StatusCode;

    fn request() -> Request {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_errors_become_responses() {
        let chain = Pipeline::new()
            .stage(Errors::default())
            .compose(handler(|_req| async {
                Err(ApiError::Internal(anyhow::anyhow!("db password is hunter2")))
            }));

        let response = chain(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"Internal Server Error"}"#);
    }

    #[tokio::test]
    async fn test_shutdown_passes_through() {
        let chain = Pipeline::new()
            .stage(Errors::default())
            .compose(handler(|_req| async {
                Err(ApiError::Shutdown("integrity check failed".into()))
            }));

        assert!(matches!(chain(request()).await, Err(ApiError::Shutdown(_))));
    }
}
