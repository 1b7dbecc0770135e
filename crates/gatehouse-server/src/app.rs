//! Route registration on top of an axum [`Router`].

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::pipeline::{Handler, Pipeline, handler};
use axum::Router;
use axum::extract::{ConnectInfo, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, on};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;

/// The entry point into the service.
///
/// Every route runs the global pipeline, then its own stages, then the
/// handler. Unmatched paths run the global pipeline into a 404. A shutdown
/// error escaping the chain wakes the serving loop through `shutdown`.
pub struct App {
    router: Router,
    global: Pipeline,
    shutdown: Arc<Notify>,
}

impl App {
    pub fn new(shutdown: Arc<Notify>, global: Pipeline) -> Self {
        Self {
            router: Router::new(),
            global,
            shutdown,
        }
    }

    /// Register `handler` for `method` on `path` behind `stages`.
    pub fn handle(mut self, method: MethodFilter, path: &str, handler: Handler, stages: Pipeline) -> Self {
        let chain = self.global.then(&stages).compose(handler);
        tracing::debug!(path, stages = ?self.global.then(&stages), "registered route");

        let shutdown = self.shutdown.clone();
        self.router = self.router.route(
            path,
            on(method, move |req: Request| dispatch(chain.clone(), shutdown.clone(), req)),
        );
        self
    }

    pub fn into_router(self) -> Router {
        let chain = self
            .global
            .compose(handler(|_req| async { Err(ApiError::NotFound) }));
        let shutdown = self.shutdown;
        self.router
            .fallback(move |req: Request| dispatch(chain.clone(), shutdown.clone(), req))
    }
}

async fn dispatch(chain: Handler, shutdown: Arc<Notify>, mut req: Request) -> Response {
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    req.extensions_mut().insert(RequestContext::new(remote_addr));

    match chain(req).await {
        Ok(response) => response,
        Err(err) => {
            if err.is_shutdown() {
                tracing::warn!(error = %err, "request triggered shutdown");
                shutdown.notify_one();
            }
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Errors;
    use axum::body::Body;
    use axum::http::StatusCode;
    use std::time::Duration;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_routes_and_methods() {
        let app = App::new(Arc::new(Notify::new()), Pipeline::new())
            .handle(
                MethodFilter::GET,
                "/ping",
                handler(|_req| async { Ok("pong".into_response()) }),
                Pipeline::new(),
            )
            .into_router();

        let ok = app
            .clone()
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let wrong_method = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unknown_path_runs_global_pipeline() {
        let app = App::new(Arc::new(Notify::new()), Pipeline::new().stage(Errors::default()))
            .handle(
                MethodFilter::GET,
                "/ping",
                handler(|_req| async { Ok("pong".into_response()) }),
                Pipeline::new(),
            )
            .into_router();

        let response = app
            .oneshot(Request::builder().uri("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"error":"Not Found"}"#);
    }

    #[tokio::test]
    async fn test_context_is_attached() {
        let app = App::new(Arc::new(Notify::new()), Pipeline::new())
            .handle(
                MethodFilter::GET,
                "/ctx",
                handler(|req| async move {
                    let ctx = req.extensions().get::<RequestContext>().cloned();
                    Ok(ctx.map(|c| c.remote_addr).unwrap_or_default().into_response())
                }),
                Pipeline::new(),
            )
            .into_router();

        let response = app
            .oneshot(Request::builder().uri("/ctx").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"unknown");
    }

    #[tokio::test]
    async fn test_shutdown_error_notifies() {
        let shutdown = Arc::new(Notify::new());
        let app = App::new(shutdown.clone(), Pipeline::new().stage(Errors::default()))
            .handle(
                MethodFilter::POST,
                "/halt",
                handler(|_req| async { Err(ApiError::Shutdown("integrity check failed".into())) }),
                Pipeline::new(),
            )
            .into_router();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/halt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        tokio::time::timeout(Duration::from_secs(1), shutdown.notified())
            .await
            .expect("shutdown was signalled");
    }
}
