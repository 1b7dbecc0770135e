//! Handlers, stages and the pipeline builder.
//!
//! A [`Stage`] wraps a [`Handler`] and returns a new one that may run logic
//! before and after the inner call, or skip it entirely. A [`Pipeline`] is an
//! ordered list of stages: the first stage added is the outermost.

use crate::error::ApiError;
use axum::extract::Request;
use axum::response::Response;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What every handler and stage produces.
pub type HandlerResult = Result<Response, ApiError>;

/// A type-erased request handler.
pub type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Turn an async function into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |req: Request| -> BoxFuture<'static, HandlerResult> { Box::pin(f(req)) })
}

/// A cross-cutting concern that wraps the next handler.
pub trait Stage: Send + Sync {
    /// Short name, used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Wrap `next`.
    fn wrap(&self, next: Handler) -> Handler;
}

/// An ordered chain of stages.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage. It runs inside every stage added before it.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// This pipeline followed by `inner`.
    pub fn then(&self, inner: &Pipeline) -> Pipeline {
        let mut stages = self.stages.clone();
        stages.extend(inner.stages.iter().cloned());
        Pipeline { stages }
    }

    /// Wrap `handler` in every stage, first stage outermost.
    pub fn compose(&self, handler: Handler) -> Handler {
        self.stages
            .iter()
            .rev()
            .fold(handler, |next, stage| stage.wrap(next))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
