//! # gatehouse-server
//!
//! The HTTP face of Gatehouse.
//!
//! Requests flow through an ordered [`Pipeline`](pipeline::Pipeline) of
//! stages before reaching a handler:
//!
//! ```text
//! Logger → Errors → Metrics → Panics → Authenticate → Authorize → handler
//! ```
//!
//! The first four run on every route. Guarded routes add the two auth
//! stages, which consult the [`AuthGateway`](gateway::AuthGateway): token
//! verification, then the authentication policy, then one authorization
//! rule. Every failure is classified exactly once by the error stage into a
//! status and a `{"error": ...}` body.

pub mod app;
pub mod context;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod routes;
pub mod state;

pub use app::App;
pub use error::{ApiError, ErrorClassifier, ErrorResponse};
pub use gateway::{AuthError, AuthGateway};
pub use pipeline::{Handler, HandlerResult, Pipeline, Stage, handler};
pub use state::AppState;
