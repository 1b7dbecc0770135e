//! Route table.

pub mod status;
pub mod users;

use crate::app::App;
use crate::middleware::{Authenticate, Authorize, Errors, Logger, Metrics, Panics};
use crate::pipeline::Pipeline;
use crate::state::AppState;
use axum::Router;
use axum::routing::MethodFilter;
use gatehouse_policy::Rule;
use std::sync::Arc;
use tokio::sync::Notify;

/// The stages every route runs, outermost first.
pub fn global_pipeline(state: &AppState) -> Pipeline {
    Pipeline::new()
        .stage(Logger)
        .stage(Errors::new(state.classifier))
        .stage(Metrics::new(state.metrics.clone()))
        .stage(Panics::new(state.metrics.clone()))
}

/// Authenticate, then authorize against `rule`.
pub fn guarded(state: &AppState, rule: Rule) -> Pipeline {
    Pipeline::new()
        .stage(Authenticate::new(state.gateway.clone()))
        .stage(Authorize::new(state.gateway.clone(), rule))
}

/// Build the router for every service route.
pub fn router(state: AppState, shutdown: Arc<Notify>) -> Router {
    let app = App::new(shutdown, global_pipeline(&state));
    mount(app, &state).into_router()
}

/// Register the service routes on `app`.
pub fn mount(app: App, state: &AppState) -> App {
    let owner_or_admin = Pipeline::new()
        .stage(Authenticate::new(state.gateway.clone()))
        .stage(
            Authorize::new(state.gateway.clone(), Rule::AdminOrSubject)
                .with_user_id_param("user_id"),
        );

    app.handle(MethodFilter::GET, "/healthz", status::health(), Pipeline::new())
        .handle(MethodFilter::GET, "/v1/status", status::status(), Pipeline::new())
        .handle(
            MethodFilter::GET,
            "/v1/status/auth",
            status::status(),
            guarded(state, Rule::AdminOnly),
        )
        .handle(
            MethodFilter::GET,
            "/debug/vars",
            status::debug_vars(state.metrics.clone()),
            Pipeline::new(),
        )
        .handle(
            MethodFilter::POST,
            "/v1/users/token",
            users::token(state.clone()),
            Pipeline::new(),
        )
        .handle(
            MethodFilter::POST,
            "/v1/users",
            users::create(state.clone()),
            guarded(state, Rule::AdminOnly),
        )
        .handle(
            MethodFilter::GET,
            "/v1/users/{user_id}",
            users::query_by_id(state.clone()),
            owner_or_admin,
        )
}
