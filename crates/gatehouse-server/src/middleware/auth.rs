//! Authentication and authorization stages.

use crate::context::{claims, trace_id};
use crate::gateway::AuthGateway;
use crate::pipeline::{Handler, Stage, handler};
use axum::extract::{FromRequestParts, Path, Request};
use axum::http::header::AUTHORIZATION;
use gatehouse_policy::Rule;
use std::collections::HashMap;
use std::sync::Arc;

/// Verifies the bearer token and attaches its claims to the request.
#[derive(Debug, Clone)]
pub struct Authenticate {
    gateway: Arc<AuthGateway>,
}

impl Authenticate {
    pub fn new(gateway: Arc<AuthGateway>) -> Self {
        Self { gateway }
    }
}

impl Stage for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let gateway = self.gateway.clone();
        handler(move |mut req| {
            let next = next.clone();
            let gateway = gateway.clone();
            async move {
                let header = req
                    .headers()
                    .get(AUTHORIZATION)
                    .and_then(|value| value.to_str().ok());

                let claims = gateway.authenticate(header).inspect_err(|e| {
                    tracing::info!(trace_id = %trace_id(&req), reason = %e, "authentication denied");
                })?;

                tracing::debug!(trace_id = %trace_id(&req), sub = %claims.sub, "authenticated");
                req.extensions_mut().insert(claims);
                next(req).await
            }
        })
    }
}

/// Evaluates one authorization rule against the authenticated claims.
///
/// Must run after [`Authenticate`]; without claims the request is denied.
#[derive(Debug, Clone)]
pub struct Authorize {
    gateway: Arc<AuthGateway>,
    rule: Rule,
    user_id_param: Option<&'static str>,
}

impl Authorize {
    pub fn new(gateway: Arc<AuthGateway>, rule: Rule) -> Self {
        Self {
            gateway,
            rule,
            user_id_param: None,
        }
    }

    /// Take the targeted user id from this path parameter.
    pub fn with_user_id_param(mut self, param: &'static str) -> Self {
        self.user_id_param = Some(param);
        self
    }
}

impl Stage for Authorize {
    fn name(&self) -> &'static str {
        "authorize"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let gateway = self.gateway.clone();
        let rule = self.rule;
        let param = self.user_id_param;
        handler(move |req| {
            let next = next.clone();
            let gateway = gateway.clone();
            async move {
                let (req, user_id) = match param {
                    Some(name) => path_param(req, name).await,
                    None => (req, None),
                };

                let decision = gateway.authorize(claims(&req)?, rule, user_id.as_deref());
                if let Err(e) = decision {
                    tracing::info!(trace_id = %trace_id(&req), reason = %e, "authorization denied");
                    return Err(e.into());
                }
                next(req).await
            }
        })
    }
}

/// Read one path parameter, handing the request back.
async fn path_param(req: Request, name: &str) -> (Request, Option<String>) {
    let (mut parts, body) = req.into_parts();
    let params = Path::<HashMap<String, String>>::from_request_parts(&mut parts, &())
        .await
        .map(|Path(params)| params)
        .unwrap_or_default();

    let value = params.get(name).cloned();
    if value.is_none() {
        tracing::warn!(param = name, "authorization path parameter missing from route");
    }
    (Request::from_parts(parts, body), value)
}
