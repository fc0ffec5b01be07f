//! Endpoint guards: login / scope requirements checked before the handler runs.
//!
//! The identity is read from request extensions, so `middleware::auth::apply`
//! must wrap the router these guards are attached to.
//!
//! ```ignore
//! let upload = guard::require_scopes(
//!     Router::new().route("/upload", post(upload)),
//!     ScopeRequirement::all(["project:releng:services/tooltool/api/upload"])?,
//! );
//! ```

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::services::auth::{Identity, ScopeRequirement, guards};

/// Reject anonymous callers of every route in `router` with a plain 401.
pub fn require_login<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn(login_guard))
}

/// Reject callers of every route in `router` that miss `requirement`,
/// answering with the fixed "Invalid user scopes" 401 body.
pub fn require_scopes<S>(router: Router<S>, requirement: ScopeRequirement) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(
        Arc::new(requirement),
        scopes_guard,
    ))
}

fn identity(req: &Request<Body>) -> &Identity {
    static ANONYMOUS: Identity = Identity::Anonymous;
    req.extensions().get::<Identity>().unwrap_or(&ANONYMOUS)
}

async fn login_guard(req: Request<Body>, next: Next) -> Response {
    if !guards::require_login(identity(&req)) {
        return AppError::Unauthorized.into_response();
    }
    next.run(req).await
}

async fn scopes_guard(
    State(requirement): State<Arc<ScopeRequirement>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !guards::require_scopes(identity(&req), &requirement) {
        return AppError::InsufficientScopes.into_response();
    }
    next.run(req).await
}
