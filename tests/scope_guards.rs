mod common;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use backend_auth::middleware::guard;
use backend_auth::services::auth::{ScopeRequirement, TokenClaims};
use backend_auth::state::AppState;
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{MemoryStore, get as request, json, now, send, signed_builder, state, with_identity};

const DOWNLOAD: &str = "project:releng:services/tooltool/api/download.internal";
const UPLOAD: &str = "project:releng:services/tooltool/api/upload.internal";

fn guarded(requirement: &str) -> Router<AppState> {
    guard::require_scopes(
        Router::new().route("/resource", get(|| async { "granted" })),
        ScopeRequirement::all([requirement]).unwrap(),
    )
}

fn temporary_token(permissions: &[&str]) -> (AppState, String) {
    let state = state(signed_builder(MemoryStore::with([])).build().unwrap());
    let claims = TokenClaims::temporary(
        now() - 60,
        now() + 3600,
        permissions.iter().map(|p| p.to_string()).collect(),
    );
    let token = state.auth.codec().unwrap().sign(&claims).unwrap();
    (state, token)
}

#[tokio::test]
async fn temporary_token_with_required_scope_is_admitted() {
    let (state, token) = temporary_token(&[DOWNLOAD]);
    let app = with_identity(guarded(DOWNLOAD), state);

    let response = send(app, request("/resource", Some(&format!("Bearer {token}")))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_scope_answers_fixed_body() {
    let (state, token) = temporary_token(&[DOWNLOAD]);
    let app = with_identity(guarded(UPLOAD), state);

    let response = send(app, request("/resource", Some(&format!("Bearer {token}")))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json(response).await,
        json!({
            "status": 401,
            "title": "401 Unauthorized: Invalid user scopes",
            "detail": "Invalid user scopes",
            "instance": "about:blank",
            "type": "about:blank",
        })
    );
}

#[tokio::test]
async fn expired_token_degrades_to_anonymous() {
    let state = state(signed_builder(MemoryStore::with([])).build().unwrap());
    let claims = TokenClaims::temporary(now() - 7200, now() - 3600, vec![DOWNLOAD.to_string()]);
    let token = state.auth.codec().unwrap().sign(&claims).unwrap();
    let app = with_identity(guarded(DOWNLOAD), state);

    let response = send(app, request("/resource", Some(&format!("Bearer {token}")))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json(response).await["title"],
        "401 Unauthorized: Invalid user scopes"
    );
}

#[tokio::test]
async fn wildcard_grant_covers_requirement() {
    let (state, token) = temporary_token(&["project:releng:services/tooltool/*"]);
    let app = with_identity(guarded(UPLOAD), state);

    let response = send(app, request("/resource", Some(&format!("Bearer {token}")))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_guard_rejects_anonymous() {
    let state = state(signed_builder(MemoryStore::with([])).build().unwrap());
    let app = with_identity(
        guard::require_login(Router::new().route("/me", get(|| async { "me" }))),
        state,
    );

    let response = send(app, request("/me", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(response).await["error"]["code"], "UNAUTHORIZED");
}
