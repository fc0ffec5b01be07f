#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response};
use backend_auth::repos::{RepoResult, TokenRecord, TokenStore};
use backend_auth::services::auth::{AuthService, AuthServiceBuilder};
use backend_auth::state::AppState;
use backend_auth::{api, middleware};
use serde_json::Value;
use tower::ServiceExt;

pub const SECRET_KEY: &[u8] = b"integration-secret";

/// Token records kept in a map instead of Postgres.
#[derive(Default)]
pub struct MemoryStore {
    records: HashMap<i64, TokenRecord>,
}

impl MemoryStore {
    pub fn with(records: impl IntoIterator<Item = TokenRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: records.into_iter().map(|r| (r.id, r)).collect(),
        })
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn get(&self, id: i64) -> RepoResult<Option<TokenRecord>> {
        Ok(self.records.get(&id).cloned())
    }
}

pub fn signed_builder(store: Arc<MemoryStore>) -> AuthServiceBuilder {
    AuthService::builder().signed_tokens(SECRET_KEY, store)
}

pub fn state(auth: AuthService) -> AppState {
    AppState::new(Arc::new(auth))
}

/// The introspection routes behind identity resolution, as the binary serves them.
pub fn app(state: AppState) -> Router {
    middleware::auth::apply(api::routes(), state.clone()).with_state(state)
}

/// Any router behind identity resolution.
pub fn with_identity(router: Router<AppState>, state: AppState) -> Router {
    middleware::auth::apply(router, state.clone()).with_state(state)
}

pub fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .header("host", "api.example.com");
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(router: Router, request: Request<Body>) -> Response<Body> {
    router.oneshot(request).await.unwrap()
}

pub async fn json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
