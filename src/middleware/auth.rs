//! Resolve the caller's `Identity` once per request.
//!
//! - credential material (headers, query, form body) → `RequestCredentials`
//! - `AuthService` の認証チェーンで Identity を決定し extensions に入れる
//! - 認証失敗は基本 Anonymous として続行 (delegated 失敗ポリシーが Reject の時だけ 401)

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{OriginalUri, State},
    http::{Request, header, request::Parts},
    middleware::{self, Next},
    response::Response,
};
use http_body_util::LengthLimitError;

use crate::error::AppError;
use crate::services::auth::extractors::RequestCredentials;
use crate::state::AppState;

/// Largest form body buffered for credential lookup.
const FORM_BODY_LIMIT: usize = crate::middleware::http::BODY_LIMIT_BYTES;

/// Apply identity resolution to every route of `router`.
///
/// ```ignore
/// let app = middleware::auth::apply(api::routes(), state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, authenticate))
}

async fn authenticate(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();
    let mut credentials = credentials_from(&parts);

    // Form bodies may carry `access_token`; read them and hand the bytes back
    let body = if is_form(&parts) {
        let bytes = to_bytes(body, FORM_BODY_LIMIT).await.map_err(|err| {
            if is_length_limit(&err) {
                return AppError::PayloadTooLarge;
            }
            tracing::warn!(error = %err, "failed to read form body");
            AppError::bad_request("INVALID_BODY", "request body could not be read")
        })?;
        credentials = credentials.with_form(&bytes);
        Body::from(bytes)
    } else {
        body
    };

    let identity = state.auth.authenticate(&credentials).await?;
    tracing::debug!(user = %identity.id(), kind = identity.kind(), "request identity");

    parts.extensions.insert(identity);
    Ok(next.run(Request::from_parts(parts, body)).await)
}

fn credentials_from(parts: &Parts) -> RequestCredentials {
    let mut credentials = RequestCredentials::from_parts(parts);
    // Nested routers strip their prefix; signatures cover the full path
    if let Some(OriginalUri(uri)) = parts.extensions.get::<OriginalUri>() {
        credentials.path = uri.path().to_string();
    }
    credentials
}

/// Only `application/x-www-form-urlencoded` bodies are read; multipart passes through.
fn is_form(parts: &Parts) -> bool {
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            ct.trim()
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn body_over_the_limit_is_recognised() {
        let err = to_bytes(Body::from(vec![b'a'; 16]), 8).await.unwrap_err();
        assert!(is_length_limit(&err));
    }

    #[test]
    fn multipart_bodies_are_not_read() {
        let (parts, _) = Request::builder()
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
            .body(())
            .unwrap()
            .into_parts();
        assert!(!is_form(&parts));

        let (parts, _) = Request::builder()
            .header(
                header::CONTENT_TYPE,
                "application/x-www-form-urlencoded; charset=utf-8",
            )
            .body(())
            .unwrap()
            .into_parts();
        assert!(is_form(&parts));
    }
}
