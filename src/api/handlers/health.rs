/*
 * Responsibility
 * - GET /health (疎通用, 上流には触れない)
 * - GET /__heartbeat__ (有効な認証方式の上流 IdP の疎通確認)
 */
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::api::dto::introspection::HeartbeatResponse;
use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

pub async fn heartbeat(State(state): State<AppState>) -> impl IntoResponse {
    let failures = state.auth.heartbeat().await;
    if failures.is_empty() {
        return (
            StatusCode::OK,
            Json(HeartbeatResponse {
                status: "ok",
                failures,
            }),
        );
    }
    (
        StatusCode::BAD_GATEWAY,
        Json(HeartbeatResponse {
            status: "error",
            failures,
        }),
    )
}
