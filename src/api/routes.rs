/*
 * Responsibility
 * - URL 構造を定義
 * - login / scope が必要な範囲は middleware::guard で route_layer を掛ける
 */
use axum::{Router, routing::get};

use crate::api::handlers::{
    health::{health, heartbeat},
    introspection::{get_permissions, get_token, get_user},
};
use crate::middleware::guard;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    let login_required = guard::require_login(Router::new().route("/__token__", get(get_token)));

    Router::new()
        .route("/health", get(health))
        .route("/__heartbeat__", get(heartbeat))
        .route("/__permissions__", get(get_permissions))
        .route("/__user__", get(get_user))
        .merge(login_required)
}
