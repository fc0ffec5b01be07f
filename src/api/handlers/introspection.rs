/*
 * Responsibility
 * - GET /__permissions__ : 呼び出し元の id と permission 一覧
 * - GET /__user__        : Identity の種類, 保持している catalog entry
 * - GET /__token__       : 提示された signed token の内容 (login 必須)
 */
use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::api::dto::introspection::{PermissionsResponse, UserResponse};
use crate::api::extractors::CurrentIdentity;
use crate::error::AppError;
use crate::state::AppState;

pub async fn get_permissions(CurrentIdentity(identity): CurrentIdentity) -> Response {
    let mut body = PermissionsResponse {
        description: "Permissions of a logged in user",
        user_id: None,
        permissions: Vec::new(),
    };

    if identity.is_authenticated() {
        body.user_id = Some(identity.id());
        body.permissions = identity.permissions().into_iter().collect();
    }

    ([(header::CACHE_CONTROL, "public, max-age=60")], Json(body)).into_response()
}

pub async fn get_user(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Response {
    Json(UserResponse {
        kind: identity.kind(),
        permissions: state.auth.granted_catalog_entries(&identity),
        authenticated_email: identity.authenticated_email().map(str::to_string),
        catalog: state.auth.catalog(),
    })
    .into_response()
}

pub async fn get_token(CurrentIdentity(identity): CurrentIdentity) -> Result<Response, AppError> {
    let token = identity
        .signed_token()
        .ok_or(AppError::not_found("token"))?;
    Ok(Json(token.describe()).into_response())
}
