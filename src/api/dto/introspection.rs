use serde::Serialize;

use crate::services::auth::PermissionCatalog;
use crate::services::auth::service::{GrantedPermission, HeartbeatFailure};

/// `GET /__permissions__`
#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub description: &'static str,
    pub user_id: Option<String>,
    pub permissions: Vec<String>,
}

/// `GET /__user__`
#[derive(Debug, Serialize)]
pub struct UserResponse<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub permissions: Vec<GrantedPermission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticated_email: Option<String>,
    pub catalog: &'a PermissionCatalog,
}

/// `GET /__heartbeat__`
#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<HeartbeatFailure>,
}
