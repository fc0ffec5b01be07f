use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::services::auth::Identity;

/// Handler で Identity を受け取るための extractor
/// middleware::auth が request.extensions() に insert 済みである前提
/// 見つからない場合は Anonymous (認証チェーン未設定のルート)
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extensions.get::<Identity>().cloned();
        Ok(CurrentIdentity(identity.unwrap_or_default()))
    }
}
