use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

use crate::services::auth::error::AuthError;
use crate::services::auth::extractors::{CredentialExtractor, RequestCredentials, Scheme};
use crate::services::auth::identity::{ExternalIdentity, Identity, ScopeAllowList};

const ACCESS_TOKEN_FIELD: &str = "access_token";

#[derive(Debug, Deserialize)]
struct Userinfo {
    email: Option<String>,
}

/// Bearer tokens resolved against the identity provider's userinfo endpoint.
pub struct OidcExtractor {
    client: reqwest::Client,
    userinfo_url: Url,
    heartbeat_url: Option<Url>,
    allow_list: Arc<ScopeAllowList>,
}

impl OidcExtractor {
    pub fn new(
        client: reqwest::Client,
        userinfo_url: Url,
        heartbeat_url: Option<Url>,
        allow_list: Arc<ScopeAllowList>,
    ) -> Self {
        Self {
            client,
            userinfo_url,
            heartbeat_url,
            allow_list,
        }
    }

    /// Form field, then query parameter, then `Authorization: Bearer`.
    pub fn bearer_token<'a>(request: &'a RequestCredentials) -> Result<&'a str, AuthError> {
        if let Some(token) = request.form_param(ACCESS_TOKEN_FIELD) {
            return Ok(token);
        }
        if let Some(token) = request.query_param(ACCESS_TOKEN_FIELD) {
            return Ok(token);
        }

        let header = request
            .header(axum::http::header::AUTHORIZATION.as_str())
            .ok_or(AuthError::NoCredential)?;
        let parts: Vec<&str> = header.split_whitespace().collect();
        match parts.as_slice() {
            [kind, token] if kind.eq_ignore_ascii_case("bearer") => Ok(*token),
            _ => Err(AuthError::malformed("expected `Bearer <token>`")),
        }
    }

    async fn userinfo(&self, token: &str) -> Result<Userinfo, AuthError> {
        let response = self
            .client
            .get(self.userinfo_url.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.userinfo_url, error = %e, "userinfo request failed");
                AuthError::UpstreamUnavailable(e.to_string())
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            error!(url = %self.userinfo_url, error = %e, "failed to read userinfo response");
            AuthError::UpstreamUnavailable(e.to_string())
        })?;

        // The provider may answer 200 with a plain `Unauthorized` body.
        if !status.is_success() || body.as_ref() == b"Unauthorized" {
            debug!(%status, "identity provider refused the token");
            return Err(AuthError::NoCredential);
        }

        serde_json::from_slice(&body).map_err(|e| {
            error!(error = %e, "userinfo response is not valid json");
            AuthError::Rejected(format!("invalid userinfo: {e}"))
        })
    }
}

#[async_trait]
impl CredentialExtractor for OidcExtractor {
    fn scheme(&self) -> Scheme {
        Scheme::ExternalIdentity
    }

    async fn extract(&self, request: &RequestCredentials) -> Result<Identity, AuthError> {
        let token = Self::bearer_token(request)?;
        let userinfo = self.userinfo(token).await?;

        let email = userinfo
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::Rejected("userinfo without email".into()))?;

        Ok(Identity::ExternalIdentity(ExternalIdentity {
            token: token.to_string(),
            email,
            allow_list: Arc::clone(&self.allow_list),
        }))
    }

    async fn heartbeat(&self) -> Result<(), String> {
        let Some(url) = &self.heartbeat_url else {
            return Ok(());
        };

        let body: serde_json::Value = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;

        if body.get("clock").is_some() {
            Ok(())
        } else {
            Err("Cannot connect to the identity provider".to_string())
        }
    }
}
