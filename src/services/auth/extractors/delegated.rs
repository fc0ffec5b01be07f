use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use url::Url;

use crate::services::auth::error::AuthError;
use crate::services::auth::extractors::{CredentialExtractor, RequestCredentials, Scheme};
use crate::services::auth::identity::{DelegatedCredential, Identity};

const AUTH_SUCCESS: &str = "auth-success";

/// Canonical signing context sent to the verification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningContext {
    pub resource: String,
    pub method: String,
    pub host: String,
    pub port: u16,
    pub authorization: String,
}

impl SigningContext {
    pub fn from_request(request: &RequestCredentials) -> Result<Self, AuthError> {
        let authorization = request.authorization().ok_or(AuthError::NoCredential)?;
        let raw_host = request
            .host
            .as_deref()
            .ok_or_else(|| AuthError::malformed("request has no host"))?;
        let bad_host = || AuthError::malformed(format!("invalid host {raw_host:?}"));

        let (host, port) = split_host_port(raw_host).ok_or_else(bad_host)?;
        let port = match port {
            Some(port) => port.parse::<u16>().map_err(|_| bad_host())?,
            None => {
                let forwarded = request
                    .header("x-forwarded-port")
                    .map(|p| p.trim().parse::<u16>().map_err(|_| bad_forwarded_port(p)))
                    .transpose()?;
                forwarded.unwrap_or(match request.scheme.as_str() {
                    "https" => 443,
                    _ => 80,
                })
            }
        };

        Ok(Self {
            resource: request.path.clone(),
            method: request.method.as_str().to_ascii_lowercase(),
            host: host.to_string(),
            port,
            authorization: authorization.to_string(),
        })
    }
}

fn bad_forwarded_port(value: &str) -> AuthError {
    AuthError::malformed(format!("invalid X-Forwarded-Port {value:?}"))
}

/// `host[:port]`, where host may be a bracketed IPv6 literal (`[::1]:8080`).
fn split_host_port(raw: &str) -> Option<(&str, Option<&str>)> {
    if raw.starts_with('[') {
        let end = raw.find(']')?;
        let (host, rest) = raw.split_at(end + 1);
        if rest.is_empty() {
            return Some((host, None));
        }
        return rest.strip_prefix(':').map(|port| (host, Some(port)));
    }

    Some(match raw.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (raw, None),
    })
}

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    status: String,
    #[serde(rename = "clientId", default)]
    client_id: Option<String>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PingResponse {
    alive: bool,
}

/// Signed (Hawk-style) requests verified by the external service.
pub struct DelegatedCredentialExtractor {
    client: reqwest::Client,
    root_url: Url,
}

impl DelegatedCredentialExtractor {
    pub fn new(client: reqwest::Client, root_url: Url, service_client_id: Option<&str>) -> Self {
        info!(
            root_url = %root_url,
            client_id = service_client_id.unwrap_or("<none>"),
            "delegated credential verification enabled"
        );
        Self { client, root_url }
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.root_url
            .join(path)
            .map_err(|e| AuthError::UpstreamUnavailable(e.to_string()))
    }

    async fn verify(&self, context: &SigningContext) -> Result<VerificationResponse, AuthError> {
        let url = self.endpoint("api/auth/v1/authenticate-hawk")?;

        let response = self
            .client
            .post(url)
            .json(context)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!(error = %e, payload = ?context, "delegated credential verification failed");
                AuthError::UpstreamUnavailable(e.to_string())
            })?;

        response.json().await.map_err(|e| {
            error!(error = %e, payload = ?context, "invalid verification response");
            AuthError::UpstreamUnavailable(e.to_string())
        })
    }
}

#[async_trait]
impl CredentialExtractor for DelegatedCredentialExtractor {
    fn scheme(&self) -> Scheme {
        Scheme::DelegatedCredential
    }

    async fn extract(&self, request: &RequestCredentials) -> Result<Identity, AuthError> {
        let context = SigningContext::from_request(request)?;
        let resp = self.verify(&context).await?;

        if resp.status != AUTH_SUCCESS {
            warn!(
                status = %resp.status,
                message = resp.message.as_deref().unwrap_or(""),
                payload = ?context,
                "verification service rejected the request"
            );
            return Err(AuthError::Rejected(resp.status));
        }

        let client_id = resp
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AuthError::Rejected("verification response without clientId".into()))?;

        Ok(Identity::DelegatedCredential(DelegatedCredential {
            client_id,
            scopes: resp.scopes.into_iter().collect::<BTreeSet<_>>(),
        }))
    }

    async fn heartbeat(&self) -> Result<(), String> {
        let url = self
            .endpoint("api/auth/v1/ping")
            .map_err(|e| e.to_string())?;
        let ping: PingResponse = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;

        if ping.alive {
            Ok(())
        } else {
            Err("Cannot connect to the delegated credential service".to_string())
        }
    }
}
