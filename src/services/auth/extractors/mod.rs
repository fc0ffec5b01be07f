//! Credential extractors: one per authentication scheme.
//!
//! Each extractor looks at the framework-independent `RequestCredentials`
//! and either resolves an `Identity` or explains why it could not.

pub mod delegated;
pub mod oidc;
pub mod signed_token;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, header, request::Parts};

use crate::services::auth::error::AuthError;
use crate::services::auth::identity::Identity;

pub use delegated::DelegatedCredentialExtractor;
pub use oidc::OidcExtractor;
pub use signed_token::SignedTokenExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    SignedToken,
    ExternalIdentity,
    DelegatedCredential,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignedToken => "signed-token",
            Self::ExternalIdentity => "external-identity",
            Self::DelegatedCredential => "delegated-credential",
        }
    }
}

#[async_trait]
pub trait CredentialExtractor: Send + Sync {
    fn scheme(&self) -> Scheme;

    async fn extract(&self, request: &RequestCredentials) -> Result<Identity, AuthError>;

    /// Liveness of the upstream this scheme depends on, if any.
    async fn heartbeat(&self) -> Result<(), String> {
        Ok(())
    }
}

/// The parts of an inbound request that carry credential material.
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    pub method: Method,
    pub path: String,
    pub scheme: String,
    pub host: Option<String>,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

impl RequestCredentials {
    pub fn from_parts(parts: &Parts) -> Self {
        let headers = parts.headers.clone();

        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()));

        let scheme = parts
            .uri
            .scheme_str()
            .or_else(|| {
                headers
                    .get("x-forwarded-proto")
                    .and_then(|v| v.to_str().ok())
            })
            .unwrap_or("http")
            .to_ascii_lowercase();

        let query = parts
            .uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            scheme,
            host,
            headers,
            query,
            form: Vec::new(),
        }
    }

    /// Attach fields of an `application/x-www-form-urlencoded` body.
    pub fn with_form(mut self, body: &[u8]) -> Self {
        self.form = url::form_urlencoded::parse(body).into_owned().collect();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `Authorization`, falling back to the non-standard `Authentication`.
    pub fn authorization(&self) -> Option<&str> {
        self.header(header::AUTHORIZATION.as_str())
            .filter(|v| !v.is_empty())
            .or_else(|| self.header("authentication").filter(|v| !v.is_empty()))
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        find(&self.query, name)
    }

    pub fn form_param(&self, name: &str) -> Option<&str> {
        find(&self.form, name)
    }
}

fn find<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(req: Request<()>) -> Parts {
        req.into_parts().0
    }

    #[test]
    fn reads_request_material() {
        let p = parts(
            Request::builder()
                .method("POST")
                .uri("/files/upload?access_token=abc&x=1")
                .header("host", "tooltool.example.com:8443")
                .header("x-forwarded-proto", "HTTPS")
                .header("authentication", "Bearer tok")
                .body(())
                .unwrap(),
        );
        let creds = RequestCredentials::from_parts(&p).with_form(b"access_token=from+form");

        assert_eq!(creds.method, Method::POST);
        assert_eq!(creds.path, "/files/upload");
        assert_eq!(creds.scheme, "https");
        assert_eq!(creds.host.as_deref(), Some("tooltool.example.com:8443"));
        assert_eq!(creds.query_param("access_token"), Some("abc"));
        assert_eq!(creds.form_param("access_token"), Some("from form"));
        assert_eq!(creds.authorization(), Some("Bearer tok"));
    }

    #[test]
    fn authorization_takes_precedence() {
        let p = parts(
            Request::builder()
                .uri("/")
                .header("authorization", "A b")
                .header("authentication", "C d")
                .body(())
                .unwrap(),
        );
        let creds = RequestCredentials::from_parts(&p);
        assert_eq!(creds.authorization(), Some("A b"));
        assert_eq!(creds.scheme, "http");
        assert!(creds.host.is_none());
    }
}
