use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::repos::TokenStore;
use crate::services::auth::chain::{AuthenticatorChain, DelegatedFailurePolicy};
use crate::services::auth::claims::ClaimsCodec;
use crate::services::auth::error::{AuthError, SetupError};
use crate::services::auth::extractors::{
    CredentialExtractor, DelegatedCredentialExtractor, OidcExtractor, RequestCredentials,
    SignedTokenExtractor,
};
use crate::services::auth::identity::{Identity, ScopeAllowList};
use crate::services::auth::permissions::{NamespaceTranslator, PermissionCatalog};
use crate::services::auth::scopes::covers;

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Catalog entry the current identity holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantedPermission {
    pub name: String,
    pub doc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeartbeatFailure {
    pub scheme: &'static str,
    pub error: String,
}

/// Process-wide authentication/authorization service.
///
/// Built once at startup and shared read-only by every request.
pub struct AuthService {
    chain: AuthenticatorChain,
    codec: Option<Arc<ClaimsCodec>>,
    translator: Arc<NamespaceTranslator>,
    catalog: PermissionCatalog,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("AuthService")
            .field("chain", &self.chain)
            .field("translator", &self.translator)
            .finish()
    }
}

impl AuthService {
    pub fn builder() -> AuthServiceBuilder {
        AuthServiceBuilder::default()
    }

    pub async fn authenticate(&self, request: &RequestCredentials) -> Result<Identity, AuthError> {
        self.chain.authenticate(request).await
    }

    /// Present only when the signed-token scheme is enabled.
    pub fn codec(&self) -> Option<&ClaimsCodec> {
        self.codec.as_deref()
    }

    pub fn translator(&self) -> &NamespaceTranslator {
        &self.translator
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    /// Catalog entries (legacy names) covered by the identity's permissions.
    pub fn granted_catalog_entries(&self, identity: &Identity) -> Vec<GrantedPermission> {
        let granted = identity.permissions();
        self.catalog
            .iter()
            .filter(|(name, _)| {
                let required = self.translator.to_hierarchical(name);
                granted.iter().any(|g| covers(g, &required))
            })
            .map(|(name, doc)| GrantedPermission {
                name: name.to_string(),
                doc: doc.to_string(),
            })
            .collect()
    }

    /// Upstreams of enabled schemes that are not answering.
    pub async fn heartbeat(&self) -> Vec<HeartbeatFailure> {
        let mut failures = Vec::new();
        for extractor in self.chain.extractors() {
            if let Err(error) = extractor.heartbeat().await {
                tracing::error!(scheme = extractor.scheme().as_str(), %error, "heartbeat failed");
                failures.push(HeartbeatFailure {
                    scheme: extractor.scheme().as_str(),
                    error,
                });
            }
        }
        failures
    }
}

struct SignedTokenSettings {
    secret_key: Vec<u8>,
    store: Arc<dyn TokenStore>,
}

struct OidcSettings {
    userinfo_url: String,
    heartbeat_url: Option<String>,
    allow_list: ScopeAllowList,
}

struct DelegatedSettings {
    root_url: String,
    client_id: Option<String>,
}

/// Assembles an [`AuthService`]. Schemes are tried in the fixed order
/// signed-token, external-identity, delegated-credential; each one is only
/// present if it was configured here.
pub struct AuthServiceBuilder {
    signed_token: Option<SignedTokenSettings>,
    oidc: Option<OidcSettings>,
    delegated: Option<DelegatedSettings>,
    delegated_failure_policy: DelegatedFailurePolicy,
    upstream_timeout: Duration,
    translator: NamespaceTranslator,
    catalog: PermissionCatalog,
}

impl Default for AuthServiceBuilder {
    fn default() -> Self {
        Self {
            signed_token: None,
            oidc: None,
            delegated: None,
            delegated_failure_policy: DelegatedFailurePolicy::default(),
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            translator: NamespaceTranslator::default(),
            catalog: PermissionCatalog::default(),
        }
    }
}

impl AuthServiceBuilder {
    pub fn signed_tokens(
        mut self,
        secret_key: impl Into<Vec<u8>>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        self.signed_token = Some(SignedTokenSettings {
            secret_key: secret_key.into(),
            store,
        });
        self
    }

    pub fn oidc(
        mut self,
        userinfo_url: impl Into<String>,
        heartbeat_url: Option<String>,
        allow_list: ScopeAllowList,
    ) -> Self {
        self.oidc = Some(OidcSettings {
            userinfo_url: userinfo_url.into(),
            heartbeat_url,
            allow_list,
        });
        self
    }

    pub fn delegated(mut self, root_url: impl Into<String>, client_id: Option<String>) -> Self {
        self.delegated = Some(DelegatedSettings {
            root_url: root_url.into(),
            client_id,
        });
        self
    }

    pub fn delegated_failure_policy(mut self, policy: DelegatedFailurePolicy) -> Self {
        self.delegated_failure_policy = policy;
        self
    }

    pub fn upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn translator(mut self, translator: NamespaceTranslator) -> Self {
        self.translator = translator;
        self
    }

    pub fn catalog(mut self, catalog: PermissionCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn build(self) -> Result<AuthService, SetupError> {
        let client = reqwest::Client::builder()
            .timeout(self.upstream_timeout)
            .build()?;
        let translator = Arc::new(self.translator);

        let mut extractors: Vec<Arc<dyn CredentialExtractor>> = Vec::new();
        let mut codec = None;

        if let Some(settings) = self.signed_token {
            let c = Arc::new(ClaimsCodec::new(&settings.secret_key));
            extractors.push(Arc::new(SignedTokenExtractor::new(
                Arc::clone(&c),
                settings.store,
                Arc::clone(&translator),
            )));
            codec = Some(c);
        }

        if let Some(settings) = self.oidc {
            let userinfo_url = parse_url("userinfo url", &settings.userinfo_url)?;
            let heartbeat_url = settings
                .heartbeat_url
                .as_deref()
                .map(|u| parse_url("heartbeat url", u))
                .transpose()?;
            extractors.push(Arc::new(OidcExtractor::new(
                client.clone(),
                userinfo_url,
                heartbeat_url,
                Arc::new(settings.allow_list),
            )));
        }

        if let Some(settings) = self.delegated {
            // join() needs a trailing slash to keep any path on the root url
            let mut root = settings.root_url;
            if !root.ends_with('/') {
                root.push('/');
            }
            let root_url = parse_url("delegated credential root url", &root)?;
            extractors.push(Arc::new(DelegatedCredentialExtractor::new(
                client,
                root_url,
                settings.client_id.as_deref(),
            )));
        }

        Ok(AuthService {
            chain: AuthenticatorChain::new(extractors, self.delegated_failure_policy),
            codec,
            translator,
            catalog: self.catalog,
        })
    }
}

fn parse_url(what: &'static str, raw: &str) -> Result<Url, SetupError> {
    Url::parse(raw).map_err(|source| SetupError::InvalidUrl { what, source })
}
