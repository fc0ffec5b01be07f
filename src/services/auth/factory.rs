/// Factory: build `AuthService` from application `Config`.
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::repos::TokenStore;
use crate::services::auth::error::SetupError;
use crate::services::auth::permissions::NamespaceTranslator;
use crate::services::auth::service::AuthService;

pub fn build_auth_service(
    config: &Config,
    store: Option<Arc<dyn TokenStore>>,
) -> Result<Arc<AuthService>, SetupError> {
    let mut builder = AuthService::builder()
        .upstream_timeout(Duration::from_secs(config.upstream_timeout_seconds))
        .delegated_failure_policy(config.delegated_failure_policy);

    if let Some(mapping) = &config.namespace_mapping {
        builder = builder.translator(NamespaceTranslator::new(mapping.clone()));
    }

    if config.signed_token_auth {
        let secret = config
            .secret_key
            .as_deref()
            .ok_or(SetupError::MissingSignedTokenInput("SECRET_KEY"))?;
        let store = store.ok_or(SetupError::MissingSignedTokenInput("token store"))?;
        builder = builder.signed_tokens(secret.as_bytes(), store);
    }

    if let Some(oidc) = &config.oidc {
        builder = builder.oidc(
            oidc.userinfo_uri.clone(),
            oidc.heartbeat_uri(),
            oidc.allow_list.clone(),
        );
    }

    if let Some(delegated) = &config.delegated {
        builder = builder.delegated(delegated.root_url.clone(), delegated.client_id.clone());
    }

    let auth = builder.build()?;
    tracing::info!(?auth, "auth service ready");
    Ok(Arc::new(auth))
}
