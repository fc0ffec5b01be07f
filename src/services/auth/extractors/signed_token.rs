use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::repos::{TokenRecord, TokenStore};
use crate::services::auth::claims::{ClaimsCodec, DecodeError, TokenClaims, TokenType, jti_to_id};
use crate::services::auth::error::AuthError;
use crate::services::auth::extractors::{CredentialExtractor, RequestCredentials, Scheme};
use crate::services::auth::identity::{Identity, SignedTokenIdentity};
use crate::services::auth::permissions::NamespaceTranslator;

/// Locally signed tokens: `Authorization: <anything> <token>`.
pub struct SignedTokenExtractor {
    codec: Arc<ClaimsCodec>,
    store: Arc<dyn TokenStore>,
    translator: Arc<NamespaceTranslator>,
}

impl SignedTokenExtractor {
    pub fn new(
        codec: Arc<ClaimsCodec>,
        store: Arc<dyn TokenStore>,
        translator: Arc<NamespaceTranslator>,
    ) -> Self {
        Self {
            codec,
            store,
            translator,
        }
    }

    /// Turn verified claims into an identity, applying per-type rules.
    ///
    /// `now` is Unix seconds.
    pub async fn resolve(&self, claims: TokenClaims, now: i64) -> Result<Identity, AuthError> {
        let token = match claims.token_type {
            TokenType::Temporary => self.resolve_temporary(claims, now)?,
            TokenType::Permanent | TokenType::User => self.resolve_stored(claims).await?,
        };
        Ok(Identity::SignedToken(token))
    }

    fn resolve_temporary(
        &self,
        claims: TokenClaims,
        now: i64,
    ) -> Result<SignedTokenIdentity, AuthError> {
        let (Some(not_before), Some(expires)) = (claims.not_before, claims.expires) else {
            return Err(AuthError::malformed("temporary token without nbf/exp"));
        };
        if now < not_before || now > expires {
            debug!(now, not_before, expires, "temporary token not valid now");
            return Err(AuthError::ExpiredOrNotYetValid);
        }

        let permissions = self.translate(
            claims
                .permissions
                .iter()
                .flatten()
                .filter(|p| !p.is_empty())
                .map(String::as_str),
        );

        Ok(SignedTokenIdentity {
            claims,
            permissions,
            record: None,
            authenticated_email: None,
        })
    }

    async fn resolve_stored(&self, claims: TokenClaims) -> Result<SignedTokenIdentity, AuthError> {
        let id = claims
            .jti
            .as_deref()
            .and_then(jti_to_id)
            .ok_or_else(|| AuthError::malformed("jti not in the format `t$token_id`"))?;

        let record = self.lookup(id).await?;
        if record.token_type != claims.token_type {
            warn!(
                token_id = id,
                claimed = %claims.token_type,
                stored = %record.token_type,
                "token type does not match its record"
            );
            return Err(AuthError::DisabledOrUnknownRecord);
        }
        if claims.token_type == TokenType::User && record.disabled {
            debug!(token_id = id, "user token is disabled");
            return Err(AuthError::DisabledOrUnknownRecord);
        }

        let permissions = record.permissions(&self.translator).into_iter().collect();
        let authenticated_email = match claims.token_type {
            TokenType::User => record.owner.clone(),
            _ => None,
        };

        Ok(SignedTokenIdentity {
            claims,
            permissions,
            record: Some(record),
            authenticated_email,
        })
    }

    async fn lookup(&self, id: i64) -> Result<TokenRecord, AuthError> {
        match self.store.get(id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                debug!(token_id = id, "token record not found");
                Err(AuthError::DisabledOrUnknownRecord)
            }
            Err(err) => {
                error!(token_id = id, error = %err, "token store lookup failed");
                Err(AuthError::UpstreamUnavailable(err.to_string()))
            }
        }
    }

    fn translate<'a>(&self, legacy: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
        legacy.map(|p| self.translator.to_hierarchical(p)).collect()
    }
}

#[async_trait]
impl CredentialExtractor for SignedTokenExtractor {
    fn scheme(&self) -> Scheme {
        Scheme::SignedToken
    }

    async fn extract(&self, request: &RequestCredentials) -> Result<Identity, AuthError> {
        let header = request.authorization().ok_or(AuthError::NoCredential)?;

        let parts: Vec<&str> = header.split_whitespace().collect();
        let [_, token] = parts.as_slice() else {
            return Err(AuthError::malformed("expected `<type> <token>`"));
        };

        let claims = self.codec.verify(token).map_err(|err| {
            match &err {
                DecodeError::InvalidSignature(e) => warn!(error = %e, "invalid signature in token"),
                DecodeError::WrongIssuer(iss) => warn!(issuer = ?iss, "token from another issuer"),
                DecodeError::Malformed(reason) => warn!(%reason, "malformed token claims"),
            }
            AuthError::from(err)
        })?;

        self.resolve(claims, chrono::Utc::now().timestamp()).await
    }
}
