//! Who is making the request.
//!
//! The set of schemes is closed, so `Identity` is a plain enum and callers
//! match on it exhaustively.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::repos::TokenRecord;
use crate::services::auth::claims::{TokenClaims, TokenType};

/// Server-side `permission -> [email]` allow-list for external identities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeAllowList {
    grants: BTreeMap<String, Vec<String>>,
}

impl ScopeAllowList {
    pub fn new(grants: BTreeMap<String, Vec<String>>) -> Self {
        Self { grants }
    }

    pub fn scopes_for(&self, email: &str) -> BTreeSet<String> {
        self.grants
            .iter()
            .filter(|(_, users)| users.iter().any(|u| u == email))
            .map(|(permission, _)| permission.clone())
            .collect()
    }
}

/// Identity resolved by the delegated-credential verification service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatedCredential {
    pub client_id: String,
    pub scopes: BTreeSet<String>,
}

/// Identity resolved through the OIDC provider's userinfo endpoint.
///
/// Permissions are looked up on demand in the allow-list, never taken from
/// the token itself.
#[derive(Clone)]
pub struct ExternalIdentity {
    pub token: String,
    pub email: String,
    pub allow_list: Arc<ScopeAllowList>,
}

impl std::fmt::Debug for ExternalIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the bearer token
        f.debug_struct("ExternalIdentity")
            .field("email", &self.email)
            .finish()
    }
}

/// Identity decoded from a locally signed token.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTokenIdentity {
    pub claims: TokenClaims,
    pub permissions: BTreeSet<String>,
    pub record: Option<TokenRecord>,
    pub authenticated_email: Option<String>,
}

/// JSON description of a presented signed token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenDescription {
    pub typ: TokenType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl SignedTokenIdentity {
    pub fn describe(&self) -> TokenDescription {
        let claims = &self.claims;
        let mut out = TokenDescription {
            typ: claims.token_type,
            not_before: claims.not_before_at(),
            expires: claims.expires_at(),
            metadata: claims.metadata.clone(),
            permissions: claims.permissions.clone(),
            // disabled records never authenticate
            disabled: false,
            id: None,
            description: None,
            user: None,
        };

        if let Some(record) = &self.record {
            out.id = Some(record.id);
            out.description = Some(record.description.clone());
            out.permissions = Some(self.permissions.iter().cloned().collect());
            out.user = record.owner.clone();
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    DelegatedCredential(DelegatedCredential),
    ExternalIdentity(ExternalIdentity),
    SignedToken(SignedTokenIdentity),
}

impl Identity {
    /// Stable, scheme-prefixed identifier.
    pub fn id(&self) -> String {
        match self {
            Self::Anonymous => "anonymous:".to_string(),
            Self::DelegatedCredential(c) => format!("taskcluster:{}", c.client_id),
            Self::ExternalIdentity(e) => format!("auth0:{}", e.email),
            Self::SignedToken(t) => {
                let mut parts = vec!["token".to_string(), t.claims.token_type.to_string()];
                if let Some(jti) = &t.claims.jti {
                    parts.push(format!("id={jti}"));
                }
                if let Some(email) = &t.authenticated_email {
                    parts.push(format!("user={email}"));
                }
                parts.join(":")
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::DelegatedCredential(_) => "taskcluster",
            Self::ExternalIdentity(_) => "auth0",
            Self::SignedToken(_) => "relengapi-token",
        }
    }

    pub fn permissions(&self) -> BTreeSet<String> {
        match self {
            Self::Anonymous => BTreeSet::new(),
            Self::DelegatedCredential(c) => c.scopes.clone(),
            Self::ExternalIdentity(e) => e.allow_list.scopes_for(&e.email),
            Self::SignedToken(t) => t.permissions.clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    pub fn authenticated_email(&self) -> Option<&str> {
        match self {
            Self::ExternalIdentity(e) => Some(&e.email),
            Self::SignedToken(t) => t.authenticated_email.as_deref(),
            Self::Anonymous | Self::DelegatedCredential(_) => None,
        }
    }

    pub fn signed_token(&self) -> Option<&SignedTokenIdentity> {
        match self {
            Self::SignedToken(t) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn anonymous_has_nothing() {
        let anon = Identity::Anonymous;
        assert!(anon.permissions().is_empty());
        assert!(!anon.is_authenticated());
        assert_eq!(anon.id(), "anonymous:");
    }

    #[test]
    fn external_identity_permissions_come_from_allow_list() {
        let allow_list = ScopeAllowList::new(BTreeMap::from([
            ("a".to_string(), vec!["x@example.com".to_string()]),
            ("b".to_string(), vec!["y@example.com".to_string()]),
            (
                "c".to_string(),
                vec!["y@example.com".to_string(), "x@example.com".to_string()],
            ),
        ]));
        let identity = Identity::ExternalIdentity(ExternalIdentity {
            token: "secret".into(),
            email: "x@example.com".into(),
            allow_list: Arc::new(allow_list),
        });

        assert_eq!(identity.permissions(), set(&["a", "c"]));
        assert_eq!(identity.id(), "auth0:x@example.com");
        assert!(!format!("{identity:?}").contains("secret"));
    }

    #[test]
    fn signed_token_id_includes_jti_and_user() {
        let identity = Identity::SignedToken(SignedTokenIdentity {
            claims: TokenClaims::user("t5"),
            permissions: BTreeSet::new(),
            record: None,
            authenticated_email: Some("me@example.com".into()),
        });
        assert_eq!(identity.id(), "token:usr:id=t5:user=me@example.com");
        assert_eq!(identity.authenticated_email(), Some("me@example.com"));

        let tmp = Identity::SignedToken(SignedTokenIdentity {
            claims: TokenClaims::temporary(0, 1, vec![]),
            permissions: BTreeSet::new(),
            record: None,
            authenticated_email: None,
        });
        assert_eq!(tmp.id(), "token:tmp");
    }

    #[test]
    fn describe_prefers_record_data() {
        let record = TokenRecord {
            id: 3,
            token_type: TokenType::User,
            description: "laptop".into(),
            owner: Some("me@example.com".into()),
            disabled: false,
            permissions_csv: "tooltool.manage".into(),
        };
        let identity = SignedTokenIdentity {
            claims: TokenClaims::user("t3"),
            permissions: set(&["project:releng:services/tooltool/api/manage"]),
            record: Some(record),
            authenticated_email: Some("me@example.com".into()),
        };

        let description = identity.describe();
        assert_eq!(description.id, Some(3));
        assert_eq!(description.user.as_deref(), Some("me@example.com"));
        let expected = vec!["project:releng:services/tooltool/api/manage".to_string()];
        assert_eq!(description.permissions, Some(expected));
        assert!(!description.disabled);
    }

    #[test]
    fn describe_temporary_token_uses_claims() {
        let identity = SignedTokenIdentity {
            claims: TokenClaims::temporary(100, 200, vec!["p".into()]),
            permissions: set(&["p"]),
            record: None,
            authenticated_email: None,
        };
        let json = serde_json::to_value(identity.describe()).unwrap();

        assert_eq!(json["typ"], "tmp");
        assert_eq!(json["not_before"], "1970-01-01T00:01:40Z");
        assert_eq!(json["expires"], "1970-01-01T00:03:20Z");
        assert_eq!(json["permissions"], serde_json::json!(["p"]));
        assert!(json.get("id").is_none());
    }
}
