/*
 * Responsibility
 * - 環境変数や設定の読み込み (署名鍵, 有効な認証方式, 上流 IdP, マッピング表など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::services::auth::{DelegatedFailurePolicy, NamespaceMapping, ScopeAllowList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub domain: Option<String>,
    pub userinfo_uri: String,
    pub allow_list: ScopeAllowList,
}

impl OidcConfig {
    pub fn heartbeat_uri(&self) -> Option<String> {
        self.domain.as_ref().map(|d| format!("https://{d}/test"))
    }
}

#[derive(Debug, Clone)]
pub struct DelegatedConfig {
    pub root_url: String,
    pub client_id: Option<String>,
}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub database_url: Option<String>,

    // Signed-token scheme
    pub signed_token_auth: bool,
    pub secret_key: Option<String>,

    pub oidc: Option<OidcConfig>,
    pub delegated: Option<DelegatedConfig>,
    pub delegated_failure_policy: DelegatedFailurePolicy,

    pub upstream_timeout_seconds: u64,
    pub namespace_mapping: Option<Vec<NamespaceMapping>>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("signed_token_auth", &self.signed_token_auth)
            .field("oidc", &self.oidc)
            .field("delegated", &self.delegated)
            .field("delegated_failure_policy", &self.delegated_failure_policy)
            .field("upstream_timeout_seconds", &self.upstream_timeout_seconds)
            .finish()
    }
}

const DEFAULT_TASKCLUSTER_ROOT_URL: &str = "https://taskcluster.net";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup (environment, map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = var("PORT").and_then(|s| s.parse().ok()).unwrap_or(3000);
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV"));
        let database_url = var("DATABASE_URL");

        let signed_token_auth = flag(var("RELENGAPI_AUTH"), "RELENGAPI_AUTH", false)?;
        let secret_key = var("SECRET_KEY");
        if signed_token_auth {
            if secret_key.is_none() {
                return Err(ConfigError::Missing("SECRET_KEY"));
            }
            if database_url.is_none() {
                return Err(ConfigError::Missing("DATABASE_URL"));
            }
        }

        let oidc = if flag(var("AUTH0_AUTH"), "AUTH0_AUTH", false)? {
            let domain = var("AUTH_DOMAIN");
            let userinfo_uri = var("AUTH0_USERINFO_URI")
                .or_else(|| domain.as_ref().map(|d| format!("https://{d}/userinfo")))
                .ok_or(ConfigError::Missing("AUTH_DOMAIN"))?;

            let allow_list = match var("AUTH0_AUTH_SCOPES") {
                Some(raw) => serde_json::from_str::<BTreeMap<String, Vec<String>>>(&raw)
                    .map_err(|_| ConfigError::Invalid("AUTH0_AUTH_SCOPES"))?,
                None => BTreeMap::new(),
            };

            Some(OidcConfig {
                domain,
                userinfo_uri,
                allow_list: ScopeAllowList::new(allow_list),
            })
        } else {
            None
        };

        let delegated = if flag(var("TASKCLUSTER_AUTH"), "TASKCLUSTER_AUTH", true)? {
            Some(DelegatedConfig {
                root_url: var("TASKCLUSTER_ROOT_URL")
                    .unwrap_or_else(|| DEFAULT_TASKCLUSTER_ROOT_URL.to_string()),
                client_id: var("TASKCLUSTER_CLIENT_ID"),
            })
        } else {
            None
        };

        let delegated_failure_policy = match var("DELEGATED_AUTH_FAILURE_POLICY") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("DELEGATED_AUTH_FAILURE_POLICY"))?,
            None => DelegatedFailurePolicy::default(),
        };

        let upstream_timeout_seconds = match var("AUTH_UPSTREAM_TIMEOUT_SECONDS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::Invalid("AUTH_UPSTREAM_TIMEOUT_SECONDS"))?,
            None => 10,
        };

        let namespace_mapping = var("PERMISSION_NAMESPACE_MAPPING")
            .map(|raw| {
                serde_json::from_str::<Vec<NamespaceMapping>>(&raw)
                    .map_err(|_| ConfigError::Invalid("PERMISSION_NAMESPACE_MAPPING"))
            })
            .transpose()?;

        Ok(Self {
            addr,
            app_env,
            database_url,
            signed_token_auth,
            secret_key,
            oidc,
            delegated,
            delegated_failure_policy,
            upstream_timeout_seconds,
            namespace_mapping,
        })
    }
}

fn flag(raw: Option<String>, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(key)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.addr.port(), 3000);
        assert!(!config.signed_token_auth);
        assert!(config.oidc.is_none());
        assert_eq!(
            config.delegated.as_ref().map(|d| d.root_url.as_str()),
            Some("https://taskcluster.net")
        );
        assert_eq!(
            config.delegated_failure_policy,
            DelegatedFailurePolicy::Fallthrough
        );
        assert_eq!(config.upstream_timeout_seconds, 10);
        assert!(config.namespace_mapping.is_none());
    }

    #[test]
    fn signed_tokens_need_a_key_and_a_store() {
        assert_eq!(
            load(&[("RELENGAPI_AUTH", "true")]).unwrap_err(),
            ConfigError::Missing("SECRET_KEY")
        );
        assert_eq!(
            load(&[("RELENGAPI_AUTH", "true"), ("SECRET_KEY", "k")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        let config = load(&[
            ("RELENGAPI_AUTH", "1"),
            ("SECRET_KEY", "k"),
            ("DATABASE_URL", "postgres://localhost/db"),
        ])
        .unwrap();
        assert!(config.signed_token_auth);
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn oidc_settings() {
        assert_eq!(
            load(&[("AUTH0_AUTH", "true")]).unwrap_err(),
            ConfigError::Missing("AUTH_DOMAIN")
        );

        let config = load(&[
            ("AUTH0_AUTH", "true"),
            ("AUTH_DOMAIN", "auth.example.com"),
            (
                "AUTH0_AUTH_SCOPES",
                r#"{"tooltool.manage": ["a@example.com"]}"#,
            ),
        ])
        .unwrap();
        let oidc = config.oidc.unwrap();
        assert_eq!(oidc.userinfo_uri, "https://auth.example.com/userinfo");
        assert_eq!(
            oidc.heartbeat_uri().as_deref(),
            Some("https://auth.example.com/test")
        );
        let scopes = oidc.allow_list.scopes_for("a@example.com");
        assert!(scopes.contains("tooltool.manage"));
    }

    #[test]
    fn delegated_settings_keep_no_service_secret() {
        let config = load(&[
            ("TASKCLUSTER_CLIENT_ID", "project/releng/services/auth"),
            ("TASKCLUSTER_ACCESS_TOKEN", "hunter2"),
        ])
        .unwrap();
        let delegated = config.delegated.as_ref().unwrap();
        assert_eq!(
            delegated.client_id.as_deref(),
            Some("project/releng/services/auth")
        );
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert_eq!(
            load(&[("TASKCLUSTER_AUTH", "perhaps")]).unwrap_err(),
            ConfigError::Invalid("TASKCLUSTER_AUTH")
        );
        assert_eq!(
            load(&[("DELEGATED_AUTH_FAILURE_POLICY", "sometimes")]).unwrap_err(),
            ConfigError::Invalid("DELEGATED_AUTH_FAILURE_POLICY")
        );
        assert_eq!(
            load(&[("AUTH_UPSTREAM_TIMEOUT_SECONDS", "0")]).unwrap_err(),
            ConfigError::Invalid("AUTH_UPSTREAM_TIMEOUT_SECONDS")
        );
        assert_eq!(
            load(&[("PERMISSION_NAMESPACE_MAPPING", "[1]")]).unwrap_err(),
            ConfigError::Invalid("PERMISSION_NAMESPACE_MAPPING")
        );
    }

    #[test]
    fn mapping_override_keeps_order() {
        let config = load(&[(
            "PERMISSION_NAMESPACE_MAPPING",
            r#"[{"prefix": "b.", "project": "b/api/"}, {"prefix": "a.", "project": "a/api/"}]"#,
        )])
        .unwrap();
        let mapping = config.namespace_mapping.unwrap();
        assert_eq!(mapping[0].prefix, "b.");
        assert_eq!(mapping[1].prefix, "a.");
    }
}
