/*
 * Responsibility
 * - relengapi_auth_tokens の読み取り (id -> TokenRecord)
 * - 書き込み (issue / revoke) は別サービスの責務。ここでは read-only
 */
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use crate::repos::error::{RepoError, RepoResult};
use crate::services::auth::claims::TokenType;
use crate::services::auth::permissions::NamespaceTranslator;

/// Persisted backing data of a permanent or user token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub id: i64,
    pub token_type: TokenType,
    pub description: String,
    pub owner: Option<String>,
    pub disabled: bool,
    pub permissions_csv: String,
}

impl TokenRecord {
    /// Stored permissions in hierarchical form, empty entries dropped.
    pub fn permissions(&self, translator: &NamespaceTranslator) -> Vec<String> {
        self.permissions_csv
            .split(',')
            .filter(|p| !p.is_empty())
            .map(|p| translator.to_hierarchical(p))
            .collect()
    }
}

/// Keyed lookup of token records.
///
/// Implementations must be safe to share across requests; this subsystem
/// only ever reads.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, id: i64) -> RepoResult<Option<TokenRecord>>;
}

#[derive(Debug, FromRow)]
struct TokenRow {
    id: i32,
    typ: String,
    description: String,
    user: Option<String>,
    disabled: bool,
    #[sqlx(rename = "_permissions")]
    permissions: String,
}

impl TryFrom<TokenRow> for TokenRecord {
    type Error = RepoError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let id = i64::from(row.id);
        let token_type = TokenType::parse(&row.typ).ok_or_else(|| RepoError::InvalidRow {
            id,
            reason: format!("unknown typ {:?}", row.typ),
        })?;

        Ok(Self {
            id,
            token_type,
            description: row.description,
            owner: row.user,
            disabled: row.disabled,
            permissions_csv: row.permissions,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn get(&self, id: i64) -> RepoResult<Option<TokenRecord>> {
        // Column is INTEGER; ids outside i32 cannot exist.
        let Ok(id) = i32::try_from(id) else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT id, typ, description, "user", disabled, _permissions
            FROM relengapi_auth_tokens
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TokenRecord::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_are_translated_and_filtered() {
        let record = TokenRecord {
            id: 1,
            token_type: TokenType::Permanent,
            description: "ci".into(),
            owner: None,
            disabled: false,
            permissions_csv: "tooltool.download.public,,mapper.mapping.insert,other".into(),
        };

        assert_eq!(
            record.permissions(&NamespaceTranslator::default()),
            vec![
                "project:releng:services/tooltool/api/download/public".to_string(),
                "project:releng:services/mapper/api/mapping/insert".to_string(),
                "other".to_string(),
            ]
        );
    }

    #[test]
    fn row_with_unknown_type_is_invalid() {
        let row = TokenRow {
            id: 7,
            typ: "zzz".into(),
            description: String::new(),
            user: None,
            disabled: false,
            permissions: String::new(),
        };
        assert!(matches!(
            TokenRecord::try_from(row),
            Err(RepoError::InvalidRow { id: 7, .. })
        ));
    }
}
