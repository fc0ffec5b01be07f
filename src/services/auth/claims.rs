use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Issuer every signed token must carry.
pub const TOKEN_ISSUER: &str = "ra2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    #[serde(rename = "prm")]
    Permanent,
    #[serde(rename = "tmp")]
    Temporary,
    #[serde(rename = "usr")]
    User,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permanent => "prm",
            Self::Temporary => "tmp",
            Self::User => "usr",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prm" => Some(Self::Permanent),
            "tmp" => Some(Self::Temporary),
            "usr" => Some(Self::User),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded signed-token payload.
///
/// Timestamps are Unix seconds. `permissions` is only present on temporary
/// tokens; permanent and user tokens point at a stored record through `jti`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<i64>,
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    #[serde(
        rename = "prm",
        default,
        deserialize_with = "permissions_skipping_nulls",
        skip_serializing_if = "Option::is_none"
    )]
    pub permissions: Option<Vec<String>>,
    #[serde(rename = "mta", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl TokenClaims {
    pub fn permanent(jti: impl Into<String>) -> Self {
        Self {
            issuer: TOKEN_ISSUER.to_string(),
            token_type: TokenType::Permanent,
            jti: Some(jti.into()),
            not_before: None,
            expires: None,
            permissions: None,
            metadata: None,
        }
    }

    pub fn user(jti: impl Into<String>) -> Self {
        Self {
            token_type: TokenType::User,
            ..Self::permanent(jti)
        }
    }

    pub fn temporary(not_before: i64, expires: i64, permissions: Vec<String>) -> Self {
        Self {
            issuer: TOKEN_ISSUER.to_string(),
            token_type: TokenType::Temporary,
            jti: None,
            not_before: Some(not_before),
            expires: Some(expires),
            permissions: Some(permissions),
            metadata: None,
        }
    }

    pub fn not_before_at(&self) -> Option<DateTime<Utc>> {
        self.not_before.and_then(|s| DateTime::from_timestamp(s, 0))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires.and_then(|s| DateTime::from_timestamp(s, 0))
    }
}

fn permissions_skipping_nulls<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Option<String>>>::deserialize(deserializer)?;
    Ok(raw.map(|list| list.into_iter().flatten().collect()))
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid token signature: {0}")]
    InvalidSignature(#[from] jsonwebtoken::errors::Error),
    #[error("wrong token issuer: {0:?}")]
    WrongIssuer(Option<String>),
    #[error("malformed claims: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum SignError {
    #[error("refusing to sign claims for issuer {0:?}")]
    WrongIssuer(String),
    #[error("failed to sign claims: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// `t42` -> `42`.
pub fn jti_to_id(jti: &str) -> Option<i64> {
    jti.strip_prefix('t')?.parse().ok()
}

/// Rewrites a version-1 payload (`{"v": 1, "id": N}`) into current claims.
/// Anything else is returned untouched.
fn migrate(value: Value) -> Result<Value, DecodeError> {
    if value.get("v").and_then(Value::as_i64) != Some(1) {
        return Ok(value);
    }
    let id = value
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| DecodeError::Malformed("v1 token without integer id".into()))?;

    Ok(serde_json::json!({
        "iss": TOKEN_ISSUER,
        "typ": TokenType::Permanent.as_str(),
        "jti": format!("t{id}"),
    }))
}

/// HS512 JWS signer/verifier for token claims.
///
/// Debug output omits key material.
#[derive(Clone)]
pub struct ClaimsCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl std::fmt::Debug for ClaimsCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimsCodec")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl ClaimsCodec {
    pub fn new(secret_key: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS512);
        // Expiry windows are enforced per token type by the extractor.
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret_key),
            decoding_key: DecodingKey::from_secret(secret_key),
            validation,
            issuer: TOKEN_ISSUER.to_string(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn sign(&self, claims: &TokenClaims) -> Result<String, SignError> {
        if claims.issuer != self.issuer {
            return Err(SignError::WrongIssuer(claims.issuer.clone()));
        }
        let header = Header::new(Algorithm::HS512);
        Ok(jsonwebtoken::encode(&header, claims, &self.encoding_key)?)
    }

    /// Verify the signature, migrate legacy payloads, then check the issuer.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, DecodeError> {
        let data = jsonwebtoken::decode::<Value>(token, &self.decoding_key, &self.validation)?;
        let value = migrate(data.claims)?;

        let issuer = value.get("iss").and_then(Value::as_str);
        if issuer != Some(self.issuer.as_str()) {
            return Err(DecodeError::WrongIssuer(issuer.map(str::to_string)));
        }

        serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}
