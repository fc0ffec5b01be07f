use thiserror::Error;

use crate::services::auth::claims::DecodeError;

/// Why a scheme could not produce an identity.
///
/// None of these reach the client directly: the chain either tries the next
/// scheme or settles on Anonymous.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credential supplied")]
    NoCredential,
    #[error("malformed credential: {0}")]
    MalformedCredential(String),
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("wrong token issuer")]
    WrongIssuer,
    #[error("token expired or not yet valid")]
    ExpiredOrNotYetValid,
    #[error("token record disabled or unknown")]
    DisabledOrUnknownRecord,
    #[error("credential rejected: {0}")]
    Rejected(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl AuthError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCredential(reason.into())
    }

    /// Nothing usable was presented for the scheme.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NoCredential | Self::MalformedCredential(_))
    }
}

impl From<DecodeError> for AuthError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::InvalidSignature(_) => Self::InvalidSignature,
            DecodeError::WrongIssuer(_) => Self::WrongIssuer,
            DecodeError::Malformed(reason) => Self::MalformedCredential(reason),
        }
    }
}

/// Failures while assembling the `AuthService` at startup.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("signed tokens are enabled but {0} is not set")]
    MissingSignedTokenInput(&'static str),
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("invalid url for {what}: {source}")]
    InvalidUrl {
        what: &'static str,
        #[source]
        source: url::ParseError,
    },
}
