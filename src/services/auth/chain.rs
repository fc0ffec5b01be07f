use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::services::auth::error::AuthError;
use crate::services::auth::extractors::{CredentialExtractor, RequestCredentials, Scheme};
use crate::services::auth::identity::Identity;

/// What a failed (not merely absent) delegated-credential verification does
/// to the rest of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelegatedFailurePolicy {
    /// Treat it like a missing credential and fall through to Anonymous.
    #[default]
    Fallthrough,
    /// Stop the chain and answer 401.
    Reject,
}

impl FromStr for DelegatedFailurePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallthrough" | "anonymous" => Ok(Self::Fallthrough),
            "reject" | "401" => Ok(Self::Reject),
            _ => Err(()),
        }
    }
}

/// Extractors in priority order; the first identity wins.
pub struct AuthenticatorChain {
    extractors: Vec<Arc<dyn CredentialExtractor>>,
    delegated_failure_policy: DelegatedFailurePolicy,
}

impl std::fmt::Debug for AuthenticatorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let schemes: Vec<&str> = self
            .extractors
            .iter()
            .map(|e| e.scheme().as_str())
            .collect();
        f.debug_struct("AuthenticatorChain")
            .field("schemes", &schemes)
            .field("delegated_failure_policy", &self.delegated_failure_policy)
            .finish()
    }
}

impl AuthenticatorChain {
    pub fn new(
        extractors: Vec<Arc<dyn CredentialExtractor>>,
        delegated_failure_policy: DelegatedFailurePolicy,
    ) -> Self {
        Self {
            extractors,
            delegated_failure_policy,
        }
    }

    pub fn extractors(&self) -> &[Arc<dyn CredentialExtractor>] {
        &self.extractors
    }

    /// Resolve the request's identity.
    ///
    /// Returns `Err` only when the delegated-credential policy is `Reject`
    /// and that scheme actively failed; everything else degrades to
    /// Anonymous.
    pub async fn authenticate(&self, request: &RequestCredentials) -> Result<Identity, AuthError> {
        for extractor in &self.extractors {
            let scheme = extractor.scheme();
            match extractor.extract(request).await {
                Ok(identity) => {
                    info!(scheme = scheme.as_str(), user = %identity.id(), "authenticated request");
                    return Ok(identity);
                }
                Err(err) if err.is_absent() => {
                    debug!(scheme = scheme.as_str(), reason = %err, "no usable credential");
                }
                Err(err) => {
                    if scheme == Scheme::DelegatedCredential
                        && self.delegated_failure_policy == DelegatedFailurePolicy::Reject
                    {
                        warn!(scheme = scheme.as_str(), error = %err, "rejecting request");
                        return Err(err);
                    }
                    debug!(scheme = scheme.as_str(), error = %err, "scheme failed, trying next");
                }
            }
        }
        Ok(Identity::Anonymous)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::services::auth::identity::DelegatedCredential;

    enum Outcome {
        Resolves(&'static str),
        Absent,
        Fail,
    }

    struct Fake {
        scheme: Scheme,
        outcome: Outcome,
        calls: AtomicUsize,
    }

    impl Fake {
        fn new(scheme: Scheme, outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                scheme,
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CredentialExtractor for Fake {
        fn scheme(&self) -> Scheme {
            self.scheme
        }

        async fn extract(&self, _request: &RequestCredentials) -> Result<Identity, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Outcome::Resolves(id) => Ok(Identity::DelegatedCredential(DelegatedCredential {
                    client_id: id.to_string(),
                    scopes: BTreeSet::new(),
                })),
                Outcome::Absent => Err(AuthError::NoCredential),
                Outcome::Fail => Err(AuthError::Rejected("auth-failed".into())),
            }
        }
    }

    fn chain(extractors: Vec<Arc<Fake>>, policy: DelegatedFailurePolicy) -> AuthenticatorChain {
        AuthenticatorChain::new(
            extractors
                .into_iter()
                .map(|e| e as Arc<dyn CredentialExtractor>)
                .collect(),
            policy,
        )
    }

    #[tokio::test]
    async fn first_identity_wins() {
        let first = Fake::new(Scheme::SignedToken, Outcome::Absent);
        let second = Fake::new(Scheme::ExternalIdentity, Outcome::Resolves("second"));
        let third = Fake::new(Scheme::DelegatedCredential, Outcome::Resolves("third"));
        let c = chain(
            vec![first.clone(), second, third.clone()],
            DelegatedFailurePolicy::Fallthrough,
        );

        let request = RequestCredentials::default();
        let identity = c.authenticate(&request).await.unwrap();
        assert_eq!(identity.id(), "taskcluster:second");
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_absent_is_anonymous() {
        let c = chain(
            vec![
                Fake::new(Scheme::SignedToken, Outcome::Fail),
                Fake::new(Scheme::DelegatedCredential, Outcome::Absent),
            ],
            DelegatedFailurePolicy::Reject,
        );
        let request = RequestCredentials::default();
        let identity = c.authenticate(&request).await.unwrap();
        assert!(!identity.is_authenticated());
    }

    #[tokio::test]
    async fn delegated_failure_policy() {
        let request = RequestCredentials::default();
        let fallthrough = chain(
            vec![Fake::new(Scheme::DelegatedCredential, Outcome::Fail)],
            DelegatedFailurePolicy::Fallthrough,
        );
        assert!(matches!(
            fallthrough.authenticate(&request).await,
            Ok(Identity::Anonymous)
        ));

        let reject = chain(
            vec![Fake::new(Scheme::DelegatedCredential, Outcome::Fail)],
            DelegatedFailurePolicy::Reject,
        );
        assert!(matches!(
            reject.authenticate(&request).await,
            Err(AuthError::Rejected(_))
        ));
    }

    #[test]
    fn policy_parsing() {
        let parse = |s: &str| s.parse::<DelegatedFailurePolicy>();
        assert_eq!(parse("Reject"), Ok(DelegatedFailurePolicy::Reject));
        assert_eq!(
            parse("fallthrough"),
            Ok(DelegatedFailurePolicy::Fallthrough)
        );
        assert!(parse("maybe").is_err());
    }
}
