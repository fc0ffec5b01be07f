//! Authorization checks run when an endpoint is entered.

use tracing::error;

use crate::services::auth::identity::Identity;
use crate::services::auth::scopes::{ScopeRequirement, matches};

pub fn require_login(identity: &Identity) -> bool {
    identity.is_authenticated()
}

/// Does `identity` satisfy `requirement`? Logs what is missing when not.
pub fn require_scopes(identity: &Identity, requirement: &ScopeRequirement) -> bool {
    let granted = identity.permissions();
    if matches(&granted, requirement) {
        return true;
    }

    let missing = requirement
        .missing(&granted)
        .iter()
        .map(|set| set.join(", "))
        .collect::<Vec<_>>()
        .join(" OR ");
    error!(user = %identity.id(), %missing, "identity misses some scopes");
    false
}
