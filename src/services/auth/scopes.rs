//! Scope matching.
//!
//! A `ScopeRequirement` is an OR of AND-lists (`ScopeSet`s). A granted scope
//! ending in `*` covers every required scope that starts with the part before
//! the `*`. Wildcards are only meaningful on the granted side.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequirementError {
    #[error("required scope must not contain '*': {0}")]
    WildcardInRequirement(String),
    #[error("required scope must not be empty")]
    EmptyScope,
}

/// AND-list of required scopes.
pub type ScopeSet = Vec<String>;

/// OR-of-AND scope expression demanded by an endpoint.
///
/// Built once when routes are registered and never mutated afterwards.
/// An empty requirement is satisfied by everyone (Anonymous included).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScopeRequirement {
    sets: Vec<ScopeSet>,
}

impl ScopeRequirement {
    pub fn new<S, I, T>(sets: S) -> Result<Self, RequirementError>
    where
        S: IntoIterator<Item = I>,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut out = Vec::new();
        for set in sets {
            let mut scope_set = Vec::new();
            for scope in set {
                let scope: String = scope.into();
                if scope.is_empty() {
                    return Err(RequirementError::EmptyScope);
                }
                if scope.contains('*') {
                    return Err(RequirementError::WildcardInRequirement(scope));
                }
                scope_set.push(scope);
            }
            out.push(scope_set);
        }
        Ok(Self { sets: out })
    }

    /// Requirement made of a single ScopeSet (all scopes required).
    pub fn all<I, T>(scopes: I) -> Result<Self, RequirementError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new([scopes])
    }

    pub fn sets(&self) -> &[ScopeSet] {
        &self.sets
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Scopes of each ScopeSet that `granted` does not cover, in order.
    pub fn missing<'a>(&'a self, granted: &BTreeSet<String>) -> Vec<Vec<&'a str>> {
        self.sets
            .iter()
            .map(|set| {
                set.iter()
                    .filter(|required| !is_covered(granted, required))
                    .map(String::as_str)
                    .collect()
            })
            .collect()
    }
}

/// Does a single granted scope cover a required scope?
pub fn covers(granted: &str, required: &str) -> bool {
    if granted == required {
        return true;
    }
    match granted.strip_suffix('*') {
        Some(prefix) => required.starts_with(prefix),
        None => false,
    }
}

fn is_covered(granted: &BTreeSet<String>, required: &str) -> bool {
    granted.iter().any(|g| covers(g, required))
}

/// Does `granted` satisfy at least one ScopeSet of `requirement`?
pub fn matches(granted: &BTreeSet<String>, requirement: &ScopeRequirement) -> bool {
    if requirement.is_empty() {
        return true;
    }
    requirement
        .sets
        .iter()
        .any(|set| set.iter().all(|required| is_covered(granted, required)))
}
