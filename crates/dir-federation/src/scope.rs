//! Query scopes.
//!
//! A scope adds conditions to every query the resolver builds. Scopes are
//! registered by name in a [`ScopeRegistry`] and resolved once, in the
//! configured order, when the resolver is constructed.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::directory::{Criterion, UserQuery};
use crate::error::{FederationError, FederationResult};

/// A predicate applied to every resolver query.
pub trait QueryScope: Send + Sync {
    /// Adds the scope's conditions to a query.
    fn apply(&self, query: &mut UserQuery);
}

/// Only users with a `userPrincipalName`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpnScope;

impl QueryScope for UpnScope {
    fn apply(&self, query: &mut UserQuery) {
        query.push(Criterion::Present("userprincipalname".to_string()));
    }
}

/// Only users with a `uid` (OpenLDAP and similar directories).
#[derive(Debug, Clone, Copy, Default)]
pub struct UidScope;

impl QueryScope for UidScope {
    fn apply(&self, query: &mut UserQuery) {
        query.push(Criterion::Present("uid".to_string()));
    }
}

/// Named query scopes.
#[derive(Clone, Default)]
pub struct ScopeRegistry {
    scopes: BTreeMap<String, Arc<dyn QueryScope>>,
}

impl ScopeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in scopes `upn` and `uid`.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with("upn", Arc::new(UpnScope))
            .with("uid", Arc::new(UidScope))
    }

    /// Registers a scope.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, scope: Arc<dyn QueryScope>) -> Self {
        self.register(name, scope);
        self
    }

    /// Registers a scope, replacing any scope of the same name.
    pub fn register(&mut self, name: impl Into<String>, scope: Arc<dyn QueryScope>) {
        self.scopes.insert(name.into(), scope);
    }

    /// Checks if a scope is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.scopes.contains_key(name)
    }

    /// Resolves scope names in order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first unknown scope.
    pub fn resolve(&self, names: &[String]) -> FederationResult<Vec<Arc<dyn QueryScope>>> {
        names
            .iter()
            .map(|name| {
                self.scopes
                    .get(name)
                    .cloned()
                    .ok_or_else(|| FederationError::config(format!("unknown query scope '{name}'")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_scopes_add_presence_conditions() {
        let registry = ScopeRegistry::builtin();
        let scopes = registry
            .resolve(&["uid".to_string(), "upn".to_string()])
            .unwrap();

        let mut query = UserQuery::new();
        for scope in &scopes {
            scope.apply(&mut query);
        }

        assert_eq!(
            query.criteria,
            vec![
                Criterion::Present("uid".to_string()),
                Criterion::Present("userprincipalname".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_scope_is_a_configuration_error() {
        let err = ScopeRegistry::builtin()
            .resolve(&["missing".to_string()])
            .err()
            .unwrap();
        assert!(err.is_configuration_error());
    }
}
