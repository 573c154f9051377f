//! Validation rules.
//!
//! Rules are stateless predicates over a directory entry and the local
//! account, if one exists. A [`RuleChain`] passes only when every rule
//! passes; rules are always evaluated in configured order.

use std::collections::BTreeMap;
use std::sync::Arc;

use dir_model::{DirectoryEntry, LocalAccount};

use crate::error::{FederationError, FederationResult};

/// A pass/fail predicate evaluated before authentication succeeds.
pub trait Rule: Send + Sync {
    /// Returns the rule name used in logs.
    fn name(&self) -> &str;

    /// Evaluates the rule.
    fn passes(&self, entry: &DirectoryEntry, account: Option<&LocalAccount>) -> bool;
}

/// Only users that already have a local account may authenticate.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnlyImported;

impl Rule for OnlyImported {
    fn name(&self) -> &str {
        "only_imported"
    }

    fn passes(&self, _entry: &DirectoryEntry, account: Option<&LocalAccount>) -> bool {
        account.is_some_and(LocalAccount::exists)
    }
}

/// Users whose local account is soft-deleted may not authenticate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyTrashed;

impl Rule for DenyTrashed {
    fn name(&self) -> &str {
        "deny_trashed"
    }

    fn passes(&self, _entry: &DirectoryEntry, account: Option<&LocalAccount>) -> bool {
        !account.is_some_and(LocalAccount::is_trashed)
    }
}

/// Ordered list of rules combined with AND.
#[derive(Clone, Default)]
pub struct RuleChain {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleChain {
    /// Creates an empty chain, which always passes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule.
    #[must_use]
    pub fn with(mut self, rule: Arc<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the chain has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluates every rule and returns true only if all pass.
    #[must_use]
    pub fn passes(&self, entry: &DirectoryEntry, account: Option<&LocalAccount>) -> bool {
        let mut passed = true;
        for rule in &self.rules {
            let result = rule.passes(entry, account);
            tracing::trace!(rule = rule.name(), dn = entry.dn(), passed = result, "Evaluated rule");
            passed &= result;
        }
        passed
    }
}

/// Named rules, assembled at startup.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<String, Arc<dyn Rule>>,
}

impl RuleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `only_imported` and `deny_trashed`.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with("only_imported", Arc::new(OnlyImported))
            .with("deny_trashed", Arc::new(DenyTrashed))
    }

    /// Registers a rule.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, rule: Arc<dyn Rule>) -> Self {
        self.register(name, rule);
        self
    }

    /// Registers a rule, replacing any rule of the same name.
    pub fn register(&mut self, name: impl Into<String>, rule: Arc<dyn Rule>) {
        self.rules.insert(name.into(), rule);
    }

    /// Builds a chain from rule names, in order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first unknown rule.
    pub fn chain(&self, names: &[String]) -> FederationResult<RuleChain> {
        names.iter().try_fold(RuleChain::new(), |chain, name| {
            self.rules
                .get(name)
                .cloned()
                .map(|rule| chain.with(rule))
                .ok_or_else(|| FederationError::config(format!("unknown validation rule '{name}'")))
        })
    }
}
