//! Import scope.
//!
//! The predicate used to find the local account that corresponds to a
//! directory entry: `guid_column == guid OR username_column == username`,
//! where the username branch only applies to accounts not yet tagged with a
//! directory identifier.
//! Soft-deleted rows are included so that re-importing a trashed account
//! never creates a second row.

use dir_model::{AccountSchema, LocalAccount};

/// How an account satisfied an [`ImportScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScopeMatch {
    /// The stored directory identifier matched.
    Guid,
    /// Only the username matched.
    Username,
}

/// Predicate locating the local account of a directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportScope {
    /// Directory identifier of the entry.
    pub guid: String,
    /// Username taken from the entry's lookup attribute.
    pub username: String,
    /// Whether soft-deleted accounts are considered.
    pub with_trashed: bool,
}

impl ImportScope {
    /// Creates a scope that includes soft-deleted accounts.
    #[must_use]
    pub fn new(guid: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            username: username.into(),
            with_trashed: true,
        }
    }

    /// Excludes soft-deleted accounts.
    #[must_use]
    pub const fn without_trashed(mut self) -> Self {
        self.with_trashed = false;
        self
    }

    /// Evaluates the predicate against an account.
    #[must_use]
    pub fn matches(&self, schema: &AccountSchema, account: &LocalAccount) -> Option<ScopeMatch> {
        if !self.with_trashed && account.is_trashed() {
            return None;
        }

        if !self.guid.is_empty() && schema.guid(account) == Some(self.guid.as_str()) {
            return Some(ScopeMatch::Guid);
        }

        if !self.username.is_empty()
            && schema.guid(account).is_none()
            && schema.username(account) == Some(self.username.as_str())
        {
            return Some(ScopeMatch::Username);
        }

        None
    }

    /// Picks the best candidate: identifier matches win over username
    /// matches, ties go to the earliest candidate.
    pub fn select<'a, I>(&self, schema: &AccountSchema, candidates: I) -> Option<&'a LocalAccount>
    where
        I: IntoIterator<Item = &'a LocalAccount>,
    {
        candidates
            .into_iter()
            .filter_map(|account| self.matches(schema, account).map(|m| (m, account)))
            .min_by_key(|(m, _)| *m)
            .map(|(_, account)| account)
    }
}
