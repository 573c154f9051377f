//! Directory query facade.
//!
//! The resolver never talks a wire protocol. It builds a [`UserQuery`] and
//! hands it to a [`Directory`] implementation, which translates it for its
//! backend (an LDAP server, or process memory in [`MemoryDirectory`]).

use std::collections::HashMap;

use async_trait::async_trait;
use dir_model::DirectoryEntry;
use parking_lot::RwLock;

use crate::error::{FederationError, FederationResult};

/// Attribute selector meaning "every user attribute".
pub const ALL_ATTRIBUTES: &str = "*";

// ============================================================================
// Query
// ============================================================================

/// A single condition of a [`UserQuery`]. Conditions are combined with AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    /// The entry's unique identifier equals the value (canonical string form).
    Guid {
        /// Identifier attribute name.
        attribute: String,
        /// Identifier value.
        value: String,
    },
    /// The attribute has a value equal to the given one (case-insensitive).
    Equals {
        /// Attribute name.
        attribute: String,
        /// Expected value.
        value: String,
    },
    /// The attribute is present and non-empty.
    Present(String),
    /// A raw backend filter, passed through untouched.
    Raw(String),
}

impl Criterion {
    /// Evaluates the criterion against an entry held in memory.
    ///
    /// Raw filters are backend syntax and never match in memory.
    #[must_use]
    pub fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Self::Guid { value, .. } => entry.guid().eq_ignore_ascii_case(value),
            Self::Equals { attribute, value } => entry
                .attribute(attribute)
                .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value))),
            Self::Present(attribute) => entry.has_attribute(attribute),
            Self::Raw(_) => false,
        }
    }
}

/// A user query built by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    /// Attributes to return.
    pub attributes: Vec<String>,
    /// Conditions, combined with AND.
    pub criteria: Vec<Criterion>,
    /// Maximum number of entries to return.
    pub limit: Option<usize>,
}

impl UserQuery {
    /// Creates an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds attributes to the selection, skipping duplicates.
    #[must_use]
    pub fn select<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for attribute in attributes {
            let attribute = attribute.into();
            if !self
                .attributes
                .iter()
                .any(|a| a.eq_ignore_ascii_case(&attribute))
            {
                self.attributes.push(attribute);
            }
        }
        self
    }

    /// Adds a condition.
    pub fn push(&mut self, criterion: Criterion) {
        self.criteria.push(criterion);
    }

    /// Requires the unique identifier to equal `value`.
    #[must_use]
    pub fn where_guid(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Criterion::Guid {
            attribute: attribute.into(),
            value: value.into(),
        });
        self
    }

    /// Requires `attribute` to equal `value`.
    #[must_use]
    pub fn where_equals(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Criterion::Equals {
            attribute: attribute.into(),
            value: value.into(),
        });
        self
    }

    /// Requires `attribute` to be present.
    #[must_use]
    pub fn where_has(mut self, attribute: impl Into<String>) -> Self {
        self.push(Criterion::Present(attribute.into()));
        self
    }

    /// Adds a raw backend filter.
    #[must_use]
    pub fn raw_filter(mut self, filter: impl Into<String>) -> Self {
        self.push(Criterion::Raw(filter.into()));
        self
    }

    /// Limits the number of returned entries.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluates every condition against an entry held in memory.
    #[must_use]
    pub fn matches(&self, entry: &DirectoryEntry) -> bool {
        self.criteria.iter().all(|c| c.matches(entry))
    }
}

// ============================================================================
// Directory trait
// ============================================================================

/// Connection to a directory service.
///
/// Implementations own connection management and timeouts; failures are
/// returned as-is and never retried by the callers in this crate.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Returns the first entry matching the query.
    async fn find_one(&self, query: &UserQuery) -> FederationResult<Option<DirectoryEntry>>;

    /// Returns every entry matching the query.
    ///
    /// Without a query limit the result must be complete: a directory that
    /// cannot return every match returns an error, because batch imports
    /// treat an absent entry as a deleted user.
    async fn search(&self, query: &UserQuery) -> FederationResult<Vec<DirectoryEntry>>;

    /// Attempts a bind with the given identifier and secret.
    ///
    /// Returns `Ok(false)` when the directory rejects the credentials.
    async fn bind(&self, identifier: &str, secret: &str) -> FederationResult<bool>;

    /// Tests the connection to the directory.
    async fn test_connection(&self) -> FederationResult<()> {
        Ok(())
    }
}

// ============================================================================
// In-memory directory
// ============================================================================

/// Directory held in process memory.
///
/// Entries are tagged with the directory's domain name when inserted.
/// Every query is recorded so callers can inspect what was asked.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    domain: Option<String>,
    entries: RwLock<Vec<DirectoryEntry>>,
    secrets: RwLock<HashMap<String, String>>,
    queries: RwLock<Vec<UserQuery>>,
    unavailable: RwLock<bool>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty directory whose entries carry a domain tag.
    #[must_use]
    pub fn with_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            ..Self::default()
        }
    }

    /// Adds an entry.
    pub fn insert(&self, entry: DirectoryEntry) {
        let entry = match &self.domain {
            Some(domain) if entry.domain().is_none() => entry.with_domain(domain.clone()),
            _ => entry,
        };
        self.entries.write().push(entry);
    }

    /// Replaces the entry with the same identifier, or adds it.
    pub fn upsert(&self, entry: DirectoryEntry) {
        self.remove(entry.guid());
        self.insert(entry);
    }

    /// Removes the entry with the given identifier.
    pub fn remove(&self, guid: &str) {
        self.entries.write().retain(|e| e.guid() != guid);
    }

    /// Sets the secret accepted for a bind identifier.
    pub fn set_secret(&self, identifier: impl Into<String>, secret: impl Into<String>) {
        self.secrets.write().insert(identifier.into(), secret.into());
    }

    /// Makes every subsequent call fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write() = unavailable;
    }

    /// Returns the queries received so far.
    #[must_use]
    pub fn queries(&self) -> Vec<UserQuery> {
        self.queries.read().clone()
    }

    fn check_available(&self) -> FederationResult<()> {
        if *self.unavailable.read() {
            return Err(FederationError::connection("directory unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn find_one(&self, query: &UserQuery) -> FederationResult<Option<DirectoryEntry>> {
        self.check_available()?;
        self.queries.write().push(query.clone());

        let entries = self.entries.read();
        Ok(entries.iter().find(|e| query.matches(e)).cloned())
    }

    async fn search(&self, query: &UserQuery) -> FederationResult<Vec<DirectoryEntry>> {
        self.check_available()?;
        self.queries.write().push(query.clone());

        let entries = self.entries.read();
        Ok(entries
            .iter()
            .filter(|e| query.matches(e))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn bind(&self, identifier: &str, secret: &str) -> FederationResult<bool> {
        self.check_available()?;
        Ok(self
            .secrets
            .read()
            .get(identifier)
            .is_some_and(|expected| expected == secret))
    }

    async fn test_connection(&self) -> FederationResult<()> {
        self.check_available()
    }
}
