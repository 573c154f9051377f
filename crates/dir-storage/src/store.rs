//! Local account storage provider trait.

use async_trait::async_trait;
use dir_model::{AccountSchema, LocalAccount};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::scope::ImportScope;

/// Provider for local account storage operations.
///
/// Implementations must be thread-safe and support concurrent access. The
/// stored directory identifier column must be unique among non-empty values
/// so that concurrent first-time imports of the same entry cannot both
/// succeed.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Returns the column names this store reads and writes.
    fn schema(&self) -> &AccountSchema;

    /// Finds the account matching an import scope.
    ///
    /// When several accounts match, an identifier match is preferred over a
    /// username match. The username only matches accounts without a stored
    /// identifier.
    async fn find_for_import(&self, scope: &ImportScope) -> StorageResult<Option<LocalAccount>>;

    /// Gets an account by primary key. Soft-deleted accounts are included.
    async fn get_by_id(&self, id: Uuid) -> StorageResult<Option<LocalAccount>>;

    /// Gets an account by username.
    async fn get_by_username(
        &self,
        username: &str,
        with_trashed: bool,
    ) -> StorageResult<Option<LocalAccount>>;

    /// Inserts or updates an account and marks it persisted.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::Duplicate` if another account already holds
    /// the same directory identifier.
    async fn save(&self, account: &mut LocalAccount) -> StorageResult<()>;

    /// Lists accounts matching criteria.
    async fn search(&self, criteria: &AccountSearchCriteria) -> StorageResult<Vec<LocalAccount>>;
}

/// Search criteria for local accounts.
#[derive(Debug, Default, Clone)]
pub struct AccountSearchCriteria {
    /// Filter by stored domain tag.
    pub domain: Option<String>,
    /// Only accounts that carry a directory identifier.
    pub imported_only: bool,
    /// Include soft-deleted accounts.
    pub with_trashed: bool,
    /// Maximum results to return.
    pub max_results: Option<usize>,
}

impl AccountSearchCriteria {
    /// Creates empty search criteria.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            domain: None,
            imported_only: false,
            with_trashed: false,
            max_results: None,
        }
    }

    /// Filters by stored domain tag.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Only returns accounts imported from a directory.
    #[must_use]
    pub const fn imported_only(mut self) -> Self {
        self.imported_only = true;
        self
    }

    /// Includes soft-deleted accounts.
    #[must_use]
    pub const fn with_trashed(mut self) -> Self {
        self.with_trashed = true;
        self
    }

    /// Sets maximum results.
    #[must_use]
    pub const fn max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    /// Evaluates the criteria against an account.
    #[must_use]
    pub fn matches(&self, schema: &AccountSchema, account: &LocalAccount) -> bool {
        if !self.with_trashed && account.is_trashed() {
            return false;
        }
        if self.imported_only && schema.guid(account).is_none() {
            return false;
        }
        match &self.domain {
            Some(domain) => schema.domain(account) == Some(domain.as_str()),
            None => true,
        }
    }
}
