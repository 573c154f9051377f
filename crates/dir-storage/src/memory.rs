//! In-memory account store.
//!
//! Backs tests and deployments that do not need durable storage. Accounts
//! are keyed by their time-ordered primary key, so iteration follows
//! creation order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dir_model::{AccountSchema, LocalAccount};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::scope::ImportScope;
use crate::store::{AccountSearchCriteria, AccountStore};

/// Account store held in process memory.
#[derive(Debug)]
pub struct MemoryAccountStore {
    schema: AccountSchema,
    accounts: RwLock<BTreeMap<Uuid, LocalAccount>>,
}

impl MemoryAccountStore {
    /// Creates an empty store with the given schema.
    #[must_use]
    pub fn new(schema: AccountSchema) -> Self {
        Self {
            schema,
            accounts: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the number of stored accounts, including soft-deleted ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }

    /// Returns a snapshot of every stored account.
    #[must_use]
    pub fn all(&self) -> Vec<LocalAccount> {
        self.accounts.read().values().cloned().collect()
    }
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new(AccountSchema::default())
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    fn schema(&self) -> &AccountSchema {
        &self.schema
    }

    async fn find_for_import(&self, scope: &ImportScope) -> StorageResult<Option<LocalAccount>> {
        let accounts = self.accounts.read();
        Ok(scope.select(&self.schema, accounts.values()).cloned())
    }

    async fn get_by_id(&self, id: Uuid) -> StorageResult<Option<LocalAccount>> {
        Ok(self.accounts.read().get(&id).cloned())
    }

    async fn get_by_username(
        &self,
        username: &str,
        with_trashed: bool,
    ) -> StorageResult<Option<LocalAccount>> {
        let accounts = self.accounts.read();
        Ok(accounts
            .values()
            .filter(|account| with_trashed || !account.is_trashed())
            .find(|account| self.schema.username(account) == Some(username))
            .cloned())
    }

    async fn save(&self, account: &mut LocalAccount) -> StorageResult<()> {
        let mut accounts = self.accounts.write();

        if let Some(guid) = self.schema.guid(account) {
            let conflict = accounts
                .values()
                .any(|other| other.id != account.id && self.schema.guid(other) == Some(guid));
            if conflict {
                return Err(StorageError::duplicate(&self.schema.guid_column, guid));
            }
        }

        if !account.exists() && accounts.contains_key(&account.id) {
            return Err(StorageError::duplicate("id", account.id.to_string()));
        }

        account.mark_persisted();
        accounts.insert(account.id, account.clone());

        tracing::trace!(account_id = %account.id, "Saved account");
        Ok(())
    }

    async fn search(&self, criteria: &AccountSearchCriteria) -> StorageResult<Vec<LocalAccount>> {
        let accounts = self.accounts.read();
        let matching = accounts
            .values()
            .filter(|account| criteria.matches(&self.schema, account))
            .take(criteria.max_results.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imported(guid: &str, email: &str) -> LocalAccount {
        LocalAccount::new()
            .with_field("objectguid", guid)
            .with_field("email", email)
            .with_field("domain", "default")
    }

    #[tokio::test]
    async fn save_and_find() {
        let store = MemoryAccountStore::default();
        let mut account = imported("G-1", "a@b.com");

        store.save(&mut account).await.unwrap();
        assert!(account.exists());

        let found = store
            .find_for_import(&ImportScope::new("G-1", "changed@b.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, account.id);
        assert!(found.exists());

        assert!(store.get_by_id(account.id).await.unwrap().is_some());
        assert!(store
            .get_by_username("a@b.com", false)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn guid_is_unique() {
        let store = MemoryAccountStore::default();
        let mut first = imported("G-1", "a@b.com");
        let mut second = imported("G-1", "a@b.com");

        store.save(&mut first).await.unwrap();
        let err = store.save(&mut second).await.unwrap_err();

        assert!(err.is_duplicate());
        assert!(!second.exists());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn username_fallback_skips_tagged_accounts() {
        let store = MemoryAccountStore::default();
        let mut tagged = imported("G-OTHER", "a@b.com");
        store.save(&mut tagged).await.unwrap();

        let found = store
            .find_for_import(&ImportScope::new("G-NEW", "a@b.com"))
            .await
            .unwrap();
        assert!(found.is_none());

        let mut untagged = LocalAccount::new().with_field("email", "c@b.com");
        store.save(&mut untagged).await.unwrap();
        let found = store
            .find_for_import(&ImportScope::new("G-NEW", "c@b.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, untagged.id);
    }

    #[tokio::test]
    async fn update_keeps_single_row() {
        let store = MemoryAccountStore::default();
        let mut account = imported("G-1", "a@b.com");
        store.save(&mut account).await.unwrap();

        account.set("name", "Alice");
        store.save(&mut account).await.unwrap();

        assert_eq!(store.len(), 1);
        let stored = store.get_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.get_str("name"), Some("Alice"));
    }

    #[tokio::test]
    async fn trashed_accounts_hidden_from_username_lookup() {
        let store = MemoryAccountStore::default();
        let mut account = imported("G-1", "a@b.com");
        account.trash();
        store.save(&mut account).await.unwrap();

        assert!(store
            .get_by_username("a@b.com", false)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_by_username("a@b.com", true)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_for_import(&ImportScope::new("G-1", "a@b.com"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let store = MemoryAccountStore::default();
        for i in 0..3 {
            let mut account = imported(&format!("G-{i}"), &format!("u{i}@b.com"));
            store.save(&mut account).await.unwrap();
        }

        let all = store
            .search(&AccountSearchCriteria::new().domain("default"))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let limited = store
            .search(&AccountSearchCriteria::new().max_results(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }
}
