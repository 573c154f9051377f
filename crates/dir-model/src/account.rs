//! Local account model.
//!
//! A local account is a row in the application's own user table. Its
//! columns are free-form (they are driven by the attribute map), so fields
//! are kept in an ordered map of JSON values. The columns the bridge itself
//! relies on are named by an [`AccountSchema`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dir_core::DomainConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A row in the local user store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalAccount {
    /// Primary key.
    pub id: Uuid,

    /// Column values keyed by column name.
    pub fields: BTreeMap<String, Value>,

    /// Whether the account has been written to the store.
    #[serde(default)]
    pub persisted: bool,

    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Default for LocalAccount {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAccount {
    /// Creates a new, unsaved account.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            fields: BTreeMap::new(),
            persisted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a field value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Gets a field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Gets a string field. Null and non-string values read as absent.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Returns true once the account exists in the store.
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.persisted
    }

    /// Returns true if the account is soft-deleted.
    #[must_use]
    pub const fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Soft-deletes the account.
    pub fn trash(&mut self) {
        self.deleted_at = Some(Utc::now());
    }

    /// Restores a soft-deleted account.
    pub fn restore(&mut self) {
        self.deleted_at = None;
    }

    /// Marks the account as written to the store.
    pub fn mark_persisted(&mut self) {
        self.persisted = true;
        self.updated_at = Utc::now();
    }
}

/// Names of the columns the bridge reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSchema {
    /// Username column (also the credential lookup key).
    pub username_column: String,
    /// Stored directory identifier column.
    pub guid_column: String,
    /// Stored domain tag column.
    pub domain_column: String,
    /// Credential column, if credentials are stored locally.
    pub password_column: Option<String>,
}

impl Default for AccountSchema {
    fn default() -> Self {
        Self::from_config(&DomainConfig::default())
    }
}

impl AccountSchema {
    /// Builds the schema from a domain configuration.
    #[must_use]
    pub fn from_config(config: &DomainConfig) -> Self {
        Self {
            username_column: config.database.username_column.clone(),
            guid_column: config.database.guid_column.clone(),
            domain_column: config.database.domain_column.clone(),
            password_column: config.password_column.clone(),
        }
    }

    /// Returns the stored directory identifier of an account.
    #[must_use]
    pub fn guid<'a>(&self, account: &'a LocalAccount) -> Option<&'a str> {
        account
            .get_str(&self.guid_column)
            .filter(|guid| !guid.is_empty())
    }

    /// Returns the username of an account.
    #[must_use]
    pub fn username<'a>(&self, account: &'a LocalAccount) -> Option<&'a str> {
        account.get_str(&self.username_column)
    }

    /// Returns the stored domain tag of an account.
    #[must_use]
    pub fn domain<'a>(&self, account: &'a LocalAccount) -> Option<&'a str> {
        account.get_str(&self.domain_column)
    }

    /// Returns the stored credential of an account.
    #[must_use]
    pub fn password<'a>(&self, account: &'a LocalAccount) -> Option<&'a str> {
        self.password_column
            .as_deref()
            .and_then(|column| account.get_str(column))
    }
}
