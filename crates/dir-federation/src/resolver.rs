//! User resolver.
//!
//! Finds directory entries for submitted credentials, local accounts or
//! identifiers, and performs the authentication bind.

use std::sync::Arc;

use dir_core::DomainConfig;
use dir_model::{AccountSchema, Credentials, DirectoryEntry, LocalAccount};

use crate::directory::{Directory, UserQuery, ALL_ATTRIBUTES};
use crate::error::{FederationError, FederationResult};
use crate::event::{DirectoryEvent, SharedEventSink};
use crate::scope::{QueryScope, ScopeRegistry};

/// Bind attribute value meaning "the entry's distinguished name".
pub const BIND_BY_DN: &str = "dn";

/// Resolves directory users for one domain.
#[derive(Clone)]
pub struct UserResolver {
    config: DomainConfig,
    schema: AccountSchema,
    directory: Arc<dyn Directory>,
    scopes: Vec<Arc<dyn QueryScope>>,
    events: SharedEventSink,
}

impl UserResolver {
    /// Creates a resolver without query scopes.
    #[must_use]
    pub fn new(config: DomainConfig, directory: Arc<dyn Directory>, events: SharedEventSink) -> Self {
        Self {
            schema: AccountSchema::from_config(&config),
            config,
            directory,
            scopes: Vec::new(),
            events,
        }
    }

    /// Applies the configured query scopes, resolved from a registry.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown scope names.
    pub fn with_scope_registry(mut self, registry: &ScopeRegistry) -> FederationResult<Self> {
        self.scopes = registry.resolve(&self.config.scopes)?;
        Ok(self)
    }

    /// Appends a query scope.
    #[must_use]
    pub fn with_scope(mut self, scope: Arc<dyn QueryScope>) -> Self {
        self.scopes.push(scope);
        self
    }

    /// Returns the domain configuration.
    #[must_use]
    pub const fn config(&self) -> &DomainConfig {
        &self.config
    }

    /// Returns the directory.
    #[must_use]
    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    /// Builds a base query: every attribute plus the identifier attribute,
    /// with the query scopes applied in order.
    #[must_use]
    pub fn query(&self) -> UserQuery {
        let mut query = UserQuery::new().select([ALL_ATTRIBUTES, self.config.guid_attribute.as_str()]);
        for scope in &self.scopes {
            scope.apply(&mut query);
        }
        query
    }

    /// Finds an entry by unique identifier.
    ///
    /// # Errors
    ///
    /// Returns the directory's error.
    pub async fn resolve_by_id(&self, guid: &str) -> FederationResult<Option<DirectoryEntry>> {
        let query = self.query().where_guid(&self.config.guid_attribute, guid);
        self.directory.find_one(&query).await
    }

    /// Finds an entry whose `attribute` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns the directory's error.
    pub async fn resolve_by_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> FederationResult<Option<DirectoryEntry>> {
        let query = self.query().where_equals(attribute, value);
        self.directory.find_one(&query).await
    }

    /// Finds the entry matching submitted credentials.
    ///
    /// The username is read from the local username column key when
    /// accounts are stored locally, otherwise from the directory lookup
    /// attribute key. Empty credentials resolve to nothing.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the username key is absent, or the
    /// directory's error.
    pub async fn resolve_by_credentials(
        &self,
        credentials: &Credentials,
    ) -> FederationResult<Option<DirectoryEntry>> {
        if credentials.is_empty() {
            return Ok(None);
        }

        let key = self.config.credential_key();
        let username = credentials.get(key).ok_or_else(|| {
            FederationError::config(format!(
                "no username was supplied in credentials: expected key '{key}'"
            ))
        })?;

        self.resolve_by_attribute(&self.config.locate_users_by, username)
            .await
    }

    /// Finds the entry of a local account via its stored identifier.
    ///
    /// # Errors
    ///
    /// Returns the directory's error.
    pub async fn resolve_by_account(
        &self,
        account: &LocalAccount,
    ) -> FederationResult<Option<DirectoryEntry>> {
        match self.schema.guid(account) {
            Some(guid) => self.resolve_by_id(guid).await,
            None => Ok(None),
        }
    }

    /// Finds every entry matching an optional raw filter.
    ///
    /// # Errors
    ///
    /// Returns the directory's error.
    pub async fn search(&self, filter: Option<&str>) -> FederationResult<Vec<DirectoryEntry>> {
        let mut query = self.query();
        if let Some(filter) = filter {
            query = query.raw_filter(filter);
        }
        self.directory.search(&query).await
    }

    /// Returns the identifier submitted when binding as `entry`.
    #[must_use]
    pub fn bind_identifier<'a>(&self, entry: &'a DirectoryEntry) -> Option<&'a str> {
        let identifier = if self.config.bind_users_by.eq_ignore_ascii_case(BIND_BY_DN) {
            Some(entry.dn())
        } else {
            entry.first(&self.config.bind_users_by)
        };
        identifier.filter(|identifier| !identifier.is_empty())
    }

    /// Binds as `entry` with the submitted secret.
    ///
    /// Emits `Authenticating`, then exactly one of `Authenticated` or
    /// `AuthenticationFailed`. A missing identifier or secret fails without
    /// contacting the directory.
    ///
    /// # Errors
    ///
    /// Returns the directory's error, after emitting `AuthenticationFailed`.
    pub async fn authenticate(
        &self,
        entry: &DirectoryEntry,
        credentials: &Credentials,
    ) -> FederationResult<bool> {
        let identifier = self.bind_identifier(entry);

        self.events.emit(&DirectoryEvent::Authenticating {
            entry: entry.clone(),
            username: identifier.unwrap_or_default().to_string(),
        });

        let secret = credentials.password().filter(|secret| !secret.is_empty());
        let outcome = match (identifier, secret) {
            (Some(identifier), Some(secret)) => self.directory.bind(identifier, secret).await,
            _ => {
                tracing::debug!(dn = entry.dn(), "Missing bind identifier or secret");
                Ok(false)
            }
        };

        let event = if matches!(outcome, Ok(true)) {
            DirectoryEvent::Authenticated {
                entry: entry.clone(),
            }
        } else {
            DirectoryEvent::AuthenticationFailed {
                entry: entry.clone(),
            }
        };
        self.events.emit(&event);

        outcome
    }
}
