//! Importer.
//!
//! Locates or creates the local account of a directory entry and hydrates
//! it. The importer never persists on its own: callers decide whether the
//! returned account is saved, which lets them validate or refuse it first.

use std::sync::Arc;

use dir_auth::PasswordHasherService;
use dir_core::DomainConfig;
use dir_model::{AccountSchema, DirectoryEntry, LocalAccount};
use dir_storage::{AccountStore, ImportScope};

use crate::error::{FederationError, FederationResult};
use crate::event::{DirectoryEvent, SharedEventSink};
use crate::hydrator::{HandlerRegistry, HydrationContext, HydratorPipeline};
use crate::password::{PasswordSynchronizer, SyncContext};

/// Imports directory entries into the local account store.
#[derive(Clone)]
pub struct Importer {
    config: DomainConfig,
    schema: AccountSchema,
    default_domain: String,
    store: Arc<dyn AccountStore>,
    handlers: HandlerRegistry,
    hydrators: HydratorPipeline,
    passwords: PasswordSynchronizer,
    events: SharedEventSink,
}

impl Importer {
    /// Creates an importer for one domain.
    ///
    /// `default_domain` tags accounts whose entry carries no domain.
    #[must_use]
    pub fn new(
        config: DomainConfig,
        default_domain: impl Into<String>,
        store: Arc<dyn AccountStore>,
        events: SharedEventSink,
    ) -> Self {
        let passwords = PasswordSynchronizer::new(&config, PasswordHasherService::with_defaults());
        Self {
            schema: store.schema().clone(),
            config,
            default_domain: default_domain.into(),
            store,
            handlers: HandlerRegistry::new(),
            hydrators: HydratorPipeline::new(),
            passwords,
            events,
        }
    }

    /// Sets the attribute handlers.
    #[must_use]
    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Sets the hydrator pipeline.
    #[must_use]
    pub fn with_hydrators(mut self, hydrators: HydratorPipeline) -> Self {
        self.hydrators = hydrators;
        self
    }

    /// Sets the credential synchronizer.
    #[must_use]
    pub fn with_passwords(mut self, passwords: PasswordSynchronizer) -> Self {
        self.passwords = passwords;
        self
    }

    /// Sets the context credential synchronization runs in.
    #[must_use]
    pub fn with_context(mut self, context: SyncContext) -> Self {
        self.passwords = self.passwords.with_context(context);
        self
    }

    /// Returns the account store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Returns the local column names.
    #[must_use]
    pub const fn schema(&self) -> &AccountSchema {
        &self.schema
    }

    /// Returns the credential synchronizer.
    #[must_use]
    pub const fn passwords(&self) -> &PasswordSynchronizer {
        &self.passwords
    }

    /// Builds the import scope of an entry.
    ///
    /// # Errors
    ///
    /// Returns `MissingAttribute` if the lookup attribute is absent or blank.
    pub fn scope(&self, entry: &DirectoryEntry) -> FederationResult<ImportScope> {
        let attribute = &self.config.locate_users_by;
        let username = entry
            .first(attribute)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| FederationError::missing_attribute(attribute, entry.dn()))?;

        Ok(ImportScope::new(entry.guid(), username))
    }

    /// Finds the existing local account of an entry without changing it.
    ///
    /// # Errors
    ///
    /// Returns `MissingAttribute` for entries without a username, or the
    /// store's error.
    pub async fn locate(&self, entry: &DirectoryEntry) -> FederationResult<Option<LocalAccount>> {
        let scope = self.scope(entry)?;
        Ok(self.store.find_for_import(&scope).await?)
    }

    /// Locates or creates the account of `entry` and hydrates it.
    ///
    /// The returned account is not saved.
    ///
    /// # Errors
    ///
    /// Returns `MissingAttribute` before any event is emitted if the entry
    /// has no username, or the first store or hydrator error.
    pub async fn run(
        &self,
        entry: &DirectoryEntry,
        secret: Option<&str>,
    ) -> FederationResult<LocalAccount> {
        let mut account = self.locate(entry).await?.unwrap_or_default();

        if !account.exists() {
            self.events.emit(&DirectoryEvent::Importing {
                entry: entry.clone(),
                account: account.clone(),
            });
        }

        self.events.emit(&DirectoryEvent::Synchronizing {
            entry: entry.clone(),
            account: account.clone(),
        });

        let ctx = HydrationContext {
            config: &self.config,
            schema: &self.schema,
            default_domain: &self.default_domain,
            secret,
            handlers: &self.handlers,
            passwords: &self.passwords,
        };
        self.hydrators.run(entry, &mut account, &ctx)?;

        self.events.emit(&DirectoryEvent::Synchronized {
            entry: entry.clone(),
            account: account.clone(),
        });

        Ok(account)
    }

    /// Saves an imported account.
    ///
    /// When a first-time insert loses a race against a concurrent import of
    /// the same entry, the import is run once more so the row created by the
    /// other caller is updated instead.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn save(
        &self,
        entry: &DirectoryEntry,
        secret: Option<&str>,
        mut account: LocalAccount,
    ) -> FederationResult<LocalAccount> {
        let was_new = !account.exists();
        match self.store.save(&mut account).await {
            Ok(()) => Ok(account),
            Err(err) if was_new && err.is_duplicate() => {
                tracing::debug!(guid = entry.guid(), "Concurrent import detected, retrying");
                let mut retried = self.run(entry, secret).await?;
                self.store.save(&mut retried).await?;
                Ok(retried)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Runs the import and saves the result.
    ///
    /// # Errors
    ///
    /// See [`Importer::run`] and [`Importer::save`].
    pub async fn import(
        &self,
        entry: &DirectoryEntry,
        secret: Option<&str>,
    ) -> FederationResult<LocalAccount> {
        let account = self.run(entry, secret).await?;
        self.save(entry, secret, account).await
    }
}
