//! Local credential synchronization.
//!
//! Decides whether the credential column of a local account has to be
//! (re)written and writes it. Used by the password hydrator during imports
//! and directly after successful binds.

use std::sync::Arc;

use dir_auth::{placeholder_secret, PasswordHasherService};
use dir_core::DomainConfig;
use dir_model::LocalAccount;

use crate::error::FederationResult;

/// Where a synchronization runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncContext {
    /// An interactive login.
    #[default]
    Interactive,
    /// An unattended batch import.
    Batch,
}

/// Transform applied to a plaintext credential before it is stored,
/// replacing the default hashing.
pub trait CredentialMutator: Send + Sync {
    /// Returns the value to store for `plaintext`.
    fn set_credential(&self, plaintext: &str) -> FederationResult<String>;
}

/// Reconciles the stored credential of a local account.
#[derive(Clone)]
pub struct PasswordSynchronizer {
    password_column: Option<String>,
    sync_passwords: bool,
    hasher: PasswordHasherService,
    mutator: Option<Arc<dyn CredentialMutator>>,
    context: SyncContext,
}

impl PasswordSynchronizer {
    /// Creates a synchronizer for a domain.
    #[must_use]
    pub fn new(config: &DomainConfig, hasher: PasswordHasherService) -> Self {
        Self {
            password_column: config.password_column.clone(),
            sync_passwords: config.sync_passwords,
            hasher,
            mutator: None,
            context: SyncContext::Interactive,
        }
    }

    /// Stores credentials through a mutator instead of hashing them.
    #[must_use]
    pub fn with_mutator(mut self, mutator: Arc<dyn CredentialMutator>) -> Self {
        self.mutator = Some(mutator);
        self
    }

    /// Sets the context the synchronizer runs in.
    #[must_use]
    pub fn with_context(mut self, context: SyncContext) -> Self {
        self.context = context;
        self
    }

    /// Returns the context the synchronizer runs in.
    #[must_use]
    pub const fn context(&self) -> SyncContext {
        self.context
    }

    /// Returns the hasher.
    #[must_use]
    pub const fn hasher(&self) -> &PasswordHasherService {
        &self.hasher
    }

    /// Synchronizes the credential of `account`.
    ///
    /// Returns `true` if the credential column was written.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing or the mutator fails.
    pub fn run(&self, account: &mut LocalAccount, secret: Option<&str>) -> FederationResult<bool> {
        let Some(column) = self.password_column.as_deref() else {
            return Ok(false);
        };

        let candidate = match secret {
            Some(secret) if self.sync_passwords => secret.to_string(),
            _ => placeholder_secret(),
        };

        if !self.needs_update(account, column, &candidate) {
            return Ok(false);
        }

        let value = match &self.mutator {
            Some(mutator) => mutator.set_credential(&candidate)?,
            None => self.hasher.hash(&candidate)?,
        };
        account.set(column, value);

        tracing::debug!(account_id = %account.id, "Local credential updated");
        Ok(true)
    }

    fn needs_update(&self, account: &LocalAccount, column: &str, candidate: &str) -> bool {
        let current = account.get_str(column).filter(|value| !value.is_empty());

        if self.context == SyncContext::Batch
            && current.is_some_and(|hash| !self.hasher.needs_rehash(hash))
        {
            return false;
        }

        match current {
            Some(hash) if self.sync_passwords => !self.hasher.matches(candidate, hash),
            Some(_) => false,
            None => true,
        }
    }
}
