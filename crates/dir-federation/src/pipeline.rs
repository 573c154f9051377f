//! Authentication pipeline.
//!
//! Strings the resolver, importer and rule chain together for a login:
//!
//! ```text
//! credentials -> resolve -> DiscoveredWithCredentials
//!             -> (validate | bind -> import) in the configured order
//!             -> persist -> AuthenticationSuccessful
//! ```
//!
//! With [`ImportOrder::ValidateFirst`] the rules see the account as it
//! exists before the login and a rejected user never gets a local account.
//! With [`ImportOrder::ImportFirst`] the rules see the freshly hydrated
//! account; it is only saved when they pass.

use std::sync::Arc;

use dir_auth::PasswordHasherService;
use dir_core::DomainConfig;
use dir_model::{Credentials, DirectoryEntry, LocalAccount};
use dir_storage::AccountStore;

use crate::directory::Directory;
use crate::error::{FederationError, FederationResult};
use crate::event::{DirectoryEvent, NullEventSink, SharedEventSink};
use crate::hydrator::{HandlerRegistry, HydratorPipeline};
use crate::importer::Importer;
use crate::password::{CredentialMutator, PasswordSynchronizer};
use crate::resolver::UserResolver;
use crate::scope::ScopeRegistry;
use crate::validation::{RuleChain, RuleRegistry};

// ============================================================================
// Outcomes
// ============================================================================

/// Order of validation and import during a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportOrder {
    /// Evaluate rules against the existing account, then bind and import.
    #[default]
    ValidateFirst,
    /// Bind and import, then evaluate rules against the imported account.
    ImportFirst,
}

/// How a user was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Directory bind.
    Directory,
    /// Stored local credential, the directory had no matching entry.
    LocalFallback,
    /// Windows/SSO server variable.
    Windows,
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    /// Directory entry, absent for local fallback logins.
    pub entry: Option<DirectoryEntry>,
    /// Local account, absent when nothing is stored locally.
    pub account: Option<LocalAccount>,
    /// How the user was authenticated.
    pub source: AuthSource,
}

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// The user is logged in.
    Success(AuthenticatedUser),
    /// No directory entry (or fallback account) matched.
    NotFound,
    /// The directory rejected the secret.
    InvalidCredentials,
    /// The validation rule chain rejected the user.
    Rejected,
    /// The user authenticated but the local account is soft-deleted.
    Trashed,
}

impl AuthOutcome {
    /// Returns true if the user is logged in.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the authenticated user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&AuthenticatedUser> {
        match self {
            Self::Success(user) => Some(user),
            _ => None,
        }
    }

    /// Consumes the outcome and returns the authenticated user, if any.
    #[must_use]
    pub fn into_user(self) -> Option<AuthenticatedUser> {
        match self {
            Self::Success(user) => Some(user),
            _ => None,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Login pipeline for one domain.
#[derive(Clone)]
pub struct AuthenticationPipeline {
    pub(crate) resolver: UserResolver,
    pub(crate) importer: Option<Importer>,
    pub(crate) rules: RuleChain,
    pub(crate) events: SharedEventSink,
    pub(crate) order: ImportOrder,
    pub(crate) windows_order: ImportOrder,
    pub(crate) login_fallback: bool,
}

impl AuthenticationPipeline {
    /// Creates a pipeline that stores nothing locally.
    #[must_use]
    pub fn new(resolver: UserResolver, rules: RuleChain, events: SharedEventSink) -> Self {
        Self {
            resolver,
            importer: None,
            rules,
            events,
            order: ImportOrder::ValidateFirst,
            windows_order: ImportOrder::ImportFirst,
            login_fallback: false,
        }
    }

    /// Returns a builder for a domain.
    #[must_use]
    pub fn builder(config: DomainConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// Imports authenticated users into the local store.
    #[must_use]
    pub fn with_importer(mut self, importer: Importer) -> Self {
        self.importer = Some(importer);
        self
    }

    /// Sets the credential login order.
    #[must_use]
    pub const fn with_order(mut self, order: ImportOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets the Windows login order.
    #[must_use]
    pub const fn with_windows_order(mut self, order: ImportOrder) -> Self {
        self.windows_order = order;
        self
    }

    /// Enables verification against stored credentials when the directory
    /// has no matching entry.
    #[must_use]
    pub const fn with_login_fallback(mut self, enabled: bool) -> Self {
        self.login_fallback = enabled;
        self
    }

    /// Returns the resolver.
    #[must_use]
    pub const fn resolver(&self) -> &UserResolver {
        &self.resolver
    }

    /// Returns the importer, absent when nothing is stored locally.
    #[must_use]
    pub const fn importer(&self) -> Option<&Importer> {
        self.importer.as_ref()
    }

    /// Returns the rule chain.
    #[must_use]
    pub const fn rules(&self) -> &RuleChain {
        &self.rules
    }

    /// Returns the credential login order.
    #[must_use]
    pub const fn order(&self) -> ImportOrder {
        self.order
    }

    /// Attempts a login with submitted credentials.
    ///
    /// # Errors
    ///
    /// Returns configuration, directory, storage and import errors. Failed
    /// binds and rejections are outcomes, not errors.
    pub async fn attempt(&self, credentials: &Credentials) -> FederationResult<AuthOutcome> {
        let Some(entry) = self.resolver.resolve_by_credentials(credentials).await? else {
            return self.fallback(credentials).await;
        };

        self.events.emit(&DirectoryEvent::DiscoveredWithCredentials {
            entry: entry.clone(),
        });

        let secret = credentials.password();
        match self.order {
            ImportOrder::ValidateFirst => {
                let existing = match &self.importer {
                    Some(importer) => importer.locate(&entry).await?,
                    None => None,
                };
                if !self.validate(&entry, existing.as_ref()) {
                    return Ok(AuthOutcome::Rejected);
                }

                if !self.resolver.authenticate(&entry, credentials).await? {
                    return Ok(AuthOutcome::InvalidCredentials);
                }

                let account = match self.import(&entry, secret).await? {
                    Ok(account) => account,
                    Err(outcome) => return Ok(outcome),
                };
                let account = self.persist(&entry, secret, account).await?;
                Ok(self.succeed(entry, account))
            }
            ImportOrder::ImportFirst => {
                if !self.resolver.authenticate(&entry, credentials).await? {
                    return Ok(AuthOutcome::InvalidCredentials);
                }

                let account = match self.import(&entry, secret).await? {
                    Ok(account) => account,
                    Err(outcome) => return Ok(outcome),
                };
                if !self.validate(&entry, account.as_ref()) {
                    return Ok(AuthOutcome::Rejected);
                }

                let account = self.persist(&entry, secret, account).await?;
                Ok(self.succeed(entry, account))
            }
        }
    }

    /// Runs the import without saving. The inner `Err` carries the outcome
    /// for soft-deleted accounts.
    pub(crate) async fn import(
        &self,
        entry: &DirectoryEntry,
        secret: Option<&str>,
    ) -> FederationResult<Result<Option<LocalAccount>, AuthOutcome>> {
        let Some(importer) = &self.importer else {
            return Ok(Ok(None));
        };

        let account = importer.run(entry, secret).await?;
        if account.is_trashed() {
            self.events.emit(&DirectoryEvent::AuthenticatedModelTrashed {
                entry: entry.clone(),
                account,
            });
            return Ok(Err(AuthOutcome::Trashed));
        }
        Ok(Ok(Some(account)))
    }

    pub(crate) async fn persist(
        &self,
        entry: &DirectoryEntry,
        secret: Option<&str>,
        account: Option<LocalAccount>,
    ) -> FederationResult<Option<LocalAccount>> {
        match (&self.importer, account) {
            (Some(importer), Some(account)) => Ok(Some(importer.save(entry, secret, account).await?)),
            (_, account) => Ok(account),
        }
    }

    /// Evaluates the rule chain, emitting `AuthenticationRejected` on failure.
    pub(crate) fn validate(&self, entry: &DirectoryEntry, account: Option<&LocalAccount>) -> bool {
        if self.rules.passes(entry, account) {
            return true;
        }

        self.events.emit(&DirectoryEvent::AuthenticationRejected {
            entry: entry.clone(),
            account: account.cloned(),
        });
        false
    }

    fn succeed(&self, entry: DirectoryEntry, account: Option<LocalAccount>) -> AuthOutcome {
        self.events.emit(&DirectoryEvent::AuthenticationSuccessful {
            entry: entry.clone(),
            account: account.clone(),
        });

        AuthOutcome::Success(AuthenticatedUser {
            entry: Some(entry),
            account,
            source: AuthSource::Directory,
        })
    }

    async fn fallback(&self, credentials: &Credentials) -> FederationResult<AuthOutcome> {
        let Some(importer) = self.importer.as_ref().filter(|_| self.login_fallback) else {
            return Ok(AuthOutcome::NotFound);
        };

        let key = self.resolver.config().credential_key();
        let (Some(username), Some(secret)) = (credentials.get(key), credentials.password()) else {
            return Ok(AuthOutcome::NotFound);
        };

        let Some(account) = importer.store().get_by_username(username, false).await? else {
            return Ok(AuthOutcome::NotFound);
        };

        let hasher = importer.passwords().hasher();
        let verified = importer
            .schema()
            .password(&account)
            .is_some_and(|hash| hasher.matches(secret, hash));

        if !verified {
            tracing::debug!(account_id = %account.id, "Local fallback credential mismatch");
            return Ok(AuthOutcome::InvalidCredentials);
        }

        tracing::info!(account_id = %account.id, "Authenticated with local fallback credentials");
        Ok(AuthOutcome::Success(AuthenticatedUser {
            entry: None,
            account: Some(account),
            source: AuthSource::LocalFallback,
        }))
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles an [`AuthenticationPipeline`] from a domain configuration and
/// the registries built at startup.
pub struct PipelineBuilder {
    config: DomainConfig,
    default_domain: String,
    directory: Option<Arc<dyn Directory>>,
    store: Option<Arc<dyn AccountStore>>,
    events: SharedEventSink,
    scopes: ScopeRegistry,
    rules: RuleRegistry,
    handlers: HandlerRegistry,
    hydrators: HydratorPipeline,
    hasher: PasswordHasherService,
    mutator: Option<Arc<dyn CredentialMutator>>,
    order: ImportOrder,
    windows_order: ImportOrder,
}

impl PipelineBuilder {
    /// Creates a builder with the built-in scopes and rules.
    #[must_use]
    pub fn new(config: DomainConfig) -> Self {
        Self {
            config,
            default_domain: dir_core::config::DEFAULT_DOMAIN.to_string(),
            directory: None,
            store: None,
            events: Arc::new(NullEventSink),
            scopes: ScopeRegistry::builtin(),
            rules: RuleRegistry::builtin(),
            handlers: HandlerRegistry::new(),
            hydrators: HydratorPipeline::new(),
            hasher: PasswordHasherService::with_defaults(),
            mutator: None,
            order: ImportOrder::ValidateFirst,
            windows_order: ImportOrder::ImportFirst,
        }
    }

    /// Sets the domain tag used when entries carry none.
    #[must_use]
    pub fn default_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_domain = domain.into();
        self
    }

    /// Sets the directory.
    #[must_use]
    pub fn directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Sets the local account store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn events(mut self, events: SharedEventSink) -> Self {
        self.events = events;
        self
    }

    /// Sets the scope registry.
    #[must_use]
    pub fn scopes(mut self, scopes: ScopeRegistry) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the rule registry.
    #[must_use]
    pub fn rules(mut self, rules: RuleRegistry) -> Self {
        self.rules = rules;
        self
    }

    /// Sets the attribute handlers.
    #[must_use]
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Sets the hydrator pipeline.
    #[must_use]
    pub fn hydrators(mut self, hydrators: HydratorPipeline) -> Self {
        self.hydrators = hydrators;
        self
    }

    /// Sets the credential hasher.
    #[must_use]
    pub fn hasher(mut self, hasher: PasswordHasherService) -> Self {
        self.hasher = hasher;
        self
    }

    /// Stores credentials through a mutator instead of hashing them.
    #[must_use]
    pub fn mutator(mut self, mutator: Arc<dyn CredentialMutator>) -> Self {
        self.mutator = Some(mutator);
        self
    }

    /// Sets the credential login order.
    #[must_use]
    pub const fn order(mut self, order: ImportOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets the Windows login order.
    #[must_use]
    pub const fn windows_order(mut self, order: ImportOrder) -> Self {
        self.windows_order = order;
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the directory is missing, a store is
    /// missing while accounts are stored locally, or a scope or rule name is
    /// unknown.
    pub fn build(self) -> FederationResult<AuthenticationPipeline> {
        self.config.validate()?;

        let directory = self
            .directory
            .ok_or_else(|| FederationError::config("no directory configured"))?;

        let resolver = UserResolver::new(self.config.clone(), directory, self.events.clone())
            .with_scope_registry(&self.scopes)?;
        let rules = self.rules.chain(&self.config.rules)?;

        let importer = if self.config.provider.uses_database() {
            let store = self.store.ok_or_else(|| {
                FederationError::config("accounts are stored locally but no store is configured")
            })?;

            let mut passwords = PasswordSynchronizer::new(&self.config, self.hasher);
            if let Some(mutator) = self.mutator {
                passwords = passwords.with_mutator(mutator);
            }

            Some(
                Importer::new(
                    self.config.clone(),
                    self.default_domain,
                    store,
                    self.events.clone(),
                )
                .with_handlers(self.handlers)
                .with_hydrators(self.hydrators)
                .with_passwords(passwords),
            )
        } else {
            None
        };

        Ok(AuthenticationPipeline {
            resolver,
            importer,
            rules,
            events: self.events,
            order: self.order,
            windows_order: self.windows_order,
            login_fallback: self.config.login_fallback,
        })
    }
}
