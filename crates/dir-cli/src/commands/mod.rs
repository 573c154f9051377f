//! Command implementations.

pub mod find;
pub mod import;

pub use find::run_find;
pub use import::run_import;
pub use test::run_test;

use std::sync::Arc;

use dir_core::DomainConfig;
use dir_federation::{AuthenticationPipeline, Directory, SharedEventSink};
use dir_federation_ldap::LdapDirectory;
use dir_model::AccountSchema;
use dir_storage::AccountStore;
use dir_storage_sql::{create_pool, migrate, PgAccountStore, PoolConfig};

use crate::{CliConfig, CliError, CliResult, OutputFormat};

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded configuration.
    pub config: CliConfig,
    /// Domain the command operates on.
    pub domain: String,
    /// Output format.
    pub output: OutputFormat,
}

impl Context {
    /// Creates a context, resolving the domain against the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain is not configured.
    pub fn new(config: CliConfig, domain: Option<&str>, output: OutputFormat) -> CliResult<Self> {
        let domain = config.effective_domain(domain);
        config.domain(&domain)?;
        Ok(Self {
            config,
            domain,
            output,
        })
    }

    /// Returns the settings of the selected domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain is not configured.
    pub fn domain_config(&self) -> CliResult<&DomainConfig> {
        self.config.domain(&self.domain)
    }

    /// Opens the directory of the selected domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection settings are invalid.
    pub fn directory(&self) -> CliResult<LdapDirectory> {
        Ok(LdapDirectory::from_domain(&self.domain, self.domain_config()?)?)
    }

    /// Opens the local account store, if the domain stores accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if accounts are stored locally but no database is
    /// configured or reachable, or if `apply_migrations` is set and a
    /// migration fails.
    pub async fn store(&self, apply_migrations: bool) -> CliResult<Option<Arc<dyn AccountStore>>> {
        let domain = self.domain_config()?;
        if !domain.provider.uses_database() {
            return Ok(None);
        }

        let database = self.config.settings.database.as_ref().ok_or_else(|| {
            CliError::Config(format!(
                "domain '{}' stores accounts locally but no [database] is configured",
                self.domain
            ))
        })?;

        let pool = create_pool(&PoolConfig::from(database)).await?;
        if apply_migrations {
            migrate(&pool).await?;
        }

        let store = PgAccountStore::new(pool, AccountSchema::from_config(domain));
        Ok(Some(Arc::new(store)))
    }

    /// Builds the authentication pipeline of the selected domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or store cannot be opened, or if
    /// the domain configuration names unknown scopes or rules.
    pub async fn pipeline(
        &self,
        events: SharedEventSink,
        apply_migrations: bool,
    ) -> CliResult<AuthenticationPipeline> {
        let directory: Arc<dyn Directory> = Arc::new(self.directory()?);

        let mut builder = AuthenticationPipeline::builder(self.domain_config()?.clone())
            .default_domain(self.domain.clone())
            .directory(directory)
            .events(events);
        if let Some(store) = self.store(apply_migrations).await? {
            builder = builder.store(store);
        }

        Ok(builder.build()?)
    }
}
