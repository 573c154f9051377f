//! LDAP directory backend.
//!
//! Secrets submitted for user binds are never logged.

use std::sync::Arc;

use async_trait::async_trait;
use dir_core::DomainConfig;
use dir_federation::{Directory, FederationResult, UserQuery};
use dir_model::DirectoryEntry;

use crate::config::LdapConfig;
use crate::connection::LdapConnectionPool;
use crate::error::LdapResult;
use crate::search::LdapSearcher;

/// A [`Directory`] backed by an LDAP server.
pub struct LdapDirectory {
    config: Arc<LdapConfig>,
    pool: LdapConnectionPool,
}

impl LdapDirectory {
    /// Creates a directory from an LDAP configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: LdapConfig) -> LdapResult<Self> {
        config.validate()?;

        let config = Arc::new(config);
        Ok(Self {
            pool: LdapConnectionPool::new(config.clone()),
            config,
        })
    }

    /// Creates the directory of a named domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection settings are invalid.
    pub fn from_domain(name: &str, config: &DomainConfig) -> LdapResult<Self> {
        Self::new(LdapConfig::from_domain(name, config)?)
    }

    /// Returns the LDAP configuration.
    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    async fn run(&self, query: &UserQuery) -> LdapResult<Vec<DirectoryEntry>> {
        let mut conn = self.pool.get().await?;
        let result = LdapSearcher::new(&mut conn, &self.config).search(query).await;
        if result.is_err() {
            conn.discard().await;
        }
        result
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn find_one(&self, query: &UserQuery) -> FederationResult<Option<DirectoryEntry>> {
        let query = query.clone().limit(1);
        Ok(self.run(&query).await?.into_iter().next())
    }

    async fn search(&self, query: &UserQuery) -> FederationResult<Vec<DirectoryEntry>> {
        Ok(self.run(query).await?)
    }

    async fn bind(&self, identifier: &str, secret: &str) -> FederationResult<bool> {
        let authenticated = self.pool.authenticate(identifier, secret).await?;
        tracing::debug!(
            domain = %self.config.domain,
            identifier,
            authenticated,
            "LDAP user bind"
        );
        Ok(authenticated)
    }

    async fn test_connection(&self) -> FederationResult<()> {
        Ok(self.pool.test_connection().await?)
    }
}
