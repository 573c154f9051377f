//! LDAP connection pool management.
//!
//! Service connections (bound as the configured service account, or
//! anonymously) are pooled. User binds always run on a dedicated connection
//! that is closed afterwards, so a pooled connection never changes identity.

use std::sync::Arc;

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::LdapConfig;
use crate::error::{LdapError, LdapResult};

/// Result code returned for a rejected bind.
const INVALID_CREDENTIALS: u32 = 49;

/// Connection pool for LDAP service connections.
pub struct LdapConnectionPool {
    config: Arc<LdapConfig>,
    semaphore: Arc<Semaphore>,
    idle: Arc<Mutex<Vec<Ldap>>>,
}

impl LdapConnectionPool {
    /// Creates a new connection pool. No connection is opened until first use.
    #[must_use]
    pub fn new(config: Arc<LdapConfig>) -> Self {
        let max_size = config.pool_max_size;
        Self {
            config,
            semaphore: Arc::new(Semaphore::new(max_size)),
            idle: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Gets a service connection from the pool.
    ///
    /// The connection returns to the pool when dropped.
    ///
    /// # Errors
    ///
    /// Returns a connection or bind error if a new connection is needed and
    /// cannot be established.
    pub async fn get(&self) -> LdapResult<LdapConnection> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LdapError::PoolExhausted)?;

        let reused = self.idle.lock().pop();
        let ldap = match reused {
            Some(ldap) => ldap,
            None => {
                let mut ldap = self.connect().await?;
                self.bind_service(&mut ldap).await?;
                ldap
            }
        };

        Ok(LdapConnection {
            ldap: Some(ldap),
            idle: self.idle.clone(),
            _permit: permit,
        })
    }

    /// Opens a new, unbound connection.
    async fn connect(&self) -> LdapResult<Ldap> {
        let mut settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connection_timeout)
            .set_starttls(self.config.starttls);
        if !self.config.validate_certificates {
            settings = settings.set_no_tls_verify(true);
        }

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.connection_url)
            .await
            .map_err(|e| LdapError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(error = %e, "LDAP connection driver error");
            }
        });

        Ok(ldap)
    }

    async fn bind_service(&self, ldap: &mut Ldap) -> LdapResult<()> {
        let (Some(bind_dn), Some(password)) =
            (&self.config.bind_dn, &self.config.bind_credential)
        else {
            return Ok(());
        };

        ldap.with_timeout(self.config.connection_timeout)
            .simple_bind(bind_dn, password)
            .await
            .map_err(|e| LdapError::Bind(e.to_string()))?
            .success()
            .map_err(|e| LdapError::Bind(format!("service bind rejected: {e}")))?;
        Ok(())
    }

    /// Binds as a user on a dedicated connection.
    ///
    /// Returns `Ok(false)` for rejected credentials. Empty secrets are
    /// rejected without contacting the server.
    ///
    /// # Errors
    ///
    /// Returns connection errors and unexpected result codes.
    pub async fn authenticate(&self, identifier: &str, secret: &str) -> LdapResult<bool> {
        if secret.is_empty() {
            return Ok(false);
        }

        let mut ldap = self.connect().await?;
        let result = ldap
            .with_timeout(self.config.connection_timeout)
            .simple_bind(identifier, secret)
            .await;
        let _ = ldap.unbind().await;

        let result = result.map_err(|e| LdapError::Connection(e.to_string()))?;
        match result.rc {
            0 => Ok(true),
            INVALID_CREDENTIALS => Ok(false),
            rc => Err(LdapError::search(format!(
                "bind returned result code {rc}: {}",
                result.text
            ))),
        }
    }

    /// Tests the connection to the LDAP server.
    ///
    /// # Errors
    ///
    /// Returns the connection, bind or search error.
    pub async fn test_connection(&self) -> LdapResult<()> {
        let mut conn = self.get().await?;

        conn.ldap_mut()?
            .with_timeout(self.config.connection_timeout)
            .search(
                &self.config.base_dn,
                ldap3::Scope::Base,
                "(objectClass=*)",
                vec!["dn"],
            )
            .await
            .map_err(|e| LdapError::Connection(format!("test search failed: {e}")))?
            .success()
            .map_err(|e| LdapError::Connection(format!("test search failed: {e}")))?;

        Ok(())
    }

    /// Returns the number of idle connections.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }
}

/// A service connection from the pool.
///
/// When dropped, the connection is returned to the pool.
pub struct LdapConnection {
    ldap: Option<Ldap>,
    idle: Arc<Mutex<Vec<Ldap>>>,
    _permit: OwnedSemaphorePermit,
}

impl LdapConnection {
    /// Returns a mutable reference to the LDAP handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection was discarded.
    pub fn ldap_mut(&mut self) -> LdapResult<&mut Ldap> {
        self.ldap
            .as_mut()
            .ok_or_else(|| LdapError::connection("connection was discarded"))
    }

    /// Closes the connection instead of returning it to the pool.
    ///
    /// Used after an operation failed and the connection state is unknown.
    pub async fn discard(mut self) {
        if let Some(mut ldap) = self.ldap.take() {
            let _ = ldap.unbind().await;
        }
    }
}

impl Drop for LdapConnection {
    fn drop(&mut self) {
        if let Some(ldap) = self.ldap.take() {
            self.idle.lock().push(ldap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Arc<LdapConfig> {
        Arc::new(
            LdapConfig::builder()
                .connection_url("ldaps://dc1.corp.example.com:636")
                .base_dn("dc=corp,dc=example,dc=com")
                .pool_size(5)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn pool_creation() {
        let pool = LdapConnectionPool::new(config());
        assert_eq!(pool.config().pool_max_size, 5);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn empty_secret_is_rejected_without_connecting() {
        let pool = LdapConnectionPool::new(config());
        assert!(!pool.authenticate("cn=alice,dc=corp", "").await.unwrap());
    }
}
