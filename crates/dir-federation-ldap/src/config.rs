//! LDAP connection configuration.
//!
//! Both `ldaps://` and `ldap://` URLs are accepted. Plain connections can be
//! upgraded with STARTTLS; a plain connection without it is allowed but
//! logged, since user secrets travel over it during binds.

use std::time::Duration;

use dir_core::DomainConfig;
use serde::{Deserialize, Serialize};

use crate::error::{LdapError, LdapResult};

/// LDAP search scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchScope {
    /// Search only the base DN.
    Base,
    /// Search one level below the base DN.
    OneLevel,
    /// Search the entire subtree.
    #[default]
    Subtree,
}

impl SearchScope {
    /// Converts to ldap3 scope.
    #[must_use]
    pub const fn to_ldap3(self) -> ldap3::Scope {
        match self {
            Self::Base => ldap3::Scope::Base,
            Self::OneLevel => ldap3::Scope::OneLevel,
            Self::Subtree => ldap3::Scope::Subtree,
        }
    }
}

// ============================================================================
// LDAP Configuration
// ============================================================================

/// Connection and search settings of one LDAP domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    // === Connection ===
    /// Domain tag attached to every returned entry.
    pub domain: String,

    /// LDAP server URL.
    pub connection_url: String,

    /// Service account DN, anonymous binds when absent.
    pub bind_dn: Option<String>,

    /// Service account password.
    #[serde(skip_serializing)]
    pub bind_credential: Option<String>,

    // === TLS ===
    /// Whether plain connections are upgraded with STARTTLS.
    pub starttls: bool,

    /// Whether to validate server certificates.
    pub validate_certificates: bool,

    // === Directory Structure ===
    /// Base DN for user searches.
    pub base_dn: String,

    /// Filter every user search is restricted to.
    pub user_filter: String,

    /// Attribute holding the unique identifier.
    pub guid_attribute: String,

    // === Search ===
    /// Search scope.
    pub search_scope: SearchScope,

    /// Maximum entries a search may return, `0` for no cap.
    pub max_results: usize,

    /// Entries requested per page when listing users.
    pub page_size: u32,

    // === Connection Pool ===
    /// Maximum concurrent service connections.
    pub pool_max_size: usize,

    /// Connection and operation timeout.
    pub connection_timeout: Duration,
}

impl LdapConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> LdapConfigBuilder {
        LdapConfigBuilder::new()
    }

    /// Builds the configuration of a named domain.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the connection settings are invalid.
    pub fn from_domain(name: &str, config: &DomainConfig) -> LdapResult<Self> {
        let connection = &config.connection;
        let mut builder = Self::builder()
            .domain(name)
            .connection_url(&connection.url)
            .base_dn(&connection.base_dn)
            .user_filter(&connection.user_filter)
            .guid_attribute(&config.guid_attribute)
            .starttls(connection.starttls)
            .validate_certificates(connection.validate_certificates)
            .max_results(connection.max_results)
            .page_size(connection.page_size)
            .connection_timeout(Duration::from_secs(connection.timeout_secs));

        if let Some(bind_dn) = &connection.bind_dn {
            builder = builder.bind_dn(bind_dn);
        }
        if let Some(password) = &connection.password {
            builder = builder.bind_credential(password);
        }
        builder.build()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported URL schemes, STARTTLS over `ldaps://`,
    /// or empty required settings.
    pub fn validate(&self) -> LdapResult<()> {
        let url = self.connection_url.to_lowercase();
        let host = url
            .strip_prefix("ldaps://")
            .or_else(|| url.strip_prefix("ldap://"))
            .ok_or_else(|| LdapError::UnsupportedScheme(self.connection_url.clone()))?;

        if host.is_empty() {
            return Err(LdapError::config("connection URL is missing a host"));
        }

        if self.starttls && self.is_ldaps() {
            return Err(LdapError::config("STARTTLS cannot be used with ldaps://"));
        }

        if self.base_dn.trim().is_empty() {
            return Err(LdapError::config("base_dn cannot be empty"));
        }

        if self.guid_attribute.trim().is_empty() {
            return Err(LdapError::config("guid_attribute cannot be empty"));
        }

        if self.bind_dn.is_some() && self.bind_credential.is_none() {
            return Err(LdapError::config("bind_dn requires a password"));
        }

        if self.page_size == 0 {
            return Err(LdapError::config("page_size must be at least 1"));
        }

        if self.pool_max_size == 0 {
            return Err(LdapError::config("pool_max_size must be at least 1"));
        }

        Ok(())
    }

    /// Returns true if the URL uses `ldaps://`.
    #[must_use]
    pub fn is_ldaps(&self) -> bool {
        self.connection_url.to_lowercase().starts_with("ldaps://")
    }

    /// Returns true if traffic is encrypted.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.is_ldaps() || self.starttls
    }

    /// Returns true if the identifier attribute holds binary Active
    /// Directory GUIDs.
    #[must_use]
    pub fn guid_is_binary(&self) -> bool {
        self.guid_attribute.eq_ignore_ascii_case("objectguid")
    }
}

// ============================================================================
// Configuration Builder
// ============================================================================

/// Builder for LDAP configuration.
#[derive(Debug)]
pub struct LdapConfigBuilder {
    domain: String,
    connection_url: Option<String>,
    bind_dn: Option<String>,
    bind_credential: Option<String>,
    starttls: bool,
    validate_certificates: bool,
    base_dn: Option<String>,
    user_filter: String,
    guid_attribute: String,
    search_scope: SearchScope,
    max_results: usize,
    page_size: u32,
    pool_max_size: usize,
    connection_timeout: Duration,
}

impl Default for LdapConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LdapConfigBuilder {
    /// Creates a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            domain: dir_core::config::DEFAULT_DOMAIN.to_string(),
            connection_url: None,
            bind_dn: None,
            bind_credential: None,
            starttls: false,
            validate_certificates: true,
            base_dn: None,
            user_filter: "(objectClass=person)".to_string(),
            guid_attribute: "objectguid".to_string(),
            search_scope: SearchScope::Subtree,
            max_results: 0,
            page_size: 500,
            pool_max_size: 4,
            connection_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the domain tag.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Sets the connection URL.
    #[must_use]
    pub fn connection_url(mut self, url: impl Into<String>) -> Self {
        self.connection_url = Some(url.into());
        self
    }

    /// Sets the service account DN.
    #[must_use]
    pub fn bind_dn(mut self, dn: impl Into<String>) -> Self {
        self.bind_dn = Some(dn.into());
        self
    }

    /// Sets the service account password.
    #[must_use]
    pub fn bind_credential(mut self, credential: impl Into<String>) -> Self {
        self.bind_credential = Some(credential.into());
        self
    }

    /// Sets whether plain connections are upgraded with STARTTLS.
    #[must_use]
    pub const fn starttls(mut self, starttls: bool) -> Self {
        self.starttls = starttls;
        self
    }

    /// Sets whether to validate certificates.
    #[must_use]
    pub const fn validate_certificates(mut self, validate: bool) -> Self {
        self.validate_certificates = validate;
        self
    }

    /// Sets the base DN for user searches.
    #[must_use]
    pub fn base_dn(mut self, dn: impl Into<String>) -> Self {
        self.base_dn = Some(dn.into());
        self
    }

    /// Sets the filter every user search is restricted to.
    #[must_use]
    pub fn user_filter(mut self, filter: impl Into<String>) -> Self {
        self.user_filter = filter.into();
        self
    }

    /// Sets the identifier attribute.
    #[must_use]
    pub fn guid_attribute(mut self, attr: impl Into<String>) -> Self {
        self.guid_attribute = attr.into();
        self
    }

    /// Sets the search scope.
    #[must_use]
    pub const fn search_scope(mut self, scope: SearchScope) -> Self {
        self.search_scope = scope;
        self
    }

    /// Sets the maximum entries per search.
    #[must_use]
    pub const fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Sets the page size used when listing users.
    #[must_use]
    pub const fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the maximum number of concurrent service connections.
    #[must_use]
    pub const fn pool_size(mut self, max: usize) -> Self {
        self.pool_max_size = max;
        self
    }

    /// Sets the connection and operation timeout.
    #[must_use]
    pub const fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or invalid.
    pub fn build(self) -> LdapResult<LdapConfig> {
        let config = LdapConfig {
            domain: self.domain,
            connection_url: self
                .connection_url
                .ok_or_else(|| LdapError::config("connection_url is required"))?,
            bind_dn: self.bind_dn,
            bind_credential: self.bind_credential,
            starttls: self.starttls,
            validate_certificates: self.validate_certificates,
            base_dn: self
                .base_dn
                .ok_or_else(|| LdapError::config("base_dn is required"))?,
            user_filter: self.user_filter,
            guid_attribute: self.guid_attribute,
            search_scope: self.search_scope,
            max_results: self.max_results,
            page_size: self.page_size,
            pool_max_size: self.pool_max_size,
            connection_timeout: self.connection_timeout,
        };

        config.validate()?;

        if !config.is_encrypted() {
            tracing::warn!(
                domain = %config.domain,
                "LDAP connection is neither ldaps:// nor STARTTLS; user secrets are sent in cleartext"
            );
        }

        Ok(config)
    }
}
