//! LDAP-specific error types.
//!
//! Error messages never carry bind credentials or submitted secrets.

use dir_federation::FederationError;
use thiserror::Error;

/// LDAP-specific errors.
#[derive(Debug, Error)]
pub enum LdapError {
    /// Invalid configuration.
    #[error("LDAP configuration error: {0}")]
    Configuration(String),

    /// The connection URL uses neither `ldap://` nor `ldaps://`.
    #[error("Unsupported LDAP URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Connection failed.
    #[error("LDAP connection failed: {0}")]
    Connection(String),

    /// Service account bind failed.
    #[error("LDAP bind failed: {0}")]
    Bind(String),

    /// Search operation failed.
    #[error("LDAP search failed: {0}")]
    Search(String),

    /// An identifier could not be converted to its binary form.
    #[error("Invalid GUID: {0}")]
    InvalidGuid(String),

    /// Timeout error.
    #[error("LDAP operation timed out")]
    Timeout,

    /// Pool exhausted.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Underlying ldap3 error.
    #[error("LDAP error: {0}")]
    Ldap3(#[from] ldap3::LdapError),
}

impl LdapError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a search error.
    #[must_use]
    pub fn search(msg: impl Into<String>) -> Self {
        Self::Search(msg.into())
    }

    /// Checks if this is a connection-related error.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Bind(_) | Self::Timeout | Self::PoolExhausted
        )
    }

    /// Checks if this is a configuration error.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::UnsupportedScheme(_))
    }
}

/// Result type for LDAP operations.
pub type LdapResult<T> = Result<T, LdapError>;

impl From<LdapError> for FederationError {
    fn from(err: LdapError) -> Self {
        match err {
            LdapError::Configuration(msg) => Self::Configuration(msg),
            LdapError::UnsupportedScheme(_) => Self::Configuration(err.to_string()),
            LdapError::Connection(msg) | LdapError::Bind(msg) => Self::Connection(msg),
            LdapError::PoolExhausted => Self::Connection(err.to_string()),
            LdapError::Timeout => Self::Timeout("LDAP operation".to_string()),
            LdapError::Search(msg) | LdapError::InvalidGuid(msg) => Self::Directory(msg),
            LdapError::Ldap3(e) => Self::Directory(e.to_string()),
        }
    }
}
