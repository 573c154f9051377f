//! Federation error types.
//!
//! Authentication failures and validation rejections are not errors: they
//! are boolean outcomes accompanied by events. The variants here cover
//! configuration mistakes, unusable directory entries and failures of the
//! collaborators (directory, store, hasher, custom handlers).

use dir_auth::AuthError;
use dir_storage::StorageError;
use thiserror::Error;

/// Errors that can occur during federation operations.
#[derive(Debug, Error)]
pub enum FederationError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A directory entry lacks a required attribute, or it is blank.
    #[error("Directory entry '{dn}' is missing required attribute '{attribute}'")]
    MissingAttribute {
        /// Attribute name.
        attribute: String,
        /// Distinguished name of the entry.
        dn: String,
    },

    /// Connection error to the directory.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Directory query error.
    #[error("Directory error: {0}")]
    Directory(String),

    /// Timeout error.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Credential hashing error.
    #[error("Credential error: {0}")]
    Credential(#[from] AuthError),

    /// A custom attribute handler failed.
    #[error("Attribute handler '{name}' failed: {message}")]
    Handler {
        /// Registered handler name.
        name: String,
        /// Failure description.
        message: String,
    },

    /// Storage error when persisting imported accounts.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal error.
    #[error("Internal federation error: {0}")]
    Internal(String),
}

impl FederationError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a missing attribute error.
    #[must_use]
    pub fn missing_attribute(attribute: impl Into<String>, dn: impl Into<String>) -> Self {
        Self::MissingAttribute {
            attribute: attribute.into(),
            dn: dn.into(),
        }
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a directory error.
    #[must_use]
    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }

    /// Creates a handler error.
    #[must_use]
    pub fn handler(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Checks if this is a configuration error.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Checks if this is a missing attribute error.
    #[must_use]
    pub const fn is_missing_attribute(&self) -> bool {
        matches!(self, Self::MissingAttribute { .. })
    }

    /// Checks if this is a connection error.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }

    /// Checks if this is a unique constraint violation from the store.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Storage(err) if err.is_duplicate())
    }
}

impl From<dir_core::Error> for FederationError {
    fn from(err: dir_core::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Result type for federation operations.
pub type FederationResult<T> = Result<T, FederationError>;
