//! CLI error types.

use dir_federation::FederationError;
use dir_federation_ldap::LdapError;
use dir_storage::StorageError;
use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Resource not found.
    #[error("{resource_type} not found: {id}")]
    NotFound {
        /// Type of resource.
        resource_type: String,
        /// Resource identifier.
        id: String,
    },

    /// The user declined to continue.
    #[error("aborted")]
    Aborted,

    /// Configuration file error.
    #[error(transparent)]
    Core(#[from] dir_core::Error),

    /// Directory error.
    #[error("directory error: {0}")]
    Ldap(#[from] LdapError),

    /// Resolution, import or validation error.
    #[error(transparent)]
    Federation(#[from] FederationError),

    /// Database error.
    #[error("database error: {0}")]
    Storage(#[from] StorageError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message() {
        let err = CliError::not_found("user", "jdoe");
        assert_eq!(err.to_string(), "user not found: jdoe");
    }

    #[test]
    fn wraps_federation_errors() {
        let err: CliError = FederationError::config("no directory configured").into();
        assert!(matches!(err, CliError::Federation(_)));
    }
}
