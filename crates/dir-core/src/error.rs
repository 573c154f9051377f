//! Core error handling.
//!
//! Errors raised while loading and validating configuration. Messages name
//! the offending key but never echo secret values such as bind passwords.

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for configuration and bootstrap operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing or inconsistent keys).
    #[error("configuration error: {0}")]
    Config(String),

    /// A domain was referenced that is not configured.
    #[error("unknown domain: {0}")]
    UnknownDomain(String),

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns whether this error is caused by configuration content rather
    /// than by the environment (missing file, permissions).
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnknownDomain(_) | Self::Parse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_key() {
        let error = Error::config("locate_users_by cannot be empty");
        assert_eq!(
            error.to_string(),
            "configuration error: locate_users_by cannot be empty"
        );
        assert!(error.is_configuration_error());
    }

    #[test]
    fn io_error_is_not_configuration_error() {
        let error = Error::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert!(!error.is_configuration_error());
    }
}
