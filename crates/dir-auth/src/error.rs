//! Credential error types.

use thiserror::Error;

/// Credential hashing and verification errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The secret does not match the stored hash.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The stored value is not a recognizable hash.
    #[error("malformed credential hash: {0}")]
    MalformedHash(String),
    /// Hashing parameters were rejected or hashing failed.
    #[error("credential hashing failed: {0}")]
    Hashing(String),
}

/// Result type for credential operations.
pub type AuthResult<T> = Result<T, AuthError>;
