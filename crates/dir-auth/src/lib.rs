//! # dir-auth
//!
//! Credential primitives for the directory account bridge.
//!
//! ## Features
//!
//! - Argon2id hashing of locally stored credentials
//! - Detection of values that are not (or no longer) current hashes
//! - Random placeholder secrets for accounts whose secret is not synchronized
//!
//! ## Example
//!
//! ```ignore
//! use dir_auth::{placeholder_secret, PasswordHasherService};
//!
//! let hasher = PasswordHasherService::with_defaults();
//! let hash = hasher.hash(&placeholder_secret())?;
//! assert!(!hasher.needs_rehash(&hash));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod password;
pub mod random;

pub use error::{AuthError, AuthResult};
pub use password::{PasswordHasherService, PasswordPolicy};
pub use random::{placeholder_secret, random_alphanumeric};
