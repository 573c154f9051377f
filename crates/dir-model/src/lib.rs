//! # dir-model
//!
//! Domain models shared by the directory account bridge.
//!
//! - [`DirectoryEntry`] - a read-only record returned by the directory
//! - [`LocalAccount`] - a row of the application's user table
//! - [`AccountSchema`] - which local columns hold the username, identifier,
//!   domain and credential
//! - [`Credentials`] - fields submitted for one authentication attempt

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
pub mod credentials;
pub mod entry;

pub use account::{AccountSchema, LocalAccount};
pub use credentials::{Credentials, PASSWORD_KEY};
pub use entry::DirectoryEntry;
