//! # dir-storage
//!
//! Local account storage abstraction.
//!
//! This crate defines the storage interface the directory bridge writes
//! imported accounts through, together with the import scope used to
//! locate an existing account for a directory entry.
//!
//! ## Provider Traits
//!
//! - [`AccountStore`] - lookup and persistence of local accounts
//!
//! ## Implementations
//!
//! - [`MemoryAccountStore`] - in-process store

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod scope;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryAccountStore;
pub use scope::{ImportScope, ScopeMatch};
pub use store::{AccountSearchCriteria, AccountStore};
