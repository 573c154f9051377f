//! # dir-storage-sql
//!
//! SQLx-based account storage for the directory account bridge.
//!
//! This crate provides `PostgreSQL` storage using `SQLx`. The bundled
//! migration creates the `accounts` table with a partial unique index on
//! the stored directory identifier.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
mod entities;
pub mod error;
pub mod pool;

pub use account::PgAccountStore;
pub use pool::{create_pool, migrate, PoolConfig};
