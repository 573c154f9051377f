//! # dir-core
//!
//! Configuration and core error handling for the directory account bridge.
//!
//! This crate holds the passive, read-only configuration shared by every
//! other crate: per-domain synchronization settings, directory connection
//! settings and event logging options.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::{
    Config, ConnectionConfig, DatabaseColumns, DatabaseConfig, DomainConfig, LogLevel,
    LoggingConfig, ProviderMode, WindowsConfig,
};
pub use error::{Error, Result};
