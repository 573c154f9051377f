//! # dir-cli
//!
//! The `dirsync` command-line tool.
//!
//! Imports directory users into the local account store, looks single users
//! up and checks that the configured directory and database are reachable.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::uninlined_format_args)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use config::{CliConfig, OutputFormat};
pub use error::{CliError, CliResult};
