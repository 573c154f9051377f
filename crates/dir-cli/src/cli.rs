//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::OutputFormat;

/// dirsync - bridges directory users and local accounts.
#[derive(Debug, Parser)]
#[command(name = "dirsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to the user configuration directory).
    #[arg(short, long, env = "DIRSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Domain to operate on (overrides the configured default).
    #[arg(short, long, env = "DIRSYNC_DOMAIN")]
    pub domain: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import directory users into the local account store.
    Import(ImportArgs),

    /// Look up a single directory user.
    Find(FindArgs),

    /// Check the directory and database connections.
    Test,
}

/// Import arguments.
#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Import only the user with this lookup value.
    pub user: Option<String>,

    /// Raw directory filter narrowing the import.
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Soft-delete accounts whose directory entry is disabled.
    #[arg(long)]
    pub delete: bool,

    /// Restore soft-deleted accounts whose directory entry is enabled.
    #[arg(long)]
    pub restore: bool,

    /// Soft-delete imported accounts that no longer exist in the directory.
    #[arg(long, conflicts_with_all = ["user", "filter"])]
    pub delete_missing: bool,

    /// Do not log import events.
    #[arg(long)]
    pub no_log: bool,

    /// Skip the confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// Find arguments.
#[derive(Debug, Args)]
pub struct FindArgs {
    /// Value of the domain's lookup attribute.
    pub username: String,
}
