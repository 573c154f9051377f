//! # dirsync
//!
//! Command-line tool for the directory account bridge.

#![forbid(unsafe_code)]
#![allow(clippy::uninlined_format_args)]

use clap::Parser;
use dir_cli::{
    cli::{Cli, Command},
    commands::{run_find, run_import, run_test, Context},
    config::CliConfig,
    output::error,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let context = Context::new(config, cli.domain.as_deref(), cli.output)?;
    tracing::debug!(
        path = %context.config.path.display(),
        domain = %context.domain,
        "Configuration loaded"
    );

    match cli.command {
        Command::Import(args) => run_import(args, &context).await?,
        Command::Find(args) => run_find(args, &context).await?,
        Command::Test => run_test(&context).await?,
    }

    Ok(())
}
