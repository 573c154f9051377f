//! CLI configuration.

use std::path::{Path, PathBuf};

use dir_core::{Config, DomainConfig};
use serde::{Deserialize, Serialize};

use crate::{CliError, CliResult};

/// File name looked up in the user configuration directory.
const CONFIG_FILE: &str = "dirsync.toml";

/// Loaded configuration together with the file it came from.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// File the configuration was read from.
    pub path: PathBuf,
    /// Parsed, environment-overridden and validated settings.
    pub settings: Config,
}

impl CliConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if no path can be determined, or if the file cannot
    /// be read, parsed or validated.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            return Err(CliError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let settings = Config::load(&path)?;
        Ok(Self { path, settings })
    }

    /// Gets the default configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration directory cannot be determined.
    pub fn default_path() -> CliResult<PathBuf> {
        let dir = dirs_next::config_dir().ok_or_else(|| {
            CliError::Config("could not determine configuration directory".to_string())
        })?;
        Ok(dir.join("dirsync").join(CONFIG_FILE))
    }

    /// Gets the effective domain (from args or config).
    #[must_use]
    pub fn effective_domain(&self, arg_domain: Option<&str>) -> String {
        arg_domain.map_or_else(|| self.settings.default_domain.clone(), ToString::to_string)
    }

    /// Returns the settings of a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain is not configured.
    pub fn domain(&self, name: &str) -> CliResult<&DomainConfig> {
        Ok(self.settings.domain(name)?)
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}
