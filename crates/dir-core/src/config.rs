//! Configuration management.
//!
//! Configuration is read from a TOML file and then overridden from
//! environment variables (a `.env` file is honoured when present). It is
//! loaded once at startup and treated as read-only afterwards.
//!
//! ```toml
//! default_domain = "corp"
//!
//! [logging]
//! enabled = true
//! level = "info"
//!
//! [domains.corp]
//! locate_users_by = "userprincipalname"
//! password_column = false
//!
//! [domains.corp.connection]
//! url = "ldaps://dc01.corp.example.com:636"
//! base_dn = "dc=corp,dc=example,dc=com"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Name of the domain used when none is configured explicitly.
pub const DEFAULT_DOMAIN: &str = "default";

/// Prefix of every environment variable read by [`Config::apply_env`].
pub const ENV_PREFIX: &str = "DIRSYNC_";

// ============================================================================
// Top-level configuration
// ============================================================================

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Domain used when a caller does not name one.
    #[serde(default = "default_domain_name")]
    pub default_domain: String,

    /// Event logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Local account database (absent when accounts are not stored locally).
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Per-domain synchronization configuration keyed by domain name.
    #[serde(default)]
    pub domains: BTreeMap<String, DomainConfig>,
}

fn default_domain_name() -> String {
    DEFAULT_DOMAIN.to_string()
}

impl Default for Config {
    fn default() -> Self {
        let mut domains = BTreeMap::new();
        domains.insert(DEFAULT_DOMAIN.to_string(), DomainConfig::default());
        Self {
            default_domain: default_domain_name(),
            logging: LoggingConfig::default(),
            database: None,
            domains,
        }
    }
}

impl Config {
    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid TOML for this schema.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Loads configuration from a file, applies environment overrides and
    /// validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration is inconsistent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            domains = config.domains.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Applies overrides looked up through `lookup`.
    ///
    /// Recognized keys: `DIRSYNC_DEFAULT_DOMAIN`, `DIRSYNC_LOG_ENABLED`,
    /// `DIRSYNC_LOG_LEVEL`, `DIRSYNC_DATABASE_URL` and, per domain,
    /// `DIRSYNC_<DOMAIN>_BIND_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns an error if an override has an unparseable value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(domain) = lookup(&format!("{ENV_PREFIX}DEFAULT_DOMAIN")) {
            self.default_domain = domain;
        }

        if let Some(enabled) = lookup(&format!("{ENV_PREFIX}LOG_ENABLED")) {
            self.logging.enabled = enabled.parse().map_err(|_| {
                Error::config(format!("{ENV_PREFIX}LOG_ENABLED must be true or false"))
            })?;
        }

        if let Some(level) = lookup(&format!("{ENV_PREFIX}LOG_LEVEL")) {
            self.logging.level = level.parse()?;
        }

        if let Some(url) = lookup(&format!("{ENV_PREFIX}DATABASE_URL")) {
            match &mut self.database {
                Some(database) => database.url = url,
                None => self.database = Some(DatabaseConfig::new(url)),
            }
        }

        for (name, domain) in &mut self.domains {
            let key = format!(
                "{ENV_PREFIX}{}_BIND_PASSWORD",
                name.to_uppercase().replace('-', "_")
            );
            if let Some(password) = lookup(&key) {
                domain.connection.password = Some(password);
            }
        }

        Ok(())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the default domain is not configured or a domain
    /// has empty required keys.
    pub fn validate(&self) -> Result<()> {
        if !self.domains.contains_key(&self.default_domain) {
            return Err(Error::UnknownDomain(self.default_domain.clone()));
        }

        for (name, domain) in &self.domains {
            domain
                .validate()
                .map_err(|e| Error::config(format!("domain '{name}': {e}")))?;
        }

        Ok(())
    }

    /// Returns the configuration of a named domain.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDomain` if the domain is not configured.
    pub fn domain(&self, name: &str) -> Result<&DomainConfig> {
        self.domains
            .get(name)
            .ok_or_else(|| Error::UnknownDomain(name.to_string()))
    }

    /// Returns the configuration of the default domain.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDomain` if the default domain is not configured.
    pub fn default_domain_config(&self) -> Result<&DomainConfig> {
        self.domain(&self.default_domain)
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Severity used when rendering lifecycle events to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warn level.
    Warn,
    /// Error level.
    Error,
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(Error::config(format!("unknown log level '{other}'"))),
        }
    }
}

/// Event logging configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether lifecycle events are written to the log.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Severity of the emitted log lines.
    #[serde(default)]
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::Info,
        }
    }
}

const fn default_true() -> bool {
    true
}

// ============================================================================
// Database
// ============================================================================

/// Local account database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_min_connections() -> u32 {
    1
}

impl DatabaseConfig {
    /// Creates a database configuration with default pool sizes.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

// ============================================================================
// Domain configuration
// ============================================================================

/// Where authenticated users end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderMode {
    /// Directory users are imported into the local account store.
    #[default]
    Database,
    /// Directory users are used as-is; nothing is stored locally.
    NoDatabase,
}

impl ProviderMode {
    /// Returns true when accounts are stored locally.
    #[must_use]
    pub const fn uses_database(&self) -> bool {
        matches!(self, Self::Database)
    }
}

/// Directory connection settings for one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server URL (`ldap://` or `ldaps://`).
    #[serde(default = "default_connection_url")]
    pub url: String,

    /// Base DN that user searches start from.
    #[serde(default)]
    pub base_dn: String,

    /// Service account DN used for searches.
    #[serde(default)]
    pub bind_dn: Option<String>,

    /// Service account password.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Connection timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Whether to upgrade plain connections with STARTTLS.
    #[serde(default)]
    pub starttls: bool,

    /// Whether to verify server certificates.
    #[serde(default = "default_true")]
    pub validate_certificates: bool,

    /// Filter every user search is restricted to.
    #[serde(default = "default_user_filter")]
    pub user_filter: String,

    /// Maximum entries a search may return, `0` for no cap. Listings that
    /// exceed the cap fail instead of being truncated.
    #[serde(default)]
    pub max_results: usize,

    /// Entries requested per page when listing users.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_connection_url() -> String {
    "ldap://localhost:389".to_string()
}

const fn default_timeout_secs() -> u64 {
    5
}

const fn default_page_size() -> u32 {
    500
}

fn default_user_filter() -> String {
    "(objectClass=person)".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_connection_url(),
            base_dn: String::new(),
            bind_dn: None,
            password: None,
            timeout_secs: default_timeout_secs(),
            starttls: false,
            validate_certificates: true,
            user_filter: default_user_filter(),
            max_results: 0,
            page_size: default_page_size(),
        }
    }
}

/// Local column names used to match and tag imported accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseColumns {
    /// Column holding the username (also the credential lookup key).
    #[serde(default = "default_username_column")]
    pub username_column: String,

    /// Column holding the stored directory identifier.
    #[serde(default = "default_guid_column")]
    pub guid_column: String,

    /// Column holding the domain tag.
    #[serde(default = "default_domain_column")]
    pub domain_column: String,
}

fn default_username_column() -> String {
    "email".to_string()
}

fn default_guid_column() -> String {
    "objectguid".to_string()
}

fn default_domain_column() -> String {
    "domain".to_string()
}

impl Default for DatabaseColumns {
    fn default() -> Self {
        Self {
            username_column: default_username_column(),
            guid_column: default_guid_column(),
            domain_column: default_domain_column(),
        }
    }
}

/// Windows (SSO header) identification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowsConfig {
    /// Directory attribute matched against the SSO-supplied username.
    #[serde(default = "default_windows_locate")]
    pub locate_users_by: String,

    /// Server variable carrying the authenticated identity.
    #[serde(default = "default_server_key")]
    pub server_key: String,
}

fn default_windows_locate() -> String {
    "samaccountname".to_string()
}

fn default_server_key() -> String {
    "AUTH_USER".to_string()
}

impl Default for WindowsConfig {
    fn default() -> Self {
        Self {
            locate_users_by: default_windows_locate(),
            server_key: default_server_key(),
        }
    }
}

/// Synchronization configuration for a single domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Whether accounts are stored locally.
    #[serde(default)]
    pub provider: ProviderMode,

    /// Directory connection.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Directory attribute holding the unique identifier.
    #[serde(default = "default_guid_attribute")]
    pub guid_attribute: String,

    /// Directory attribute used to locate users.
    #[serde(default = "default_locate_users_by")]
    pub locate_users_by: String,

    /// Directory attribute (or `dn`) submitted when binding users.
    #[serde(default = "default_bind_users_by")]
    pub bind_users_by: String,

    /// Local column names.
    #[serde(default)]
    pub database: DatabaseColumns,

    /// Local field to directory attribute, handler name or literal value.
    #[serde(default = "default_sync_attributes")]
    pub sync_attributes: BTreeMap<String, serde_json::Value>,

    /// Local credential column, `false` when credentials are not stored.
    #[serde(
        default = "default_password_column",
        deserialize_with = "deserialize_password_column"
    )]
    pub password_column: Option<String>,

    /// Whether the submitted secret is synchronized into the local column.
    #[serde(default)]
    pub sync_passwords: bool,

    /// Whether local credentials are tried when the directory has no match.
    #[serde(default)]
    pub login_fallback: bool,

    /// Validation rule names, evaluated in order.
    #[serde(default = "default_rules")]
    pub rules: Vec<String>,

    /// Query scope names, applied in order.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Windows identification settings.
    #[serde(default)]
    pub windows: WindowsConfig,
}

fn default_guid_attribute() -> String {
    "objectguid".to_string()
}

fn default_locate_users_by() -> String {
    "userprincipalname".to_string()
}

fn default_bind_users_by() -> String {
    "distinguishedname".to_string()
}

fn default_sync_attributes() -> BTreeMap<String, serde_json::Value> {
    let mut attributes = BTreeMap::new();
    attributes.insert(
        "email".to_string(),
        serde_json::Value::String("userprincipalname".to_string()),
    );
    attributes.insert(
        "name".to_string(),
        serde_json::Value::String("cn".to_string()),
    );
    attributes
}

#[allow(clippy::unnecessary_wraps)]
fn default_password_column() -> Option<String> {
    Some("password".to_string())
}

fn default_rules() -> Vec<String> {
    vec!["deny_trashed".to_string()]
}

/// Accepts either a column name or `false`.
fn deserialize_password_column<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Column {
        Name(String),
        Flag(bool),
    }

    match Column::deserialize(deserializer)? {
        Column::Name(name) if !name.is_empty() => Ok(Some(name)),
        Column::Name(_) | Column::Flag(false) => Ok(None),
        Column::Flag(true) => Err(serde::de::Error::custom(
            "password_column must be a column name or false",
        )),
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            provider: ProviderMode::default(),
            connection: ConnectionConfig::default(),
            guid_attribute: default_guid_attribute(),
            locate_users_by: default_locate_users_by(),
            bind_users_by: default_bind_users_by(),
            database: DatabaseColumns::default(),
            sync_attributes: default_sync_attributes(),
            password_column: default_password_column(),
            sync_passwords: false,
            login_fallback: false,
            rules: default_rules(),
            scopes: Vec::new(),
            windows: WindowsConfig::default(),
        }
    }
}

impl DomainConfig {
    /// Validates required keys.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first empty required key.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("guid_attribute", &self.guid_attribute),
            ("locate_users_by", &self.locate_users_by),
            ("bind_users_by", &self.bind_users_by),
            ("database.username_column", &self.database.username_column),
            ("database.guid_column", &self.database.guid_column),
            ("database.domain_column", &self.database.domain_column),
            ("connection.url", &self.connection.url),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::config(format!("{key} cannot be empty")));
            }
        }

        Ok(())
    }

    /// Returns the key under which submitted credentials carry the username.
    ///
    /// The directory attribute is used when nothing is stored locally,
    /// otherwise the local username column.
    #[must_use]
    pub fn credential_key(&self) -> &str {
        if self.provider.uses_database() {
            &self.database.username_column
        } else {
            &self.locate_users_by
        }
    }
}
