//! Attribute hydrators.
//!
//! Hydrators copy values from a directory entry onto a local account. The
//! importer runs them in a fixed order: identifier, domain, attribute map,
//! password, then any custom hydrators.

use std::collections::BTreeMap;
use std::sync::Arc;

use dir_core::DomainConfig;
use dir_model::{AccountSchema, DirectoryEntry, LocalAccount};
use serde_json::Value;

use crate::error::FederationResult;
use crate::password::PasswordSynchronizer;

// ============================================================================
// Custom attribute handlers
// ============================================================================

/// Custom logic invoked for an attribute-map value that names it.
pub trait AttributeHandler: Send + Sync {
    /// Populates the account from the entry.
    fn handle(&self, entry: &DirectoryEntry, account: &mut LocalAccount) -> FederationResult<()>;
}

/// Named attribute handlers, assembled at startup.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, Arc<dyn AttributeHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, handler: Arc<dyn AttributeHandler>) -> Self {
        self.register(name, handler);
        self
    }

    /// Registers a handler, replacing any handler of the same name.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn AttributeHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Gets a handler by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn AttributeHandler>> {
        self.handlers.get(name)
    }
}

// ============================================================================
// Hydrators
// ============================================================================

/// Everything a hydrator may read besides the entry and the account.
pub struct HydrationContext<'a> {
    /// Domain configuration.
    pub config: &'a DomainConfig,
    /// Local column names.
    pub schema: &'a AccountSchema,
    /// Domain tag used when the entry carries none.
    pub default_domain: &'a str,
    /// Secret supplied by the caller, if any.
    pub secret: Option<&'a str>,
    /// Registered attribute handlers.
    pub handlers: &'a HandlerRegistry,
    /// Credential synchronizer.
    pub passwords: &'a PasswordSynchronizer,
}

/// A step of the hydration pipeline.
pub trait Hydrator: Send + Sync {
    /// Mutates the account from the entry.
    fn hydrate(
        &self,
        entry: &DirectoryEntry,
        account: &mut LocalAccount,
        ctx: &HydrationContext<'_>,
    ) -> FederationResult<()>;
}

/// Copies the unique identifier onto the identifier column.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuidHydrator;

impl Hydrator for GuidHydrator {
    fn hydrate(
        &self,
        entry: &DirectoryEntry,
        account: &mut LocalAccount,
        ctx: &HydrationContext<'_>,
    ) -> FederationResult<()> {
        account.set(ctx.schema.guid_column.clone(), entry.guid());
        Ok(())
    }
}

/// Copies the domain tag onto the domain column.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainHydrator;

impl Hydrator for DomainHydrator {
    fn hydrate(
        &self,
        entry: &DirectoryEntry,
        account: &mut LocalAccount,
        ctx: &HydrationContext<'_>,
    ) -> FederationResult<()> {
        let domain = entry.domain().unwrap_or(ctx.default_domain);
        account.set(ctx.schema.domain_column.clone(), domain);
        Ok(())
    }
}

/// Applies the configured attribute map.
///
/// A string value naming a registered handler invokes the handler, any other
/// string copies the first value of that attribute (or null), and non-string
/// values are stored verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeHydrator;

impl Hydrator for AttributeHydrator {
    fn hydrate(
        &self,
        entry: &DirectoryEntry,
        account: &mut LocalAccount,
        ctx: &HydrationContext<'_>,
    ) -> FederationResult<()> {
        for (field, mapping) in &ctx.config.sync_attributes {
            match mapping {
                Value::String(name) => {
                    if let Some(handler) = ctx.handlers.get(name) {
                        handler.handle(entry, account)?;
                    } else {
                        let value = entry
                            .first(name)
                            .map_or(Value::Null, |v| Value::String(v.to_string()));
                        account.set(field.clone(), value);
                    }
                }
                literal => account.set(field.clone(), literal.clone()),
            }
        }
        Ok(())
    }
}

/// Runs the credential synchronizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordHydrator;

impl Hydrator for PasswordHydrator {
    fn hydrate(
        &self,
        _entry: &DirectoryEntry,
        account: &mut LocalAccount,
        ctx: &HydrationContext<'_>,
    ) -> FederationResult<()> {
        ctx.passwords.run(account, ctx.secret)?;
        Ok(())
    }
}

/// The fixed hydrator sequence followed by custom hydrators.
#[derive(Clone, Default)]
pub struct HydratorPipeline {
    custom: Vec<Arc<dyn Hydrator>>,
}

impl HydratorPipeline {
    /// Creates the built-in pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a custom hydrator, run after the built-in ones.
    #[must_use]
    pub fn with(mut self, hydrator: Arc<dyn Hydrator>) -> Self {
        self.custom.push(hydrator);
        self
    }

    /// Runs every hydrator in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first hydrator error.
    pub fn run(
        &self,
        entry: &DirectoryEntry,
        account: &mut LocalAccount,
        ctx: &HydrationContext<'_>,
    ) -> FederationResult<()> {
        GuidHydrator.hydrate(entry, account, ctx)?;
        DomainHydrator.hydrate(entry, account, ctx)?;
        AttributeHydrator.hydrate(entry, account, ctx)?;
        PasswordHydrator.hydrate(entry, account, ctx)?;

        for hydrator in &self.custom {
            hydrator.hydrate(entry, account, ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FederationError;
    use dir_auth::{PasswordHasherService, PasswordPolicy};

    struct DisplayName;

    impl AttributeHandler for DisplayName {
        fn handle(&self, entry: &DirectoryEntry, account: &mut LocalAccount) -> FederationResult<()> {
            let given = entry.first("givenname").unwrap_or_default();
            let surname = entry.first("sn").unwrap_or_default();
            account.set("display_name", format!("{given} {surname}"));
            Ok(())
        }
    }

    struct Failing;

    impl AttributeHandler for Failing {
        fn handle(&self, _: &DirectoryEntry, _: &mut LocalAccount) -> FederationResult<()> {
            Err(FederationError::handler("failing", "boom"))
        }
    }

    struct Flag;

    impl Hydrator for Flag {
        fn hydrate(
            &self,
            _: &DirectoryEntry,
            account: &mut LocalAccount,
            _: &HydrationContext<'_>,
        ) -> FederationResult<()> {
            account.set("flagged", true);
            Ok(())
        }
    }

    fn entry() -> DirectoryEntry {
        DirectoryEntry::new("cn=Alice,dc=corp", "G-1")
            .with_attribute("cn", ["Alice"])
            .with_attribute("mail", ["a@b.com"])
            .with_attribute("givenName", ["Alice"])
            .with_attribute("sn", ["Smith"])
    }

    fn config() -> DomainConfig {
        let mut config = DomainConfig::default();
        config.sync_attributes = BTreeMap::from([
            ("name".to_string(), Value::from("cn")),
            ("email".to_string(), Value::from("mail")),
            ("phone".to_string(), Value::from("telephonenumber")),
            ("display".to_string(), Value::from("display-name")),
            ("is_admin".to_string(), Value::Bool(false)),
        ]);
        config
    }

    fn hydrate(
        config: &DomainConfig,
        handlers: &HandlerRegistry,
        pipeline: &HydratorPipeline,
        entry: &DirectoryEntry,
    ) -> FederationResult<LocalAccount> {
        let schema = AccountSchema::from_config(config);
        let passwords = PasswordSynchronizer::new(
            config,
            PasswordHasherService::new(PasswordPolicy::new().memory_cost(1024).time_cost(1)),
        );
        let ctx = HydrationContext {
            config,
            schema: &schema,
            default_domain: "default",
            secret: None,
            handlers,
            passwords: &passwords,
        };
        let mut account = LocalAccount::new();
        pipeline.run(entry, &mut account, &ctx)?;
        Ok(account)
    }

    #[test]
    fn built_in_hydrators() {
        let handlers = HandlerRegistry::new().with("display-name", Arc::new(DisplayName));
        let account = hydrate(&config(), &handlers, &HydratorPipeline::new(), &entry()).unwrap();

        assert_eq!(account.get_str("objectguid"), Some("G-1"));
        assert_eq!(account.get_str("domain"), Some("default"));
        assert_eq!(account.get_str("name"), Some("Alice"));
        assert_eq!(account.get_str("email"), Some("a@b.com"));
        assert_eq!(account.get("phone"), Some(&Value::Null));
        assert_eq!(account.get("is_admin"), Some(&Value::Bool(false)));
        assert_eq!(account.get_str("display_name"), Some("Alice Smith"));
        assert!(account.get("display").is_none());
        assert!(account.get_str("password").is_some());
    }

    #[test]
    fn entry_domain_wins_over_default() {
        let entry = entry().with_domain("corp");
        let account = hydrate(
            &config(),
            &HandlerRegistry::new(),
            &HydratorPipeline::new(),
            &entry,
        )
        .unwrap();
        assert_eq!(account.get_str("domain"), Some("corp"));
    }

    #[test]
    fn unregistered_handler_name_is_an_attribute() {
        let account = hydrate(
            &config(),
            &HandlerRegistry::new(),
            &HydratorPipeline::new(),
            &entry(),
        )
        .unwrap();
        assert_eq!(account.get("display"), Some(&Value::Null));
    }

    #[test]
    fn handler_failure_aborts() {
        let mut config = config();
        config
            .sync_attributes
            .insert("broken".to_string(), Value::from("failing"));
        let handlers = HandlerRegistry::new().with("failing", Arc::new(Failing));

        let err = hydrate(&config, &handlers, &HydratorPipeline::new(), &entry())
            .err()
            .unwrap();
        assert!(matches!(err, FederationError::Handler { .. }));
    }

    #[test]
    fn custom_hydrators_run_last() {
        let pipeline = HydratorPipeline::new().with(Arc::new(Flag));
        let account = hydrate(&config(), &HandlerRegistry::new(), &pipeline, &entry()).unwrap();
        assert_eq!(account.get("flagged"), Some(&Value::Bool(true)));
    }
}
