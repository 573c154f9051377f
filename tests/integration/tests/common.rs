//! Common test utilities and fixtures.

use std::sync::Arc;

use dir_auth::{PasswordHasherService, PasswordPolicy};
use dir_core::DomainConfig;
use dir_federation::{
    AuthenticationPipeline, ImportOrder, MemoryDirectory, MemoryEventSink, PipelineBuilder,
};
use dir_model::{AccountSchema, Credentials, DirectoryEntry};
use dir_storage::MemoryAccountStore;
use serde_json::Value;

/// Domain tag carried by every fixture entry.
pub const DOMAIN: &str = "corp";

/// Secret accepted for every fixture entry.
pub const SECRET: &str = "correct horse";

/// Hasher with minimal cost so tests stay fast.
pub fn fast_hasher() -> PasswordHasherService {
    PasswordHasherService::new(PasswordPolicy::new().memory_cost(1024).time_cost(1))
}

/// Domain configuration locating users by `mail` and mapping `cn` and `mail`.
pub fn config() -> DomainConfig {
    DomainConfig {
        locate_users_by: "mail".to_string(),
        sync_attributes: [
            ("name".to_string(), Value::from("cn")),
            ("email".to_string(), Value::from("mail")),
        ]
        .into_iter()
        .collect(),
        ..DomainConfig::default()
    }
}

/// Builds a directory entry.
pub fn person(cn: &str, guid: &str, mail: &str) -> DirectoryEntry {
    let account_name = cn.to_lowercase();
    DirectoryEntry::new(format!("cn={cn},ou=people,dc=corp"), guid)
        .with_attribute("cn", [cn])
        .with_attribute("mail", [mail])
        .with_attribute("samaccountname", [account_name.as_str()])
}

/// Credentials for a login with the configured username key.
pub fn login(mail: &str, secret: &str) -> Credentials {
    Credentials::new().with("email", mail).with_password(secret)
}

/// Directory, store and event recorder wired together.
pub struct TestEnv {
    /// In-memory directory.
    pub directory: Arc<MemoryDirectory>,
    /// In-memory account store.
    pub store: Arc<MemoryAccountStore>,
    /// Recorded events.
    pub events: Arc<MemoryEventSink>,
}

impl TestEnv {
    /// Creates an environment holding Alice (`G-1`) and Bob (`G-2`).
    pub fn new() -> Self {
        let directory = Arc::new(MemoryDirectory::with_domain(DOMAIN));
        let env = Self {
            directory,
            store: Arc::new(MemoryAccountStore::new(AccountSchema::from_config(&config()))),
            events: Arc::new(MemoryEventSink::new()),
        };
        env.add(person("Alice", "G-1", "a@b.com"));
        env.add(person("Bob", "G-2", "bob@b.com"));
        env
    }

    /// Adds an entry that accepts [`SECRET`].
    pub fn add(&self, entry: DirectoryEntry) {
        self.directory.set_secret(entry.dn(), SECRET);
        self.directory.insert(entry);
    }

    /// Returns a builder wired to this environment.
    pub fn builder(&self, config: DomainConfig) -> PipelineBuilder {
        AuthenticationPipeline::builder(config)
            .default_domain(DOMAIN)
            .directory(self.directory.clone())
            .store(self.store.clone())
            .events(self.events.clone())
            .hasher(fast_hasher())
    }

    /// Builds a pipeline with the given configuration and import order.
    pub fn pipeline(&self, config: DomainConfig, order: ImportOrder) -> AuthenticationPipeline {
        self.builder(config).order(order).build().unwrap()
    }
}
