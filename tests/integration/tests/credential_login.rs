//! Credential login scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dir_core::ProviderMode;
use dir_federation::{
    AttributeHandler, AuthOutcome, AuthSource, CredentialMutator, EventKind, FederationError,
    FederationResult, HandlerRegistry, ImportOrder, Rule, RuleRegistry,
};
use dir_model::{AccountSchema, DirectoryEntry, LocalAccount};
use dir_storage::{
    AccountSearchCriteria, AccountStore, ImportScope, MemoryAccountStore, StorageError, StorageResult,
};
use serde_json::Value;
use uuid::Uuid;

use crate::common::{config, fast_hasher, login, person, TestEnv, SECRET};

#[tokio::test]
async fn first_login_imports_mapped_account() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let pipeline = env.pipeline(config(), ImportOrder::ValidateFirst);

    let outcome = pipeline.attempt(&login("a@b.com", SECRET)).await?;

    let user = outcome.into_user().expect("login should succeed");
    assert_eq!(user.source, AuthSource::Directory);
    let account = user.account.expect("account should be imported");
    assert!(account.exists());
    assert_eq!(account.get_str("name"), Some("Alice"));
    assert_eq!(account.get_str("email"), Some("a@b.com"));
    assert_eq!(account.get_str("objectguid"), Some("G-1"));
    assert_eq!(account.get_str("domain"), Some("corp"));

    let stored = account.get_str("password").expect("credential is stored");
    assert!(stored.starts_with("$argon2"));
    assert!(!fast_hasher().matches(SECRET, stored));
    assert_eq!(env.store.len(), 1);

    Ok(())
}

#[tokio::test]
async fn second_login_updates_the_same_row() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let pipeline = env.pipeline(config(), ImportOrder::ValidateFirst);

    let first = pipeline
        .attempt(&login("a@b.com", SECRET))
        .await?
        .into_user()
        .and_then(|user| user.account)
        .expect("first login imports");
    env.events.clear();

    let second = pipeline
        .attempt(&login("a@b.com", SECRET))
        .await?
        .into_user()
        .and_then(|user| user.account)
        .expect("second login succeeds");

    assert_eq!(first.id, second.id);
    assert_eq!(env.store.len(), 1);
    assert_eq!(first.get_str("password"), second.get_str("password"));
    assert_eq!(env.events.count(EventKind::Importing), 0);
    assert_eq!(env.events.count(EventKind::Synchronizing), 1);
    assert_eq!(env.events.count(EventKind::Synchronized), 1);

    Ok(())
}

#[tokio::test]
async fn synchronized_secret_follows_directory_changes() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let domain = dir_core::DomainConfig {
        sync_passwords: true,
        ..config()
    };
    let pipeline = env.pipeline(domain, ImportOrder::ValidateFirst);
    let hasher = fast_hasher();

    let account = pipeline
        .attempt(&login("a@b.com", SECRET))
        .await?
        .into_user()
        .and_then(|user| user.account)
        .expect("login succeeds");
    let first_hash = account.get_str("password").unwrap_or_default().to_string();
    assert!(hasher.matches(SECRET, &first_hash));

    env.directory.set_secret("cn=Alice,ou=people,dc=corp", "battery staple");
    let account = pipeline
        .attempt(&login("a@b.com", "battery staple"))
        .await?
        .into_user()
        .and_then(|user| user.account)
        .expect("login with the new secret succeeds");

    let second_hash = account.get_str("password").unwrap_or_default();
    assert_ne!(first_hash, second_hash);
    assert!(hasher.matches("battery staple", second_hash));

    Ok(())
}

#[tokio::test]
async fn wrong_secret_is_rejected_without_import() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let pipeline = env.pipeline(config(), ImportOrder::ValidateFirst);

    let outcome = pipeline.attempt(&login("a@b.com", "wrong")).await?;

    assert_eq!(outcome, AuthOutcome::InvalidCredentials);
    assert!(env.store.is_empty());
    assert_eq!(env.events.count(EventKind::AuthenticationFailed), 1);
    assert_eq!(env.events.count(EventKind::Importing), 0);

    Ok(())
}

#[tokio::test]
async fn missing_username_key_is_a_configuration_error() {
    let env = TestEnv::new();
    let pipeline = env.pipeline(config(), ImportOrder::ValidateFirst);
    let credentials = dir_model::Credentials::new()
        .with("username", "a@b.com")
        .with_password(SECRET);

    let err = pipeline.attempt(&credentials).await.unwrap_err();

    assert!(err.is_configuration_error());
    assert!(env.events.events().is_empty());
}

#[tokio::test]
async fn blank_lookup_attribute_is_never_saved() {
    let env = TestEnv::new();
    let pipeline = env.pipeline(config(), ImportOrder::ValidateFirst);
    let importer = pipeline.importer().expect("accounts are stored locally");
    let entry = person("Ghost", "G-9", " ");

    let err = importer.import(&entry, None).await.unwrap_err();

    assert!(matches!(err, FederationError::MissingAttribute { ref attribute, .. } if attribute == "mail"));
    assert!(env.store.is_empty());
    assert!(env.events.events().is_empty());
}

#[tokio::test]
async fn existing_account_with_same_identifier_is_reused() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut existing = LocalAccount::new()
        .with_field("objectguid", "G-1")
        .with_field("email", "old@b.com")
        .with_field("name", "Old Name");
    env.store.save(&mut existing).await?;

    let pipeline = env.pipeline(config(), ImportOrder::ValidateFirst);
    let account = pipeline
        .attempt(&login("a@b.com", SECRET))
        .await?
        .into_user()
        .and_then(|user| user.account)
        .expect("login succeeds");

    assert_eq!(account.id, existing.id);
    assert_eq!(account.get_str("email"), Some("a@b.com"));
    assert_eq!(account.get_str("name"), Some("Alice"));
    assert_eq!(env.store.len(), 1);

    Ok(())
}

/// Rejects users outside the `b.com` mail domain.
struct MailDomain;

impl Rule for MailDomain {
    fn name(&self) -> &str {
        "mail_domain"
    }

    fn passes(&self, entry: &DirectoryEntry, _account: Option<&LocalAccount>) -> bool {
        entry.first("mail").is_some_and(|mail| mail.ends_with("@b.com"))
    }
}

#[tokio::test]
async fn registered_rules_run_in_configured_order() -> anyhow::Result<()> {
    let env = TestEnv::new();
    env.add(person("Mallory", "G-3", "mallory@evil.com"));
    let domain = dir_core::DomainConfig {
        rules: vec!["deny_trashed".to_string(), "mail_domain".to_string()],
        ..config()
    };
    let pipeline = env
        .builder(domain)
        .rules(RuleRegistry::builtin().with("mail_domain", Arc::new(MailDomain)))
        .build()?;

    assert!(pipeline.attempt(&login("a@b.com", SECRET)).await?.is_success());

    let outcome = pipeline.attempt(&login("mallory@evil.com", SECRET)).await?;
    assert_eq!(outcome, AuthOutcome::Rejected);
    assert_eq!(env.events.count(EventKind::AuthenticationRejected), 1);
    assert_eq!(env.store.len(), 1);

    Ok(())
}

#[tokio::test]
async fn unknown_rule_name_fails_at_startup() {
    let env = TestEnv::new();
    let domain = dir_core::DomainConfig {
        rules: vec!["mail_domain".to_string()],
        ..config()
    };

    let err = env.builder(domain).build().err().expect("unknown rule");
    assert!(err.is_configuration_error());
}

#[tokio::test]
async fn only_imported_depends_on_import_order() -> anyhow::Result<()> {
    let domain = dir_core::DomainConfig {
        rules: vec!["only_imported".to_string()],
        ..config()
    };

    let env = TestEnv::new();
    let validate_first = env.pipeline(domain.clone(), ImportOrder::ValidateFirst);
    assert_eq!(
        validate_first.attempt(&login("a@b.com", SECRET)).await?,
        AuthOutcome::Rejected
    );
    assert!(env.store.is_empty());

    let mut existing = LocalAccount::new()
        .with_field("objectguid", "G-1")
        .with_field("email", "a@b.com");
    env.store.save(&mut existing).await?;
    assert!(validate_first.attempt(&login("a@b.com", SECRET)).await?.is_success());

    Ok(())
}

/// Stores the upper-cased common name in `display_name`.
struct UpperName;

impl AttributeHandler for UpperName {
    fn handle(&self, entry: &DirectoryEntry, account: &mut LocalAccount) -> FederationResult<()> {
        let cn = entry.first("cn").unwrap_or_default();
        account.set("display_name", cn.to_uppercase());
        Ok(())
    }
}

#[tokio::test]
async fn attribute_map_invokes_handlers_and_literals() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut domain = config();
    domain
        .sync_attributes
        .insert("display_name".to_string(), Value::from("upper_name"));
    domain
        .sync_attributes
        .insert("active".to_string(), Value::Bool(true));
    let pipeline = env
        .builder(domain)
        .handlers(HandlerRegistry::new().with("upper_name", Arc::new(UpperName)))
        .build()?;

    let account = pipeline
        .attempt(&login("a@b.com", SECRET))
        .await?
        .into_user()
        .and_then(|user| user.account)
        .expect("login succeeds");

    assert_eq!(account.get_str("display_name"), Some("ALICE"));
    assert_eq!(account.get("active"), Some(&Value::Bool(true)));

    Ok(())
}

/// Stores credentials with a visible prefix.
struct PrefixMutator;

impl CredentialMutator for PrefixMutator {
    fn set_credential(&self, plaintext: &str) -> FederationResult<String> {
        Ok(format!("custom:{plaintext}"))
    }
}

#[tokio::test]
async fn credential_mutator_replaces_hashing() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let domain = dir_core::DomainConfig {
        sync_passwords: true,
        ..config()
    };
    let pipeline = env
        .builder(domain)
        .mutator(Arc::new(PrefixMutator))
        .build()?;

    let account = pipeline
        .attempt(&login("a@b.com", SECRET))
        .await?
        .into_user()
        .and_then(|user| user.account)
        .expect("login succeeds");

    assert_eq!(
        account.get_str("password"),
        Some(format!("custom:{SECRET}").as_str())
    );

    Ok(())
}

#[tokio::test]
async fn no_database_mode_authenticates_without_storing() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let domain = dir_core::DomainConfig {
        provider: ProviderMode::NoDatabase,
        ..config()
    };
    let pipeline = env.pipeline(domain, ImportOrder::ValidateFirst);
    let credentials = dir_model::Credentials::new()
        .with("mail", "a@b.com")
        .with_password(SECRET);

    let user = pipeline
        .attempt(&credentials)
        .await?
        .into_user()
        .expect("login succeeds");

    assert!(user.account.is_none());
    assert_eq!(user.entry.map(|entry| entry.guid().to_string()), Some("G-1".to_string()));
    assert!(env.store.is_empty());

    Ok(())
}

#[tokio::test]
async fn login_fallback_uses_local_credentials() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let hash = fast_hasher().hash("local secret")?;
    let mut local = LocalAccount::new()
        .with_field("email", "local@b.com")
        .with_field("password", hash);
    env.store.save(&mut local).await?;

    let domain = dir_core::DomainConfig {
        login_fallback: true,
        ..config()
    };
    let pipeline = env.pipeline(domain, ImportOrder::ValidateFirst);

    let user = pipeline
        .attempt(&login("local@b.com", "local secret"))
        .await?
        .into_user()
        .expect("fallback login succeeds");
    assert_eq!(user.source, AuthSource::LocalFallback);
    assert_eq!(user.account.map(|account| account.id), Some(local.id));

    assert_eq!(
        pipeline.attempt(&login("local@b.com", "wrong")).await?,
        AuthOutcome::InvalidCredentials
    );

    Ok(())
}

#[tokio::test]
async fn directory_outage_is_propagated() {
    let env = TestEnv::new();
    let pipeline = env.pipeline(config(), ImportOrder::ValidateFirst);
    env.directory.set_unavailable(true);

    let err = pipeline.attempt(&login("a@b.com", SECRET)).await.unwrap_err();

    assert!(err.is_connection_error());
    assert!(env.store.is_empty());
}

/// Store that yields after every import lookup, so concurrent logins both
/// see the account as missing before either of them saves.
struct YieldingStore {
    inner: MemoryAccountStore,
    conflicts: AtomicUsize,
}

#[async_trait]
impl AccountStore for YieldingStore {
    fn schema(&self) -> &AccountSchema {
        self.inner.schema()
    }

    async fn find_for_import(&self, scope: &ImportScope) -> StorageResult<Option<LocalAccount>> {
        let found = self.inner.find_for_import(scope).await;
        tokio::task::yield_now().await;
        found
    }

    async fn get_by_id(&self, id: Uuid) -> StorageResult<Option<LocalAccount>> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_username(
        &self,
        username: &str,
        with_trashed: bool,
    ) -> StorageResult<Option<LocalAccount>> {
        self.inner.get_by_username(username, with_trashed).await
    }

    async fn save(&self, account: &mut LocalAccount) -> StorageResult<()> {
        let result = self.inner.save(account).await;
        if result.as_ref().is_err_and(StorageError::is_duplicate) {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
        }
        result
    }

    async fn search(&self, criteria: &AccountSearchCriteria) -> StorageResult<Vec<LocalAccount>> {
        self.inner.search(criteria).await
    }
}

#[tokio::test]
async fn concurrent_first_logins_create_one_row() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let schema = AccountSchema::from_config(&config());
    let store = Arc::new(YieldingStore {
        inner: MemoryAccountStore::new(schema.clone()),
        conflicts: AtomicUsize::new(0),
    });
    let pipeline = env
        .builder(config())
        .store(store.clone())
        .order(ImportOrder::ValidateFirst)
        .build()?;
    let credentials = login("a@b.com", SECRET);

    let (first, second) = tokio::join!(
        pipeline.attempt(&credentials),
        pipeline.attempt(&credentials)
    );

    let first = first?.into_user().and_then(|user| user.account).expect("first login");
    let second = second?.into_user().and_then(|user| user.account).expect("second login");
    assert_eq!(store.conflicts.load(Ordering::SeqCst), 1);
    assert_eq!(first.id, second.id);
    assert_eq!(store.inner.len(), 1);

    let stored = store.inner.all();
    assert_eq!(schema.guid(&stored[0]), Some("G-1"));

    Ok(())
}
