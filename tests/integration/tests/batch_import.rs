//! Batch import scenarios.

use dir_federation::{BatchImporter, BatchOptions, ImportOrder};
use dir_storage::{AccountSearchCriteria, AccountStore};

use crate::common::{config, person, TestEnv, DOMAIN};

fn importer(env: &TestEnv) -> BatchImporter {
    let pipeline = env.pipeline(config(), ImportOrder::ValidateFirst);
    BatchImporter::from_pipeline(&pipeline, DOMAIN).unwrap()
}

#[tokio::test]
async fn imports_every_user_once() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let importer = importer(&env);

    let first = importer.run(&BatchOptions::new()).await?;
    assert_eq!(first.added, 2);
    assert_eq!(first.updated, 0);
    assert!(!first.has_errors());
    let hashes: Vec<_> = env
        .store
        .all()
        .iter()
        .map(|account| account.get_str("password").map(ToString::to_string))
        .collect();

    let second = importer.run(&BatchOptions::new()).await?;
    assert_eq!(second.added, 0);
    assert_eq!(second.updated, 2);
    assert_eq!(env.store.len(), 2);

    let rehashed: Vec<_> = env
        .store
        .all()
        .iter()
        .map(|account| account.get_str("password").map(ToString::to_string))
        .collect();
    assert_eq!(hashes, rehashed);

    Ok(())
}

#[tokio::test]
async fn single_user_import() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let importer = importer(&env);

    let result = importer.run(&BatchOptions::new().user("bob@b.com")).await?;
    assert_eq!(result.added, 1);
    assert!(env.store.get_by_username("bob@b.com", false).await?.is_some());
    assert!(env.store.get_by_username("a@b.com", false).await?.is_none());

    let result = importer.run(&BatchOptions::new().user("nobody@b.com")).await?;
    assert_eq!(result.total(), 0);

    Ok(())
}

#[tokio::test]
async fn broken_entries_do_not_abort_the_batch() -> anyhow::Result<()> {
    let env = TestEnv::new();
    env.add(person("Ghost", "G-9", ""));
    let importer = importer(&env);

    let result = importer.run(&BatchOptions::new()).await?;

    assert_eq!(result.added, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.errors[0].guid, "G-9");
    assert_eq!(result.errors[0].dn.as_deref(), Some("cn=Ghost,ou=people,dc=corp"));
    assert_eq!(env.store.len(), 2);

    Ok(())
}

#[tokio::test]
async fn disabled_users_are_trashed_and_restored() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let importer = importer(&env);
    importer.run(&BatchOptions::new()).await?;

    env.directory
        .upsert(person("Bob", "G-2", "bob@b.com").with_attribute("userAccountControl", ["514"]));
    let result = importer.run(&BatchOptions::new().delete_disabled()).await?;
    assert_eq!(result.removed, 1);
    let bob = env.store.get_by_username("bob@b.com", true).await?.expect("bob is kept");
    assert!(bob.is_trashed());

    env.directory
        .upsert(person("Bob", "G-2", "bob@b.com").with_attribute("userAccountControl", ["512"]));
    let result = importer.run(&BatchOptions::new().restore_enabled()).await?;
    assert_eq!(result.restored, 1);
    let bob = env.store.get_by_username("bob@b.com", false).await?.expect("bob is restored");
    assert!(!bob.is_trashed());

    Ok(())
}

#[tokio::test]
async fn accounts_missing_from_the_directory_are_trashed() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let importer = importer(&env);
    importer.run(&BatchOptions::new()).await?;

    env.directory.remove("G-2");
    let result = importer.run(&BatchOptions::new().delete_missing()).await?;

    assert_eq!(result.removed, 1);
    let live = env
        .store
        .search(&AccountSearchCriteria::new().domain(DOMAIN))
        .await?;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].get_str("email"), Some("a@b.com"));

    Ok(())
}

#[tokio::test]
async fn failed_listing_never_trashes_accounts() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let importer = importer(&env);
    importer.run(&BatchOptions::new()).await?;

    env.directory.set_unavailable(true);
    let err = importer
        .run(&BatchOptions::new().delete_missing())
        .await
        .unwrap_err();

    assert!(err.is_connection_error());
    let live = env
        .store
        .search(&AccountSearchCriteria::new().domain(DOMAIN))
        .await?;
    assert_eq!(live.len(), 2);

    Ok(())
}

#[tokio::test]
async fn delete_missing_cannot_be_narrowed() {
    let env = TestEnv::new();
    let importer = importer(&env);

    let err = importer
        .run(&BatchOptions::new().user("a@b.com").delete_missing())
        .await
        .unwrap_err();

    assert!(err.is_configuration_error());
    assert!(env.store.is_empty());
}

#[tokio::test]
async fn batch_import_requires_a_store() {
    let env = TestEnv::new();
    let domain = dir_core::DomainConfig {
        provider: dir_core::ProviderMode::NoDatabase,
        ..config()
    };
    let pipeline = env.pipeline(domain, ImportOrder::ValidateFirst);

    assert!(BatchImporter::from_pipeline(&pipeline, DOMAIN).is_err());
}
