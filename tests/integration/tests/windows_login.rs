//! Windows/SSO login scenarios.

use std::collections::HashMap;

use dir_core::DomainConfig;
use dir_federation::{AuthOutcome, AuthSource, EventKind, ImportOrder};
use dir_storage::AccountStore;

use crate::common::{config, TestEnv};

fn server(value: &str) -> HashMap<String, String> {
    HashMap::from([("AUTH_USER".to_string(), value.to_string())])
}

#[tokio::test]
async fn sso_identity_imports_the_user() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let pipeline = env.pipeline(config(), ImportOrder::ValidateFirst);

    let user = pipeline
        .attempt_windows(&server("CORP\\alice"))
        .await?
        .into_user()
        .expect("windows login succeeds");

    assert_eq!(user.source, AuthSource::Windows);
    let account = user.account.expect("account is imported");
    assert!(account.exists());
    assert_eq!(account.get_str("email"), Some("a@b.com"));
    assert_eq!(env.events.count(EventKind::AuthenticatedWithWindows), 1);
    assert_eq!(env.events.count(EventKind::Authenticating), 0);
    assert_eq!(env.events.count(EventKind::AuthenticationSuccessful), 0);

    Ok(())
}

#[tokio::test]
async fn only_imported_passes_once_the_account_is_saved() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let domain = DomainConfig {
        rules: vec!["only_imported".to_string()],
        ..config()
    };
    let pipeline = env.pipeline(domain, ImportOrder::ValidateFirst);

    let outcome = pipeline.attempt_windows(&server("bob")).await?;

    assert!(outcome.is_success());
    assert_eq!(env.store.len(), 1);
    assert_eq!(env.events.count(EventKind::AuthenticationRejected), 0);

    Ok(())
}

#[tokio::test]
async fn validate_first_windows_order_rejects_unimported_users() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let domain = DomainConfig {
        rules: vec!["only_imported".to_string()],
        ..config()
    };
    let pipeline = env
        .builder(domain)
        .windows_order(ImportOrder::ValidateFirst)
        .build()?;

    let outcome = pipeline.attempt_windows(&server("bob")).await?;

    assert_eq!(outcome, AuthOutcome::Rejected);
    assert!(env.store.is_empty());

    Ok(())
}

#[tokio::test]
async fn trashed_account_is_refused() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let pipeline = env.pipeline(config(), ImportOrder::ValidateFirst);

    let mut account = pipeline
        .attempt_windows(&server("alice"))
        .await?
        .into_user()
        .and_then(|user| user.account)
        .expect("first login imports");
    account.trash();
    env.store.save(&mut account).await?;

    let outcome = pipeline.attempt_windows(&server("alice")).await?;

    assert_eq!(outcome, AuthOutcome::Trashed);
    assert_eq!(env.events.count(EventKind::AuthenticatedModelTrashed), 1);

    Ok(())
}

#[tokio::test]
async fn missing_or_unknown_identity_is_not_found() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let pipeline = env.pipeline(config(), ImportOrder::ValidateFirst);

    assert_eq!(pipeline.attempt_windows(&HashMap::new()).await?, AuthOutcome::NotFound);
    assert_eq!(pipeline.attempt_windows(&server("CORP\\")).await?, AuthOutcome::NotFound);
    assert_eq!(pipeline.attempt_windows(&server("mallory")).await?, AuthOutcome::NotFound);
    assert!(env.store.is_empty());

    Ok(())
}

#[tokio::test]
async fn server_key_is_configurable() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut domain = config();
    domain.windows.server_key = "REMOTE_USER".to_string();
    let pipeline = env.pipeline(domain, ImportOrder::ValidateFirst);

    assert_eq!(pipeline.attempt_windows(&server("alice")).await?, AuthOutcome::NotFound);

    let remote = HashMap::from([("REMOTE_USER".to_string(), "alice".to_string())]);
    assert!(pipeline.attempt_windows(&remote).await?.is_success());

    Ok(())
}
