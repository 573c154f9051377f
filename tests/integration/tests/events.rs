//! Event delivery across sinks.

use std::sync::Arc;

use dir_federation::{
    ChannelEventSink, CompositeEventSink, DirectoryEvent, EventKind, ImportOrder, MemoryEventSink,
};

use crate::common::{config, login, TestEnv, SECRET};

#[tokio::test]
async fn composite_sink_fans_out_in_order() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let recorded = Arc::new(MemoryEventSink::new());
    let (channel, mut receiver) = ChannelEventSink::new();
    let composite = CompositeEventSink::new()
        .with(recorded.clone())
        .with(Arc::new(channel));
    let pipeline = env
        .builder(config())
        .events(Arc::new(composite))
        .build()?;

    pipeline.attempt(&login("a@b.com", SECRET)).await?;

    let mut drained = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        drained.push(event.kind());
    }
    assert_eq!(drained, recorded.kinds());
    assert_eq!(
        drained,
        vec![
            EventKind::DiscoveredWithCredentials,
            EventKind::Authenticating,
            EventKind::Authenticated,
            EventKind::Importing,
            EventKind::Synchronizing,
            EventKind::Synchronized,
            EventKind::AuthenticationSuccessful,
        ]
    );

    Ok(())
}

#[tokio::test]
async fn bind_emits_authenticating_then_one_outcome() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let pipeline = env.pipeline(config(), ImportOrder::ValidateFirst);
    let resolver = pipeline.resolver();
    let entry = resolver
        .resolve_by_attribute("mail", "a@b.com")
        .await?
        .expect("alice exists");

    for (secret, expected) in [(SECRET, true), ("wrong", false), ("", false)] {
        env.events.clear();

        let authenticated = resolver.authenticate(&entry, &login("a@b.com", secret)).await?;

        assert_eq!(authenticated, expected);
        let kinds = env.events.kinds();
        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[0], EventKind::Authenticating);
        assert_eq!(
            kinds[1],
            if expected {
                EventKind::Authenticated
            } else {
                EventKind::AuthenticationFailed
            }
        );
    }

    Ok(())
}

#[tokio::test]
async fn events_carry_entry_and_account() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let pipeline = env.pipeline(config(), ImportOrder::ValidateFirst);

    pipeline.attempt(&login("a@b.com", SECRET)).await?;

    let events = env.events.events();
    let Some(DirectoryEvent::AuthenticationSuccessful { entry, account }) = events.last() else {
        panic!("last event should be AuthenticationSuccessful");
    };
    assert_eq!(entry.guid(), "G-1");
    let account = account.as_ref().expect("account is attached");
    assert_eq!(account.get_str("objectguid"), Some("G-1"));
    assert!(!events.last().map(DirectoryEvent::message).unwrap_or_default().is_empty());

    Ok(())
}
