use std::time::Duration;

use tokio_util::sync::CancellationToken;

use topicctl::{
    admin::TopicAdmin, controller::TopicController, error::AdminError, OperationOutcome,
    Properties, RejectReason, TopicConfig,
};

mod helpers;

use helpers::{default_loader, topic, MemoryLoader, MockFactory, MockSession, Visibility};

fn admin(factory: MockFactory) -> TopicAdmin<MemoryLoader, MockFactory> {
    TopicAdmin::new(TopicController::new(default_loader()), factory)
}

#[tokio::test(start_paused = true)]
async fn test_session_closed_after_success() {
    let session = MockSession::immediate(&[]);
    let admin = admin(MockFactory::new(session.clone()));

    let outcome = admin
        .create_topic("orders", &TopicConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome, OperationOutcome::Succeeded(topic("orders")));
    assert_eq!(session.times_closed(), 1, "Session should be closed once");
}

#[tokio::test(start_paused = true)]
async fn test_session_closed_after_rejection_and_timeout() {
    let session = MockSession::new(&[], Visibility::Never);
    let admin = admin(MockFactory::new(session.clone()));

    let outcome = admin.delete_topic("ghost").await.unwrap();
    assert!(
        matches!(outcome, OperationOutcome::Rejected(RejectReason::DoesNotExist(_))),
        "Got {outcome:?}"
    );
    assert_eq!(session.times_closed(), 1);

    let outcome = admin
        .create_topic("orders", &TopicConfig::default())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        OperationOutcome::TimedOut(topic("orders"), Duration::from_secs(10))
    );
    assert_eq!(session.times_closed(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_session_closed_after_interruption() {
    let session = MockSession::new(&["pack-orders"], Visibility::Never);
    let cancel = CancellationToken::new();
    let admin = TopicAdmin::new(
        TopicController::new(default_loader()).with_cancellation(cancel.clone()),
        MockFactory::new(session.clone()),
    );

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(4)).await;
        cancel.cancel();
    });

    let err = admin
        .delete_pack_topic("orders")
        .await
        .expect_err("Operation should be interrupted");
    assert!(matches!(err, AdminError::Interrupted), "Got {err:?}");
    assert_eq!(session.deletes(), vec!["pack-orders".to_string()]);
    assert_eq!(
        session.times_closed(),
        1,
        "Session should be closed even when interrupted"
    );
}

#[tokio::test(start_paused = true)]
async fn test_invalid_name_never_connects() {
    let factory = MockFactory::new(MockSession::immediate(&[]));
    let connects = factory.connects.clone();
    let admin = admin(factory);

    for outcome in [
        admin.create_topic("..", &TopicConfig::default()).await,
        admin.create_pack_topic("a b", &TopicConfig::default()).await,
        admin.delete_topic("").await,
        admin.delete_pack_topic(&"x".repeat(300)).await,
    ] {
        let outcome = outcome.unwrap();
        assert!(
            matches!(outcome, OperationOutcome::Rejected(RejectReason::InvalidName(_))),
            "Got {outcome:?}"
        );
    }
    assert_eq!(
        connects.load(std::sync::atomic::Ordering::SeqCst),
        0,
        "Invalid names should not open a session"
    );
}

#[tokio::test(start_paused = true)]
async fn test_connection_failure_is_rejected() {
    let mut factory = MockFactory::new(MockSession::immediate(&[]));
    factory.fail = true;
    let admin = admin(factory);

    let outcome = admin
        .create_pack_topic("orders", &TopicConfig::default())
        .await
        .unwrap();
    match outcome {
        OperationOutcome::Rejected(RejectReason::Connection(msg)) => {
            assert!(msg.contains("connection refused"), "Got {msg}")
        }
        other => panic!("Expected a connection rejection, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_admin_properties_and_overrides() {
    let session = MockSession::immediate(&[]);
    let factory = MockFactory::new(session.clone());
    let seen = factory.seen_props.clone();
    let admin = admin(factory)
        .with_admin_overrides(Properties::from([("servers", "nats://10.0.0.1:4222")]));

    admin
        .create_pack_topic("orders", &TopicConfig::from([("retention.ms", "1")]))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].get("servers"),
        Some("nats://10.0.0.1:4222"),
        "Admin overrides should win over the admin source"
    );
    let creates = session.creates();
    assert_eq!(creates[0].0, "pack-orders");
    assert_eq!(creates[0].1.get("retention.ms"), Some("1"));
    assert_eq!(creates[0].1.get("storage"), Some("memory"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_admin_source() {
    let factory = MockFactory::new(MockSession::immediate(&[]));
    let admin = admin(factory).with_admin_source("missing");

    let err = admin
        .delete_topic("orders")
        .await
        .expect_err("A missing admin source should abort");
    assert!(
        matches!(err, AdminError::ConfigLoad { ref source_id, .. } if source_id == "missing"),
        "Got {err:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_list_topics() {
    let session = MockSession::immediate(&["b", "a", "pack-c"]);
    let admin = admin(MockFactory::new(session.clone()));

    let topics = admin
        .list_topics()
        .await
        .expect("Admin source should load")
        .expect("Listing should succeed");
    assert_eq!(
        topics.into_iter().collect::<Vec<_>>(),
        vec!["a".to_string(), "b".to_string(), "pack-c".to_string()]
    );
    assert_eq!(session.times_closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_closed_when_pack_config_missing() {
    let session = MockSession::immediate(&[]);
    let loader = MemoryLoader::default().with_source(
        topicctl::ADMIN_SOURCE,
        Properties::from([("servers", "127.0.0.1:4222")]),
    );
    let admin = TopicAdmin::new(
        TopicController::new(loader),
        MockFactory::new(session.clone()),
    );

    let err = admin
        .create_pack_topic("orders", &TopicConfig::default())
        .await
        .expect_err("A missing pack topic source should abort");
    assert!(
        matches!(err, AdminError::ConfigLoad { ref source_id, .. } if source_id == topicctl::PACK_TOPIC_SOURCE),
        "Got {err:?}"
    );
    assert!(session.creates().is_empty(), "Nothing should be submitted");
    assert_eq!(
        session.times_closed(),
        1,
        "Session should be closed when the topic config cannot load"
    );
}
