//! Session coordinator behaviour: one-shot start, failure reset, manual
//! messages and teardown.

mod common;

use std::sync::Arc;

use common::{coordinator, FakeConnector, FakeIssuer, INTRO, TARGET};
use kiosk_session::status::{MSG_CONNECTING, MSG_CONNECT_FAILED, MSG_READY};
use kiosk_session::{SessionError, SessionState, StatusBoard};
use tokio::sync::Semaphore;

#[tokio::test]
async fn test_first_arrival_bootstraps_and_speaks_intro() {
    let issuer = Arc::new(FakeIssuer::new());
    let connector = Arc::new(FakeConnector::new());
    let status = StatusBoard::new();
    let coord = coordinator(&issuer, &connector, &status);

    let task = coord.on_arrival_in_range().expect("bootstrap should start");
    assert_eq!(coord.state(), SessionState::Connecting);
    assert_eq!(status.snapshot().message, MSG_CONNECTING);
    task.await.unwrap();

    assert_eq!(coord.state(), SessionState::Ready);
    assert_eq!(issuer.calls(), 1);
    assert_eq!(connector.connects(), 1);
    assert_eq!(*connector.targets.lock().unwrap(), vec![TARGET.to_string()]);
    assert_eq!(connector.log.spoken(), vec![INTRO.to_string()]);

    let snapshot = status.snapshot();
    assert_eq!(snapshot.session, SessionState::Ready);
    assert_eq!(snapshot.message, MSG_READY);
}

#[tokio::test]
async fn test_repeated_arrivals_while_connecting_are_ignored() {
    let gate = Arc::new(Semaphore::new(0));
    let issuer = Arc::new(FakeIssuer::gated(Arc::clone(&gate)));
    let connector = Arc::new(FakeConnector::new());
    let coord = coordinator(&issuer, &connector, &StatusBoard::new());

    let task = coord.on_arrival_in_range().unwrap();
    for _ in 0..10 {
        assert!(coord.on_arrival_in_range().is_none());
    }
    gate.add_permits(1);
    task.await.unwrap();

    // And while ready.
    assert!(coord.on_arrival_in_range().is_none());
    assert_eq!(issuer.calls(), 1);
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn test_concurrent_arrivals_start_one_session() {
    let issuer = Arc::new(FakeIssuer::new());
    let connector = Arc::new(FakeConnector::new());
    let coord = coordinator(&issuer, &connector, &StatusBoard::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coord = coord.clone();
            tokio::spawn(async move { coord.on_arrival_in_range() })
        })
        .collect();

    let mut started = 0;
    for handle in handles {
        if let Some(task) = handle.await.unwrap() {
            started += 1;
            task.await.unwrap();
        }
    }
    assert_eq!(started, 1);
    assert_eq!(issuer.calls(), 1);
}

#[tokio::test]
async fn test_auth_error_resets_latch_and_next_arrival_retries_once() {
    let issuer = Arc::new(
        FakeIssuer::new().then(Err(SessionError::Auth("session token error: 401".into()))),
    );
    let connector = Arc::new(FakeConnector::new());
    let status = StatusBoard::new();
    let coord = coordinator(&issuer, &connector, &status);

    coord.on_arrival_in_range().unwrap().await.unwrap();
    assert_eq!(coord.state(), SessionState::Failed);
    assert_eq!(connector.connects(), 0);
    let snapshot = status.snapshot();
    assert_eq!(snapshot.message, MSG_CONNECT_FAILED);
    assert!(snapshot.last_error.unwrap().contains("401"));

    let retry = coord.on_arrival_in_range().expect("failure must allow a retry");
    assert!(coord.on_arrival_in_range().is_none());
    retry.await.unwrap();

    assert_eq!(issuer.calls(), 2);
    assert_eq!(coord.state(), SessionState::Ready);
    assert_eq!(status.snapshot().last_error, None);
}

#[tokio::test]
async fn test_session_start_error_resets_latch() {
    let issuer = Arc::new(FakeIssuer::new());
    let connector = Arc::new(FakeConnector {
        fail_connect: true,
        ..FakeConnector::default()
    });
    let coord = coordinator(&issuer, &connector, &StatusBoard::new());

    coord.on_arrival_in_range().unwrap().await.unwrap();
    assert_eq!(coord.state(), SessionState::Failed);
    assert!(coord.on_arrival_in_range().is_some());
}

#[tokio::test]
async fn test_blank_messages_are_noops_in_every_state() {
    let gate = Arc::new(Semaphore::new(0));
    let issuer = Arc::new(FakeIssuer::gated(Arc::clone(&gate)));
    let connector = Arc::new(FakeConnector::new());
    let coord = coordinator(&issuer, &connector, &StatusBoard::new());

    // Idle
    assert_eq!(coord.send_message("").await, Ok(false));
    assert_eq!(coord.send_message("   ").await, Ok(false));

    // Connecting
    let task = coord.on_arrival_in_range().unwrap();
    assert_eq!(coord.send_message("").await, Ok(false));
    assert_eq!(coord.send_message("   ").await, Ok(false));

    // Ready
    gate.add_permits(1);
    task.await.unwrap();
    assert_eq!(coord.send_message("").await, Ok(false));
    assert_eq!(coord.send_message("\t  \n").await, Ok(false));

    assert_eq!(connector.log.spoken(), vec![INTRO.to_string()]);
}

#[tokio::test]
async fn test_message_before_ready_is_dropped_not_queued() {
    let gate = Arc::new(Semaphore::new(0));
    let issuer = Arc::new(FakeIssuer::gated(Arc::clone(&gate)));
    let connector = Arc::new(FakeConnector::new());
    let coord = coordinator(&issuer, &connector, &StatusBoard::new());

    assert_eq!(coord.send_message("hello").await, Err(SessionError::NotReady));
    let task = coord.on_arrival_in_range().unwrap();
    assert_eq!(coord.send_message("hello").await, Err(SessionError::NotReady));
    gate.add_permits(1);
    task.await.unwrap();

    assert_eq!(connector.log.spoken(), vec![INTRO.to_string()]);
}

#[tokio::test]
async fn test_message_when_ready_is_trimmed_and_forwarded() {
    let issuer = Arc::new(FakeIssuer::new());
    let connector = Arc::new(FakeConnector::new());
    let coord = coordinator(&issuer, &connector, &StatusBoard::new());
    coord.on_arrival_in_range().unwrap().await.unwrap();

    assert_eq!(coord.send_message("  How much RAM?  ").await, Ok(true));
    assert_eq!(
        connector.log.spoken(),
        vec![INTRO.to_string(), "How much RAM?".to_string()]
    );
}

#[tokio::test]
async fn test_teardown_with_nothing_started() {
    let issuer = Arc::new(FakeIssuer::new());
    let connector = Arc::new(FakeConnector::new());
    let coord = coordinator(&issuer, &connector, &StatusBoard::new());

    coord.teardown().await;
    coord.teardown().await;
    assert_eq!(connector.log.stops(), 0);
    assert_eq!(coord.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_teardown_twice_stops_session_once() {
    let issuer = Arc::new(FakeIssuer::new());
    let connector = Arc::new(FakeConnector::new());
    let coord = coordinator(&issuer, &connector, &StatusBoard::new());
    coord.on_arrival_in_range().unwrap().await.unwrap();

    coord.teardown().await;
    coord.teardown().await;
    assert_eq!(connector.log.stops(), 1);
    assert_eq!(coord.send_message("hi").await, Err(SessionError::NotReady));
    assert!(coord.on_arrival_in_range().is_none());
}

#[tokio::test]
async fn test_stop_failure_is_not_propagated() {
    let issuer = Arc::new(FakeIssuer::new());
    let connector = Arc::new(FakeConnector {
        fail_stop: true,
        ..FakeConnector::default()
    });
    let coord = coordinator(&issuer, &connector, &StatusBoard::new());
    coord.on_arrival_in_range().unwrap().await.unwrap();

    coord.teardown().await;
    assert_eq!(connector.log.stops(), 1);
}

#[tokio::test]
async fn test_teardown_while_connecting_stops_late_session() {
    let gate = Arc::new(Semaphore::new(0));
    let issuer = Arc::new(FakeIssuer::gated(Arc::clone(&gate)));
    let connector = Arc::new(FakeConnector::new());
    let coord = coordinator(&issuer, &connector, &StatusBoard::new());

    let task = coord.on_arrival_in_range().unwrap();
    coord.teardown().await;
    assert_eq!(connector.log.stops(), 0);

    gate.add_permits(1);
    task.await.unwrap();

    assert_eq!(connector.connects(), 1);
    assert_eq!(connector.log.stops(), 1);
    assert!(connector.log.spoken().is_empty());
    assert_eq!(coord.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_failure_after_teardown_leaves_state_idle() {
    let gate = Arc::new(Semaphore::new(0));
    let issuer = Arc::new(
        FakeIssuer::gated(Arc::clone(&gate)).then(Err(SessionError::Auth("timeout".into()))),
    );
    let connector = Arc::new(FakeConnector::new());
    let coord = coordinator(&issuer, &connector, &StatusBoard::new());

    let task = coord.on_arrival_in_range().unwrap();
    coord.teardown().await;
    gate.add_permits(1);
    task.await.unwrap();

    assert_eq!(coord.state(), SessionState::Idle);
}
