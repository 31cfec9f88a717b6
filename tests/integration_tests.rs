//! Integration tests for the pairwise-lobby matchmaking service
//!
//! These tests drive the public service API end to end:
//! - Pairing two players and publishing their events
//! - Caller cancellation, timeouts and shutdown
//! - Publish failures
//! - Simulation rounds with early cancellations

mod fixtures;

use pairwise_lobby::config::SimulationSettings;
use pairwise_lobby::error::MatchmakingError;
use pairwise_lobby::simulation::run_round;
use pairwise_lobby::types::{CancelReason, QueueRequest, QueueResponse};
use std::time::Duration;

use fixtures::create_test_service;

#[tokio::test]
async fn test_complete_pairing_workflow() {
    let (service, publisher) = create_test_service(5_000);

    let alice_token = service.request_token();
    let bob_token = service.request_token();

    let alice = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .queue_player(QueueRequest::new("alice"), &alice_token)
                .await
        })
    };

    // Give alice time to publish her announcement
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!service.lobby_is_idle());
    assert_eq!(service.get_stats().unwrap().players_waiting, 1);

    let bob = service
        .queue_player(QueueRequest::new("bob"), &bob_token)
        .await
        .unwrap();
    let alice = alice.await.unwrap().unwrap();

    let (alice, bob) = match (alice, bob) {
        (QueueResponse::Matched(alice), QueueResponse::Matched(bob)) => (alice, bob),
        other => panic!("expected both players matched, got {:?}", other),
    };

    assert_eq!(alice.match_id, bob.match_id);
    assert_eq!(alice.opponent_id, "bob");
    assert_eq!(bob.opponent_id, "alice");
    assert!(alice.is_originator);
    assert!(!bob.is_originator);

    assert_eq!(publisher.count_events_for("alice"), 1);
    assert_eq!(publisher.count_events_for("bob"), 1);
    assert_eq!(publisher.count_matches(), 1);
    assert!(service.lobby_is_idle());
}

#[tokio::test]
async fn test_cancelled_player_is_not_matched_later() {
    let (service, publisher) = create_test_service(5_000);

    let alice_token = service.request_token();
    let alice = {
        let service = service.clone();
        let token = alice_token.clone();
        tokio::spawn(async move {
            service
                .queue_player(QueueRequest::new("alice"), &token)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    alice_token.cancel();

    match alice.await.unwrap().unwrap() {
        QueueResponse::Cancelled { player_id, reason } => {
            assert_eq!(player_id, "alice");
            assert_eq!(reason, CancelReason::Caller);
        }
        other => panic!("expected cancellation, got {:?}", other),
    }
    assert!(service.lobby_is_idle());

    // Bob must not adopt alice's withdrawn announcement
    let bob_token = service.request_token();
    let bob = {
        let service = service.clone();
        let token = bob_token.clone();
        tokio::spawn(async move { service.queue_player(QueueRequest::new("bob"), &token).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    bob_token.cancel();

    assert!(!bob.await.unwrap().unwrap().is_matched());
    assert!(publisher.get_published_events().is_empty());

    let stats = service.get_stats().unwrap();
    assert_eq!(stats.cancellations, 2);
    assert_eq!(stats.players_matched, 0);
}

#[tokio::test]
async fn test_already_cancelled_request_returns_immediately() {
    let (service, _publisher) = create_test_service(5_000);
    let token = service.request_token();
    token.cancel();

    let response = tokio::time::timeout(
        Duration::from_millis(100),
        service.queue_player(QueueRequest::new("alice"), &token),
    )
    .await
    .expect("cancelled request should not block")
    .unwrap();

    assert!(!response.is_matched());
    assert!(service.lobby_is_idle());
}

#[tokio::test]
async fn test_lone_player_times_out() {
    let (service, publisher) = create_test_service(30);
    let token = service.request_token();

    let response = service
        .queue_player(QueueRequest::new("alice"), &token)
        .await
        .unwrap();

    match response {
        QueueResponse::Cancelled { reason, .. } => assert_eq!(reason, CancelReason::Timeout),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(publisher.get_published_events().is_empty());
    assert!(service.lobby_is_idle());
}

#[tokio::test]
async fn test_shutdown_releases_waiting_player_and_rejects_new_ones() {
    let (service, _publisher) = create_test_service(5_000);

    let waiting = {
        let service = service.clone();
        let token = service.request_token();
        tokio::spawn(async move {
            service
                .queue_player(QueueRequest::new("alice"), &token)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    service.shutdown();

    match waiting.await.unwrap().unwrap() {
        QueueResponse::Cancelled { reason, .. } => assert_eq!(reason, CancelReason::Shutdown),
        other => panic!("expected shutdown cancellation, got {:?}", other),
    }

    let token = service.request_token();
    let err = service
        .queue_player(QueueRequest::new("bob"), &token)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MatchmakingError>(),
        Some(MatchmakingError::ServiceShutdown)
    ));
}

#[tokio::test]
async fn test_publish_failure_is_reported_to_caller() {
    let (service, publisher) = create_test_service(5_000);
    publisher.fail_publishes();

    let alice_token = service.request_token();
    let bob_token = service.request_token();
    let (alice, bob) = tokio::join!(
        service.queue_player(QueueRequest::new("alice"), &alice_token),
        service.queue_player(QueueRequest::new("bob"), &bob_token),
    );

    for result in [alice, bob] {
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::PublishFailed { .. })
        ));
    }

    // The pairing itself still happened
    let stats = service.get_stats().unwrap();
    assert_eq!(stats.matches_created, 1);
    assert_eq!(stats.players_matched, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simulation_round_pairs_everyone() {
    let (service, publisher) = create_test_service(2_000);
    let settings = SimulationSettings {
        players: 20,
        rounds: 1,
        round_interval_ms: 0,
        cancel_every: 0,
    };

    let report = run_round(service.clone(), 1, &settings).await;

    report.verify().unwrap();
    assert_eq!(report.matched.len(), 20);
    assert_eq!(report.match_count(), 10);
    assert!(report.failures.is_empty());
    assert_eq!(publisher.count_matches(), 10);
    assert!(service.lobby_is_idle());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simulation_round_with_cancellations() {
    let (service, _publisher) = create_test_service(200);
    let settings = SimulationSettings {
        players: 15,
        rounds: 1,
        round_interval_ms: 0,
        cancel_every: 3,
    };

    let report = run_round(service.clone(), 1, &settings).await;

    report.verify().unwrap();
    assert_eq!(report.matched.len() + report.cancelled.len(), 15);
    assert!(report.failures.is_empty());
    // Odd player count: at least one player leaves unmatched
    assert!(!report.cancelled.is_empty());
    assert!(service.lobby_is_idle());
}
