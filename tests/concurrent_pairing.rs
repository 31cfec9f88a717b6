//! High concurrency stress tests for the pairwise lobby
//!
//! These tests hammer a single lobby from many tasks and check that every
//! completed pairing is a proper, disjoint pair.

mod fixtures;

use pairwise_lobby::config::SimulationSettings;
use pairwise_lobby::lobby::Lobby;
use pairwise_lobby::simulation::run_round;
use pairwise_lobby::types::QueueOutcome;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use fixtures::create_test_service;

/// Queue `players` callers concurrently. Each caller's token fires after
/// `deadline(player)` so that an odd caller out can always leave.
async fn queue_concurrently<D>(
    players: usize,
    deadline: D,
) -> (Arc<Lobby<usize, usize>>, Vec<(usize, QueueOutcome<usize, usize>)>)
where
    D: Fn(usize) -> Duration,
{
    let lobby = Arc::new(Lobby::new());
    let ids = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..players)
        .map(|player| {
            let lobby = lobby.clone();
            let ids = ids.clone();
            let token = CancellationToken::new();

            let timer = token.clone();
            let delay = deadline(player);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                timer.cancel();
            });

            tokio::spawn(async move {
                let outcome = lobby
                    .queue(&token, || ids.fetch_add(1, Ordering::SeqCst), player)
                    .await;
                (player, outcome)
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(players);
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    (lobby, outcomes)
}

/// Check that matched callers form disjoint pairs with consistent views
fn assert_proper_pairs(outcomes: &[(usize, QueueOutcome<usize, usize>)]) {
    let mut by_id: HashMap<usize, Vec<(usize, usize, bool)>> = HashMap::new();

    for (player, outcome) in outcomes {
        if let QueueOutcome::Matched(matched) = outcome {
            by_id
                .entry(matched.id)
                .or_default()
                .push((*player, matched.counterpart, matched.is_originator));
        }
    }

    let mut seen = HashSet::new();
    for (id, members) in &by_id {
        assert_eq!(members.len(), 2, "match {} has {:?}", id, members);
        let (a, a_counterpart, a_originator) = members[0];
        let (b, b_counterpart, b_originator) = members[1];

        assert_ne!(a, b);
        assert_eq!(a_counterpart, b);
        assert_eq!(b_counterpart, a);
        assert!(a_originator ^ b_originator);
        assert!(seen.insert(a) && seen.insert(b), "player matched twice");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_high_concurrency_pairing() {
    let start_time = Instant::now();
    let (lobby, outcomes) = queue_concurrently(500, |_| Duration::from_secs(10)).await;
    let elapsed = start_time.elapsed();

    assert!(outcomes.iter().all(|(_, outcome)| !outcome.is_cancelled()));
    assert_proper_pairs(&outcomes);
    assert!(lobby.is_idle());

    println!("Paired 500 players in {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrency_with_cancellations() {
    let (lobby, outcomes) = queue_concurrently(201, |player| {
        if player % 4 == 0 {
            Duration::from_millis((player % 7) as u64)
        } else {
            Duration::from_millis(500)
        }
    })
    .await;

    assert_proper_pairs(&outcomes);
    assert!(lobby.is_idle());

    let matched = outcomes
        .iter()
        .filter(|(_, outcome)| !outcome.is_cancelled())
        .count();
    assert_eq!(matched % 2, 0);
    // Only early cancellers and at most one caller out leave unmatched
    let late_cancelled = outcomes
        .iter()
        .filter(|(player, outcome)| player % 4 != 0 && outcome.is_cancelled())
        .count();
    assert!(late_cancelled <= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_repeated_service_rounds() {
    let (service, publisher) = create_test_service(500);
    let settings = SimulationSettings {
        players: 40,
        rounds: 5,
        round_interval_ms: 0,
        cancel_every: 5,
    };

    let mut matches = 0;
    for round in 1..=settings.rounds {
        let report = run_round(service.clone(), round, &settings).await;
        report.verify().unwrap();
        assert!(report.failures.is_empty());
        matches += report.match_count();
    }

    let stats = service.get_stats().unwrap();
    assert_eq!(stats.players_queued, 200);
    assert_eq!(stats.players_waiting, 0);
    assert_eq!(stats.matches_created as usize, matches);
    assert_eq!(publisher.count_matches(), matches);
    assert!(service.lobby_is_idle());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_pairings_are_disjoint_pairs(
        players in 2usize..40,
        cancel_mask in proptest::collection::vec(any::<bool>(), 40),
        delay_ms in 0u64..5,
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let early = Duration::from_millis(delay_ms);
        let deadline = |player: usize| {
            if cancel_mask[player] {
                early
            } else {
                Duration::from_millis(100)
            }
        };

        let (lobby, outcomes) = runtime.block_on(queue_concurrently(players, deadline));

        assert_proper_pairs(&outcomes);
        prop_assert!(lobby.is_idle());
        prop_assert_eq!(outcomes.len(), players);
    }
}
