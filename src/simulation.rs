//! Load simulation against a running matchmaking service
//!
//! A round spawns a batch of players that queue concurrently, optionally
//! cancels some of them shortly after they enter, and then checks that the
//! resulting matches form proper pairs.

use crate::config::SimulationSettings;
use crate::service::MatchmakingService;
use crate::types::{CancelReason, MatchFound, MatchId, PlayerId, QueueRequest, QueueResponse};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Delay before a designated player cancels its own request
const CANCEL_DELAY: Duration = Duration::from_millis(5);

/// Everything that happened to the players of one round
#[derive(Debug, Default)]
pub struct RoundReport {
    pub round: usize,
    pub players: usize,
    /// One event per matched player
    pub matched: Vec<MatchFound>,
    pub cancelled: Vec<(PlayerId, CancelReason)>,
    /// Requests that failed outright
    pub failures: Vec<String>,
    pub duration: Duration,
}

impl RoundReport {
    /// Number of distinct matches in the round
    pub fn match_count(&self) -> usize {
        self.matched.iter().filter(|event| event.is_originator).count()
    }

    /// Check that matched players form disjoint, consistent pairs
    pub fn verify(&self) -> Result<()> {
        let mut pairs: HashMap<MatchId, Vec<&MatchFound>> = HashMap::new();
        for event in &self.matched {
            pairs.entry(event.match_id).or_default().push(event);
        }

        for (match_id, members) in &pairs {
            let [first, second] = members.as_slice() else {
                return Err(anyhow!(
                    "Match {} has {} members instead of 2",
                    match_id,
                    members.len()
                ));
            };

            if first.opponent_id != second.player_id || second.opponent_id != first.player_id {
                return Err(anyhow!(
                    "Match {} pairs '{}' and '{}' but they disagree on opponents",
                    match_id,
                    first.player_id,
                    second.player_id
                ));
            }

            if first.is_originator == second.is_originator {
                return Err(anyhow!(
                    "Match {} must have exactly one originator",
                    match_id
                ));
            }
        }

        let accounted = self.matched.len() + self.cancelled.len() + self.failures.len();
        if accounted != self.players {
            return Err(anyhow!(
                "Round {} accounted for {} of {} players",
                self.round,
                accounted,
                self.players
            ));
        }

        Ok(())
    }
}

/// Run one round of concurrent players against the service
pub async fn run_round(
    service: Arc<MatchmakingService>,
    round: usize,
    settings: &SimulationSettings,
) -> RoundReport {
    let start_time = Instant::now();
    let mut tasks = JoinSet::new();

    info!("Starting round {} with {} players", round, settings.players);

    for index in 0..settings.players {
        let service = service.clone();
        let player_id = format!("round{}-player{}", round, index);
        let cancels_early = settings.cancel_every > 0 && (index + 1) % settings.cancel_every == 0;

        tasks.spawn(async move {
            let token = service.request_token();

            if cancels_early {
                let token = token.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(CANCEL_DELAY).await;
                    token.cancel();
                });
            }

            let result = service
                .queue_player(QueueRequest::new(player_id.clone()), &token)
                .await;
            (player_id, result)
        });
    }

    let mut report = RoundReport {
        round,
        players: settings.players,
        ..RoundReport::default()
    };

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(QueueResponse::Matched(event)))) => report.matched.push(event),
            Ok((_, Ok(QueueResponse::Cancelled { player_id, reason }))) => {
                debug!("Player '{}' cancelled: {}", player_id, reason);
                report.cancelled.push((player_id, reason));
            }
            Ok((player_id, Err(e))) => {
                error!("Player '{}' failed: {}", player_id, e);
                report.failures.push(format!("{}: {}", player_id, e));
            }
            Err(e) => {
                error!("Player task failed: {}", e);
                report.failures.push(e.to_string());
            }
        }
    }

    report.duration = start_time.elapsed();
    info!(
        "Round {} finished in {:.2}ms - matches: {}, cancelled: {}, failures: {}",
        round,
        report.duration.as_secs_f64() * 1000.0,
        report.match_count(),
        report.cancelled.len(),
        report.failures.len()
    );

    report
}
