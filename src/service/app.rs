//! Matchmaking service built around the pairwise lobby
//!
//! [`MatchmakingService`] owns one [`Lobby`] keyed by match UUID and player
//! ID. It adds what a deployed matchmaker needs on top of the bare
//! rendezvous: a maximum wait per request, service-wide shutdown, running
//! statistics, Prometheus metrics and `MatchFound` event publication.

use crate::config::AppConfig;
use crate::error::{MatchmakingError, Result};
use crate::lobby::Lobby;
use crate::metrics::MetricsCollector;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::service::publisher::EventPublisher;
use crate::types::{
    CancelReason, MatchFound, MatchId, PlayerId, QueueOutcome, QueueRequest, QueueResponse,
};
use crate::utils::{current_timestamp, duration_millis, generate_match_id};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

/// Running statistics about the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Total players that entered the lobby
    pub players_queued: u64,
    /// Players currently inside the lobby, not yet matched or cancelled
    pub players_waiting: usize,
    /// Total players that left with a match
    pub players_matched: u64,
    /// Total matches created (one per pair)
    pub matches_created: u64,
    /// Total players that left without a match
    pub cancellations: u64,
}

/// A player counted as waiting in the lobby.
///
/// Dropping it takes the player back out of the waiting counts, including
/// when the `queue_player` future itself is dropped mid-wait.
struct WaitingPlayer<'a> {
    service: &'a MatchmakingService,
}

impl Drop for WaitingPlayer<'_> {
    fn drop(&mut self) {
        let left = self.service.update_stats(|stats| {
            stats.players_waiting = stats.players_waiting.saturating_sub(1);
        });
        if let Err(e) = left {
            warn!("Failed to update waiting count: {}", e);
        }
        self.service.metrics.record_player_left();
    }
}

/// The matchmaking service
pub struct MatchmakingService {
    /// Application configuration
    config: AppConfig,
    /// The single rendezvous point for all players
    lobby: Lobby<MatchId, PlayerId>,
    /// Event publisher for match events
    publisher: Arc<dyn EventPublisher>,
    /// Metrics collector for recording performance data
    metrics: Arc<MetricsCollector>,
    /// Service statistics
    stats: RwLock<ServiceStats>,
    /// Fired once when the service shuts down
    shutdown: CancellationToken,
    started_at: Instant,
}

impl MatchmakingService {
    /// Create a new matchmaking service
    pub fn new(
        config: AppConfig,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        info!(
            "Initializing {} - max wait: {}ms",
            config.service.name, config.matchmaking.max_wait_time_ms
        );

        Self {
            config,
            lobby: Lobby::new(),
            publisher,
            metrics,
            stats: RwLock::new(ServiceStats::default()),
            shutdown: CancellationToken::new(),
            started_at: Instant::now(),
        }
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get the metrics collector
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Check if service is running
    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Time since the service was created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// True when no player is waiting in the lobby
    pub fn lobby_is_idle(&self) -> bool {
        self.lobby.is_idle()
    }

    /// Token that fires when the service shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// A per-request cancellation token, also fired on shutdown
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Stop accepting requests and release every waiting player
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!("Shutting down matchmaking service");
        self.shutdown.cancel();
    }

    /// Pair a player with whoever else is waiting.
    ///
    /// Waits until a counterpart arrives, `cancel` fires, the configured
    /// maximum wait elapses, or the service shuts down.
    pub async fn queue_player(
        &self,
        request: QueueRequest,
        cancel: &CancellationToken,
    ) -> Result<QueueResponse> {
        if !self.is_running() {
            return Err(MatchmakingError::ServiceShutdown.into());
        }

        let start_time = Instant::now();
        info!("Processing queue request - player_id: '{}'", request.player_id);

        let (outcome, deadline_fired) = {
            let _waiting = self.enter_lobby()?;
            let (token, _guard) = self.bounded_token(cancel);
            let outcome = self
                .lobby
                .queue(&token, generate_match_id, request.player_id.clone())
                .await;
            (outcome, token.is_cancelled())
        };

        let wait = start_time.elapsed();

        match outcome {
            QueueOutcome::Matched(matched) => {
                let event = MatchFound {
                    match_id: matched.id,
                    player_id: request.player_id.clone(),
                    opponent_id: matched.counterpart,
                    is_originator: matched.is_originator,
                    wait_time_ms: duration_millis(wait),
                    timestamp: current_timestamp(),
                };

                self.update_stats(|stats| {
                    stats.players_matched += 1;
                    if event.is_originator {
                        stats.matches_created += 1;
                    }
                })?;
                self.metrics.record_match(event.is_originator, wait);

                info!(
                    "Matched player '{}' with '{}' - match_id: {}, originator: {}, wait: {:.2}ms",
                    event.player_id,
                    event.opponent_id,
                    event.match_id,
                    event.is_originator,
                    wait.as_secs_f64() * 1000.0
                );

                self.publish(event.clone()).await?;
                Ok(QueueResponse::Matched(event))
            }
            QueueOutcome::Cancelled => {
                let reason = self.cancel_reason(cancel, deadline_fired);

                self.update_stats(|stats| {
                    stats.cancellations += 1;
                })?;
                self.metrics.record_cancellation(reason, wait);

                info!(
                    "Player '{}' left the lobby unmatched - reason: {}, wait: {:.2}ms",
                    request.player_id,
                    reason,
                    wait.as_secs_f64() * 1000.0
                );

                Ok(QueueResponse::Cancelled {
                    player_id: request.player_id,
                    reason,
                })
            }
        }
    }

    /// Get a snapshot of the service statistics
    pub fn get_stats(&self) -> Result<ServiceStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?;
        Ok(stats.clone())
    }

    /// Start the periodic metrics refresh task. It stops on shutdown.
    pub fn spawn_maintenance(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let service = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            let shutdown = service.shutdown_token();
            info!("Metrics refresh task started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let metrics = service.metrics();
                metrics
                    .service()
                    .uptime_seconds
                    .set(service.uptime().as_secs() as i64);
                let health = HealthCheck::readiness_check(&service);
                metrics.update_health_status(health.as_gauge());

                match service.get_stats() {
                    Ok(stats) => {
                        debug!(
                            "Updating metrics - queued: {}, waiting: {}, matches: {}",
                            stats.players_queued, stats.players_waiting, stats.matches_created
                        );
                        metrics.update_from_stats(&stats);
                    }
                    Err(e) => warn!("Failed to get stats for metrics update: {}", e),
                }
            }

            service
                .metrics()
                .update_health_status(HealthStatus::Unhealthy.as_gauge());
            info!("Metrics refresh task stopped");
        })
    }

    /// Child of `cancel` that also fires on shutdown or after the max wait.
    ///
    /// The returned guard cancels the token when dropped, which ends the
    /// watcher task.
    fn bounded_token(&self, cancel: &CancellationToken) -> (CancellationToken, DropGuard) {
        let token = cancel.child_token();
        let watched = token.clone();
        let shutdown = self.shutdown.clone();
        let max_wait = self.config.max_wait_time();

        tokio::spawn(async move {
            tokio::select! {
                _ = watched.cancelled() => {}
                _ = shutdown.cancelled() => watched.cancel(),
                _ = tokio::time::sleep(max_wait) => watched.cancel(),
            }
        });

        let guard = token.clone().drop_guard();
        (token, guard)
    }

    /// Count a player into the lobby until the returned guard drops
    fn enter_lobby(&self) -> Result<WaitingPlayer<'_>> {
        self.update_stats(|stats| {
            stats.players_queued += 1;
            stats.players_waiting += 1;
        })?;
        self.metrics.record_player_queued();
        Ok(WaitingPlayer { service: self })
    }

    /// `deadline_fired` is whether the bounded token had fired when the
    /// lobby returned.
    fn cancel_reason(&self, cancel: &CancellationToken, deadline_fired: bool) -> CancelReason {
        if self.shutdown.is_cancelled() {
            CancelReason::Shutdown
        } else if cancel.is_cancelled() {
            CancelReason::Caller
        } else if deadline_fired {
            CancelReason::Timeout
        } else {
            CancelReason::CounterpartLost
        }
    }

    async fn publish(&self, event: MatchFound) -> Result<()> {
        let player_id = event.player_id.clone();

        match self.publisher.publish_match_found(event).await {
            Ok(()) => {
                self.metrics.record_event_published(true);
                Ok(())
            }
            Err(e) => {
                self.metrics.record_event_published(false);
                error!("Failed to publish MatchFound for '{}': {}", player_id, e);
                Err(MatchmakingError::PublishFailed {
                    player_id,
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }

    fn update_stats(&self, update: impl FnOnce(&mut ServiceStats)) -> Result<()> {
        let mut stats = self
            .stats
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?;
        update(&mut stats);
        Ok(())
    }
}
