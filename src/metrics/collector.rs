//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the pairwise-lobby service
//! using Prometheus metrics.

use crate::service::app::ServiceStats;
use crate::types::CancelReason;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Pairing metrics
    pairing_metrics: PairingMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Match events published, by outcome
    pub events_published_total: IntCounterVec,
}

/// Pairing metrics
#[derive(Clone)]
pub struct PairingMetrics {
    /// Total players that entered the lobby
    pub players_queued_total: IntCounter,

    /// Players currently waiting for a counterpart
    pub players_waiting: IntGauge,

    /// Players matched, by role (originator or joiner)
    pub matches_total: IntCounterVec,

    /// Players that left without a match, by reason
    pub cancellations_total: IntCounterVec,

    /// Time from queueing to match or cancellation
    pub queue_wait_time_seconds: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let pairing_metrics = PairingMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            pairing_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get pairing metrics
    pub fn pairing(&self) -> &PairingMetrics {
        &self.pairing_metrics
    }

    /// Record a player entering the lobby
    pub fn record_player_queued(&self) {
        self.pairing_metrics.players_queued_total.inc();
        self.pairing_metrics.players_waiting.inc();
    }

    /// Record a player leaving the lobby, matched or not
    pub fn record_player_left(&self) {
        self.pairing_metrics.players_waiting.dec();
    }

    /// Record a player matched with a counterpart
    pub fn record_match(&self, is_originator: bool, wait: Duration) {
        let role = if is_originator { "originator" } else { "joiner" };

        self.pairing_metrics
            .matches_total
            .with_label_values(&[role])
            .inc();
        self.pairing_metrics
            .queue_wait_time_seconds
            .observe(wait.as_secs_f64());
    }

    /// Record a player that stopped waiting without a match
    pub fn record_cancellation(&self, reason: CancelReason, wait: Duration) {
        self.pairing_metrics
            .cancellations_total
            .with_label_values(&[reason.as_str()])
            .inc();
        self.pairing_metrics
            .queue_wait_time_seconds
            .observe(wait.as_secs_f64());
    }

    /// Record the outcome of publishing a match event
    pub fn record_event_published(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.service_metrics
            .events_published_total
            .with_label_values(&[status])
            .inc();
    }

    /// Resynchronize the waiting gauge from service stats
    pub fn update_from_stats(&self, stats: &ServiceStats) {
        self.pairing_metrics
            .players_waiting
            .set(stats.players_waiting as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("pairwise_lobby_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "pairwise_lobby_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let events_published_total = IntCounterVec::new(
            Opts::new(
                "pairwise_lobby_events_published_total",
                "Match events published",
            ),
            &["status"],
        )?;
        registry.register(Box::new(events_published_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            events_published_total,
        })
    }
}

impl PairingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let players_queued_total = IntCounter::new(
            "pairwise_lobby_players_queued_total",
            "Total players queued",
        )?;
        registry.register(Box::new(players_queued_total.clone()))?;

        let players_waiting = IntGauge::new(
            "pairwise_lobby_players_waiting",
            "Players currently waiting for a counterpart",
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        let matches_total = IntCounterVec::new(
            Opts::new("pairwise_lobby_matches_total", "Total players matched"),
            &["role"],
        )?;
        registry.register(Box::new(matches_total.clone()))?;

        let cancellations_total = IntCounterVec::new(
            Opts::new(
                "pairwise_lobby_cancellations_total",
                "Players that stopped waiting without a match",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(cancellations_total.clone()))?;

        let queue_wait_time_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "pairwise_lobby_queue_wait_time_seconds",
                "Time spent waiting in the lobby",
            )
            .buckets(vec![0.0001, 0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )?;
        registry.register(Box::new(queue_wait_time_seconds.clone()))?;

        Ok(Self {
            players_queued_total,
            players_waiting,
            matches_total,
            cancellations_total,
            queue_wait_time_seconds,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
