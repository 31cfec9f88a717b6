//! Test fixtures and mock implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use pairwise_lobby::config::AppConfig;
use pairwise_lobby::error::Result;
use pairwise_lobby::metrics::MetricsCollector;
use pairwise_lobby::service::{EventPublisher, MatchmakingService};
use pairwise_lobby::types::MatchFound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Event publisher that records every published event
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    published_events: Arc<Mutex<Vec<MatchFound>>>,
    failing: AtomicBool,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail
    pub fn fail_publishes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Get all published events (for testing)
    pub fn get_published_events(&self) -> Vec<MatchFound> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count the events published for one player
    pub fn count_events_for(&self, player_id: &str) -> usize {
        self.get_published_events()
            .iter()
            .filter(|event| event.player_id == player_id)
            .count()
    }

    /// Count originator events, one per match
    pub fn count_matches(&self) -> usize {
        self.get_published_events()
            .iter()
            .filter(|event| event.is_originator)
            .count()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("broker unavailable"));
        }
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
        Ok(())
    }
}

/// Build a service with the given maximum wait and a recording publisher
pub fn create_test_service(
    max_wait_time_ms: u64,
) -> (Arc<MatchmakingService>, Arc<RecordingEventPublisher>) {
    let mut config = AppConfig::default();
    config.matchmaking.max_wait_time_ms = max_wait_time_ms;

    let publisher = Arc::new(RecordingEventPublisher::new());
    let service = Arc::new(MatchmakingService::new(
        config,
        publisher.clone(),
        Arc::new(MetricsCollector::new().unwrap()),
    ));

    (service, publisher)
}
