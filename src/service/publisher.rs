//! Match event publishing
//!
//! Delivering `MatchFound` events to players is a transport concern. The
//! service only talks to the [`EventPublisher`] trait; the default
//! implementation writes events to the log.

use crate::error::{MatchmakingError, Result};
use crate::types::MatchFound;
use async_trait::async_trait;
use tracing::info;

/// Trait for publishing matchmaking events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a MatchFound event
    async fn publish_match_found(&self, event: MatchFound) -> Result<()>;
}

/// Publisher that emits events as structured log records
#[derive(Debug, Clone, Default)]
pub struct TracingEventPublisher;

impl TracingEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        let payload =
            serde_json::to_string(&event).map_err(|e| MatchmakingError::PublishFailed {
                player_id: event.player_id.clone(),
                reason: e.to_string(),
            })?;

        info!(
            match_id = %event.match_id,
            player_id = %event.player_id,
            "MatchFound {}",
            payload
        );
        Ok(())
    }
}
