//! Error types for the matchmaking service
//!
//! The lobby itself never fails: cancellation is reported as a
//! [`QueueOutcome`](crate::types::QueueOutcome) value. These errors cover
//! the service wrapped around it.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Failed to publish event for player {player_id}: {reason}")]
    PublishFailed { player_id: String, reason: String },

    #[error("Service is shutting down")]
    ServiceShutdown,

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
