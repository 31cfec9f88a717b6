//! Service layer for the pairwise-lobby matchmaking service
//!
//! This module contains the matchmaking service that wraps the lobby, its
//! health checks, and the event publisher seam.

pub mod app;
pub mod health;
pub mod publisher;

pub use app::{MatchmakingService, ServiceStats};
pub use health::{HealthCheck, HealthStatus};
pub use publisher::{EventPublisher, TracingEventPublisher};
