//! Pairwise Lobby - random two-player matchmaking rendezvous
//!
//! The core is [`Lobby`], which pairs concurrent callers two at a time with
//! no roster and no background cleanup, and supports cooperative
//! cancellation. Around it sits a small service layer with configuration,
//! metrics, health endpoints and match event publishing.

pub mod config;
pub mod error;
pub mod lobby;
pub mod metrics;
pub mod service;
pub mod simulation;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use lobby::Lobby;
pub use service::{EventPublisher, MatchmakingService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
