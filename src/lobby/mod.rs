//! Pairwise matchmaking rendezvous
//!
//! This module holds the lobby that pairs concurrent callers two at a time,
//! and the one-shot messages a matched pair exchanges.

mod announcement;
pub mod instance;

// Re-export commonly used types
pub use instance::Lobby;
