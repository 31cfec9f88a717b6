//! Common types used throughout the matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for matches
pub type MatchId = Uuid;

/// A completed pairing as seen by one of its two members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match<Id, T> {
    /// Identifier shared by both members
    pub id: Id,
    /// Payload supplied by the other member
    pub counterpart: T,
    /// Whether this member minted the identifier
    pub is_originator: bool,
}

/// Result of a single queue call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOutcome<Id, T> {
    Matched(Match<Id, T>),
    Cancelled,
}

impl<Id, T> QueueOutcome<Id, T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueueOutcome::Cancelled)
    }

    /// The match, if the call paired with someone
    pub fn into_match(self) -> Option<Match<Id, T>> {
        match self {
            QueueOutcome::Matched(matched) => Some(matched),
            QueueOutcome::Cancelled => None,
        }
    }
}

/// Why a player stopped waiting without a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The caller's own token fired
    Caller,
    /// The configured maximum wait elapsed
    Timeout,
    /// The service is shutting down
    Shutdown,
    /// The counterpart failed while completing the match
    CounterpartLost,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::Caller => "caller",
            CancelReason::Timeout => "timeout",
            CancelReason::Shutdown => "shutdown",
            CancelReason::CounterpartLost => "counterpart_lost",
        }
    }
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to be paired with another player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRequest {
    pub player_id: PlayerId,
    pub timestamp: DateTime<Utc>,
}

impl QueueRequest {
    pub fn new(player_id: impl Into<PlayerId>) -> Self {
        Self {
            player_id: player_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Event emitted for each player once their match is made
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFound {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub opponent_id: PlayerId,
    pub is_originator: bool,
    pub wait_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Response to a queue request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueResponse {
    Matched(MatchFound),
    Cancelled {
        player_id: PlayerId,
        reason: CancelReason,
    },
}

impl QueueResponse {
    pub fn is_matched(&self) -> bool {
        matches!(self, QueueResponse::Matched(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_outcome_into_match() {
        let matched: QueueOutcome<u32, &str> = QueueOutcome::Matched(Match {
            id: 3,
            counterpart: "bob",
            is_originator: true,
        });
        assert!(!matched.is_cancelled());
        assert_eq!(matched.into_match().unwrap().counterpart, "bob");

        let cancelled: QueueOutcome<u32, &str> = QueueOutcome::Cancelled;
        assert!(cancelled.is_cancelled());
        assert!(cancelled.into_match().is_none());
    }

    #[test]
    fn test_queue_response_serialization() {
        let response = QueueResponse::Cancelled {
            player_id: "alice".to_string(),
            reason: CancelReason::Timeout,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "Cancelled");
        assert_eq!(json["reason"], "timeout");
        assert_eq!(json["player_id"], "alice");

        let lost = serde_json::to_value(CancelReason::CounterpartLost).unwrap();
        assert_eq!(lost, CancelReason::CounterpartLost.as_str());
    }
}
