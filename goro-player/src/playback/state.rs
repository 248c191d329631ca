//! Session state and control outcomes

use goro_common::types::{ChannelRef, TenantId, TrackRequest};
use serde::{Deserialize, Serialize};

/// Playback session state
///
/// `Idle` means no session: no connection, no player, empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Playing,
    Paused,
}

impl SessionState {
    /// Whether a player is bound to the session
    pub fn is_streaming(&self) -> bool {
        matches!(self, SessionState::Playing | SessionState::Paused)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Playing => write!(f, "playing"),
            SessionState::Paused => write!(f, "paused"),
        }
    }
}

/// Result of an enqueue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnqueueOutcome {
    /// Queue length after the append (1 means the track plays now)
    pub position: usize,
    /// Whether this enqueue started a new session
    pub started: bool,
    pub track: TrackRequest,
}

/// Result of a skip
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipOutcome {
    pub skipped: TrackRequest,
    pub next: Option<TrackRequest>,
    pub remaining: usize,
}

/// One row of a queue listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub position: usize,
    #[serde(flatten)]
    pub track: TrackRequest,
}

/// Point-in-time view of a tenant's session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub tenant: TenantId,
    pub state: SessionState,
    pub channel: Option<ChannelRef>,
    pub current: Option<TrackRequest>,
    pub queue_len: usize,
}

impl SessionStatus {
    pub fn idle(tenant: TenantId) -> Self {
        Self {
            tenant,
            state: SessionState::Idle,
            channel: None,
            current: None,
            queue_len: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display_matches_serde() {
        for state in [
            SessionState::Idle,
            SessionState::Connecting,
            SessionState::Playing,
            SessionState::Paused,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state));
        }
    }

    #[test]
    fn test_only_playing_and_paused_are_streaming() {
        assert!(SessionState::Playing.is_streaming());
        assert!(SessionState::Paused.is_streaming());
        assert!(!SessionState::Connecting.is_streaming());
        assert!(!SessionState::Idle.is_streaming());
    }
}
