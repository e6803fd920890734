//! Playback driver state

use serde::{Deserialize, Serialize};

/// Where a session's playback driver currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    /// No active stream; the queue may still hold tracks
    #[default]
    Idle,
    /// Exactly one stream is active for the session
    Playing,
    /// Queue is empty while background ingestion is still running
    AwaitingIngestion,
    /// Session was torn down; a new request starts it again
    Disconnected,
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverState::Idle => write!(f, "idle"),
            DriverState::Playing => write!(f, "playing"),
            DriverState::AwaitingIngestion => write!(f, "awaiting_ingestion"),
            DriverState::Disconnected => write!(f, "disconnected"),
        }
    }
}
