//! Queue and session lifecycle type definitions

use serde::{Deserialize, Serialize};

/// Why a session's state was cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ClearReason {
    /// Queue ran dry and no ingestion was pending (or the grace period expired)
    QueueExhausted,
    /// Transport reported that the bot left the voice session
    SessionLeft,
    /// User asked to clear the queue
    UserClear,
    /// User asked the bot to leave
    UserLeave,
}

impl std::fmt::Display for ClearReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClearReason::QueueExhausted => write!(f, "QueueExhausted"),
            ClearReason::SessionLeft => write!(f, "SessionLeft"),
            ClearReason::UserClear => write!(f, "UserClear"),
            ClearReason::UserLeave => write!(f, "UserLeave"),
        }
    }
}

/// Why a track left the queue without finishing playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DropReason {
    /// Late resolution of a lazy entry failed
    ResolutionFailed,
    /// Playback failed again after the single retry
    RetryExhausted,
    /// Re-resolving the track for its retry failed
    RetryResolutionFailed,
    /// Transport refused to start the stream
    TransportRejected,
    /// Retry could not be re-queued because the queue is at capacity
    QueueFull,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::ResolutionFailed => write!(f, "ResolutionFailed"),
            DropReason::RetryExhausted => write!(f, "RetryExhausted"),
            DropReason::RetryResolutionFailed => write!(f, "RetryResolutionFailed"),
            DropReason::TransportRejected => write!(f, "TransportRejected"),
            DropReason::QueueFull => write!(f, "QueueFull"),
        }
    }
}
