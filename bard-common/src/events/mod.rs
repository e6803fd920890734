//! Event types for the Bard event system
//!
//! Provides shared event definitions and the EventBus used by the scheduler.

mod queue_types;
mod shared_types;

pub use queue_types::{ClearReason, DropReason};
pub use shared_types::TrackInfo;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::ids::GuildId;

/// Bard event types
///
/// Every state transition worth observing is published as one of these on the
/// EventBus. A subset is also user-facing: those render a chat message through
/// [`BardEvent::user_message`] and are delivered to the session's notification sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BardEvent {
    /// A track started playing (emitted once per track, never on retry)
    NowPlaying {
        guild_id: GuildId,
        track: TrackInfo,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track was appended behind something already playing
    TrackQueued {
        guild_id: GuildId,
        track: TrackInfo,
        /// 1-based position in the upcoming queue
        position: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An append was rejected because the queue is at capacity
    QueueFull {
        guild_id: GuildId,
        capacity: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue ran dry; the session is about to disconnect
    QueueEmpty {
        guild_id: GuildId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Background playlist ingestion finished
    IngestionCompleted {
        guild_id: GuildId,
        /// Entries resolved and appended
        added: usize,
        /// Entries whose resolution failed
        skipped: usize,
        /// Entries resolved but refused by the capacity bound
        rejected: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback of a track failed and it was re-queued at the front
    TrackRetrying {
        guild_id: GuildId,
        track: TrackInfo,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track was removed without completing
    TrackDropped {
        guild_id: GuildId,
        track: TrackInfo,
        reason: DropReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session state was reset
    SessionCleared {
        guild_id: GuildId,
        reason: ClearReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl BardEvent {
    /// Guild the event belongs to
    pub fn guild_id(&self) -> GuildId {
        match self {
            BardEvent::NowPlaying { guild_id, .. }
            | BardEvent::TrackQueued { guild_id, .. }
            | BardEvent::QueueFull { guild_id, .. }
            | BardEvent::QueueEmpty { guild_id, .. }
            | BardEvent::IngestionCompleted { guild_id, .. }
            | BardEvent::TrackRetrying { guild_id, .. }
            | BardEvent::TrackDropped { guild_id, .. }
            | BardEvent::SessionCleared { guild_id, .. } => *guild_id,
        }
    }

    /// Default chat text for user-facing events
    ///
    /// Returns `None` for events that are only logged and published on the bus.
    pub fn user_message(&self) -> Option<String> {
        match self {
            BardEvent::NowPlaying { track, .. } => {
                Some(format!("Now playing: **{}**", track.link()))
            }
            BardEvent::TrackQueued { track, position, .. } => Some(format!(
                "Song **{}** has been added to the queue (position {}).",
                track.link(),
                position
            )),
            BardEvent::QueueFull { capacity, .. } => {
                Some(format!("The queue is full (max {} songs)!", capacity))
            }
            BardEvent::QueueEmpty { .. } => {
                Some("The queue is empty, disconnecting.".to_string())
            }
            BardEvent::IngestionCompleted {
                added,
                skipped,
                rejected,
                ..
            } => {
                let mut text = format!("Playlist processed: {} added, {} skipped", added, skipped);
                if *rejected > 0 {
                    text.push_str(&format!(", {} rejected (queue full)", rejected));
                }
                text.push('.');
                Some(text)
            }
            BardEvent::TrackRetrying { .. }
            | BardEvent::TrackDropped { .. }
            | BardEvent::SessionCleared { .. } => None,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Wraps tokio::broadcast: publishing never blocks, slow subscribers see
/// `Lagged` instead of stalling producers, and dropped receivers clean up
/// automatically.
///
/// # Examples
///
/// ```
/// use bard_common::events::{BardEvent, EventBus};
/// use bard_common::GuildId;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(BardEvent::QueueEmpty {
///     guild_id: GuildId(1),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BardEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<BardEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: BardEvent,
    ) -> Result<usize, broadcast::error::SendError<BardEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: BardEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
