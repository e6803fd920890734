//! Diagnostics and event handlers
//!
//! **Responsibilities:**
//! - Queue listing snapshot
//! - Transport event handler (session left)

use bard_common::events::{ClearReason, TrackInfo};
use bard_common::GuildId;
use serde::Serialize;
use tracing::{debug, error, info};

use super::core::PlaybackEngine;
use crate::playback::events::TransportEvent;
use crate::playback::state::DriverState;

/// Read-only view of a guild's queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub guild_id: GuildId,
    pub state: DriverState,
    pub now_playing: Option<TrackInfo>,
    pub upcoming: Vec<TrackInfo>,
    pub ingestion_active: bool,
    pub capacity: usize,
}

impl QueueSnapshot {
    /// Text listing in the chat style ("1. Title")
    pub fn render(&self) -> String {
        if self.upcoming.is_empty() {
            return "The queue is empty.".to_string();
        }
        let lines: Vec<String> = self
            .upcoming
            .iter()
            .enumerate()
            .map(|(i, track)| format!("{}. {}", i + 1, track.title))
            .collect();
        format!("Current queue:\n{}", lines.join("\n"))
    }
}

impl PlaybackEngine {
    /// Snapshot of now playing, upcoming tracks and ingestion status
    ///
    /// Unknown guilds yield an empty idle snapshot without creating a session.
    pub async fn queue_snapshot(&self, guild_id: GuildId) -> QueueSnapshot {
        let Some(session) = self.sessions.get(guild_id).await else {
            return QueueSnapshot {
                guild_id,
                state: DriverState::Idle,
                now_playing: None,
                upcoming: Vec::new(),
                ingestion_active: false,
                capacity: self.settings.max_queue_size.max(1),
            };
        };

        let session = session.lock().await;
        QueueSnapshot {
            guild_id,
            state: session.state(),
            now_playing: session.now_playing().map(|t| t.info()),
            upcoming: session.queue.iter().map(|t| t.info()).collect(),
            ingestion_active: session.ingestion_active(),
            capacity: session.queue.capacity(),
        }
    }

    /// Number of guilds that have a session
    pub async fn session_count(&self) -> usize {
        self.sessions.len().await
    }

    /// Consume transport events until the channel closes
    pub(super) async fn transport_event_handler(&self) {
        let mut rx = match self.transport_event_rx.lock().await.take() {
            Some(rx) => rx,
            None => {
                error!("Transport event receiver already taken!");
                return;
            }
        };

        info!("Transport event handler started");
        while let Some(event) = rx.recv().await {
            match event {
                TransportEvent::SessionLeft { guild_id } => {
                    self.handle_session_left(guild_id).await;
                }
            }
        }
        info!("Transport event handler stopped");
    }

    /// Clear a session after the bot left voice
    ///
    /// Idempotent. When the guild is connected again by the time the event is
    /// handled, the rejoin already cleared what the old link left behind and
    /// the event is dropped. Never creates a session.
    pub async fn handle_session_left(&self, guild_id: GuildId) {
        let Some(session) = self.sessions.get(guild_id).await else {
            debug!("Session left for unknown guild {}", guild_id);
            return;
        };

        let mut session = session.lock().await;
        if self.transport.is_connected(guild_id) {
            debug!("Guild {}: stale session-left, reconnected since", guild_id);
            return;
        }

        let reset = session.reset();
        if let Some(driver) = reset.driver {
            driver.abort();
        }
        drop(session);

        if reset.was_active {
            self.publish_cleared(guild_id, ClearReason::SessionLeft);
        } else {
            debug!("Guild {}: session already clear", guild_id);
        }
    }
}
