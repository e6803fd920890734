//! Simulated voice transport
//!
//! Stands in for a real voice connection: every stream "plays" for a fixed
//! duration on its own OS thread and then fires its completion from that
//! thread, the same way a real audio pipeline reports from its delivery
//! thread. Used by the dry-run binary.

use async_trait::async_trait;
use bard_common::GuildId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use super::{ChannelId, PlaybackCompletion, PlaybackOutcome, Transport, TransportEventSender};
use crate::error::TransportError;
use crate::playback::track::StreamLocator;

/// Handle to a stream running on its playout thread
struct ActiveStream {
    /// Dropping the sender also stops the stream
    stop_tx: mpsc::Sender<()>,
    playing: Arc<AtomicBool>,
}

impl ActiveStream {
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

struct Link {
    channel: ChannelId,
    stream: Option<ActiveStream>,
}

/// Transport that pretends to play each stream for `track_duration`
pub struct SimulatedTransport {
    links: Mutex<HashMap<GuildId, Link>>,
    track_duration: Duration,
    events: TransportEventSender,
}

impl SimulatedTransport {
    pub fn new(track_duration: Duration, events: TransportEventSender) -> Self {
        Self {
            links: Mutex::new(HashMap::new()),
            track_duration,
            events,
        }
    }

    fn links(&self) -> MutexGuard<'_, HashMap<GuildId, Link>> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Channel the guild is connected to, if any
    pub fn channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.links().get(&guild_id).map(|link| link.channel)
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn connect(&self, guild_id: GuildId, channel: ChannelId) -> Result<(), TransportError> {
        let mut links = self.links();
        if let Some(link) = links.get_mut(&guild_id) {
            debug!("Guild {}: moving from channel {} to {}", guild_id, link.channel, channel);
            link.channel = channel;
            return Ok(());
        }
        info!("Guild {}: connected to channel {}", guild_id, channel);
        links.insert(
            guild_id,
            Link {
                channel,
                stream: None,
            },
        );
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) {
        let removed = self.links().remove(&guild_id);
        if let Some(link) = removed {
            info!("Guild {}: disconnected from channel {}", guild_id, link.channel);
            // Dropping the link stops any stream still running
            drop(link);
            self.events.session_left(guild_id);
        }
    }

    fn is_connected(&self, guild_id: GuildId) -> bool {
        self.links().contains_key(&guild_id)
    }

    fn is_playing(&self, guild_id: GuildId) -> bool {
        self.links()
            .get(&guild_id)
            .and_then(|link| link.stream.as_ref())
            .is_some_and(ActiveStream::is_playing)
    }

    async fn play(
        &self,
        guild_id: GuildId,
        stream: &StreamLocator,
        completion: PlaybackCompletion,
    ) -> Result<(), TransportError> {
        let mut links = self.links();
        let link = links
            .get_mut(&guild_id)
            .ok_or(TransportError::NotConnected(guild_id))?;
        if link.stream.as_ref().is_some_and(ActiveStream::is_playing) {
            return Err(TransportError::Play("Already playing audio.".to_string()));
        }

        let playing = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&playing);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let duration = self.track_duration;
        let locator = stream.to_string();

        std::thread::Builder::new()
            .name(format!("bard-playout-{}", guild_id))
            .spawn(move || {
                debug!("Playout started: {}", locator);
                let outcome = match stop_rx.recv_timeout(duration) {
                    Err(RecvTimeoutError::Timeout) => PlaybackOutcome::Finished,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => PlaybackOutcome::Stopped,
                };
                flag.store(false, Ordering::SeqCst);
                debug!("Playout ended ({:?}): {}", outcome, locator);
                completion.complete(outcome);
            })
            .map_err(|e| TransportError::Play(e.to_string()))?;

        link.stream = Some(ActiveStream { stop_tx, playing });
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> bool {
        let Some(active) = self
            .links()
            .get_mut(&guild_id)
            .and_then(|link| link.stream.take())
        else {
            return false;
        };
        let was_playing = active.is_playing();
        let _ = active.stop_tx.send(());
        was_playing
    }
}
