//! Queue operations - enqueue, ingestion, skip, clear, leave
//!
//! **Responsibilities:**
//! - `enqueue_from_reference`: resolve the first track, append, kick the driver
//! - Background playlist ingestion (one task per request, interleaving)
//! - Command surface: join, skip, clear queue, leave

use bard_common::config::IngestionMode;
use bard_common::events::{BardEvent, ClearReason, TrackInfo};
use bard_common::GuildId;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::core::PlaybackEngine;
use crate::error::{Error, Result, TransportError};
use crate::notify::NotificationSink;
use crate::playback::session::GuildSession;
use crate::playback::track::{RawEntry, TrackDescriptor};
use crate::transport::ChannelId;

/// A request to play a reference in a guild
#[derive(Clone)]
pub struct PlayRequest {
    pub guild_id: GuildId,
    /// Page reference or search text
    pub reference: String,
    /// Voice channel of the requester, if they are in one
    pub voice_channel: Option<ChannelId>,
    /// Text surface for this session's notices
    pub notifier: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for PlayRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayRequest")
            .field("guild_id", &self.guild_id)
            .field("reference", &self.reference)
            .field("voice_channel", &self.voice_channel)
            .finish_non_exhaustive()
    }
}

/// What happened to the first track of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Queue was idle; the driver was started and will announce the track
    Started { track: TrackInfo },
    /// Appended behind current playback
    Queued { track: TrackInfo, position: usize },
}

impl EnqueueOutcome {
    pub fn track(&self) -> &TrackInfo {
        match self {
            EnqueueOutcome::Started { track } | EnqueueOutcome::Queued { track, .. } => track,
        }
    }
}

/// Counters reported when ingestion finishes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct IngestionSummary {
    added: usize,
    skipped: usize,
    rejected: usize,
}

impl PlaybackEngine {
    /// Resolve `reference`, queue its first track and ingest the rest in the background
    ///
    /// Failing to resolve the first track, or to join voice, fails the
    /// request and leaves the queue untouched. A full queue is reported to
    /// the request's sink and returned as [`Error::Queue`]. Playlist members
    /// beyond the first are handled by a background task whose outcome is
    /// reported as a single summary notice.
    pub async fn enqueue_from_reference(&self, request: PlayRequest) -> Result<EnqueueOutcome> {
        let guild_id = request.guild_id;
        let reference = request.reference.trim().to_string();
        if reference.is_empty() {
            return Err(Error::BadRequest("Nothing to play: empty reference".to_string()));
        }
        if request.voice_channel.is_none() && !self.transport.is_connected(guild_id) {
            return Err(TransportError::NoVoiceChannel.into());
        }

        info!("Guild {}: enqueue {}", guild_id, reference);
        let track = self.resolver.resolve_single(&reference).await.map_err(|e| {
            warn!("Guild {}: could not resolve {}: {}", guild_id, reference, e);
            e
        })?;
        let info = track.info();
        let first_reference = track.canonical_reference.clone();

        let session = self.sessions.get_or_create(guild_id).await;
        let mut session = session.lock().await;
        session.set_notifier(Arc::clone(&request.notifier));

        if !self.transport.is_connected(guild_id) {
            let channel = request.voice_channel.ok_or(TransportError::NoVoiceChannel)?;
            self.connect_locked(&mut session, channel).await?;
        }

        let position = match session.queue.push_back(track) {
            Ok(position) => position,
            Err(full) => {
                warn!("Guild {}: {}", guild_id, full);
                drop(session);
                self.publish(
                    Some(&request.notifier),
                    BardEvent::QueueFull {
                        guild_id,
                        capacity: full.capacity,
                        timestamp: chrono::Utc::now(),
                    },
                )
                .await;
                return Err(full.into());
            }
        };

        let started = self.kick_locked(&mut session);
        self.spawn_ingestion(&mut session, reference, first_reference);
        drop(session);

        if started {
            debug!("Guild {}: driver started for {}", guild_id, info.title);
            return Ok(EnqueueOutcome::Started { track: info });
        }

        self.publish(
            Some(&request.notifier),
            BardEvent::TrackQueued {
                guild_id,
                track: info.clone(),
                position,
                timestamp: chrono::Utc::now(),
            },
        )
        .await;
        Ok(EnqueueOutcome::Queued {
            track: info,
            position,
        })
    }

    /// Spawn the background ingestion task for one request
    ///
    /// Registered under the session lock so the driver sees ingestion as
    /// active before it can observe an empty queue.
    fn spawn_ingestion(
        &self,
        session: &mut GuildSession,
        reference: String,
        first_reference: String,
    ) {
        let guild_id = session.guild_id();
        let generation = session.generation();
        let id = session.next_ingestion_id();

        let self_clone = self.clone_handles();
        let handle = tokio::spawn(async move {
            self_clone
                .ingest(guild_id, generation, id, reference, first_reference)
                .await;
        });
        session.attach_ingestion(id, handle);
    }

    /// Background ingestion of playlist members after the first
    async fn ingest(
        &self,
        guild_id: GuildId,
        generation: u64,
        id: u64,
        reference: String,
        first_reference: String,
    ) {
        let summary = self
            .ingest_listing(guild_id, generation, &reference, &first_reference)
            .await;

        if self
            .with_session(guild_id, generation, |s| s.finish_ingestion(id))
            .await
            .is_none()
        {
            return;
        }

        let Some(summary) = summary else {
            debug!("Guild {}: {} is not a playlist", guild_id, reference);
            return;
        };

        info!(
            "Guild {}: playlist processed ({} added, {} skipped, {} rejected)",
            guild_id, summary.added, summary.skipped, summary.rejected
        );
        let notifier = self.notifier(guild_id).await;
        self.publish(
            notifier.as_ref(),
            BardEvent::IngestionCompleted {
                guild_id,
                added: summary.added,
                skipped: summary.skipped,
                rejected: summary.rejected,
                timestamp: chrono::Utc::now(),
            },
        )
        .await;
    }

    /// Enumerate and append; `None` when there is nothing beyond the first track
    async fn ingest_listing(
        &self,
        guild_id: GuildId,
        generation: u64,
        reference: &str,
        first_reference: &str,
    ) -> Option<IngestionSummary> {
        let entries = match self.resolver.resolve_flat_listing(reference).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Guild {}: listing {} failed: {}", guild_id, reference, e);
                return None;
            }
        };
        if entries.len() <= 1 {
            return None;
        }

        let window = &entries[..entries.len().min(self.settings.max_playlist_items)];
        let start = window
            .iter()
            .position(|e| is_same_item(&e.reference, first_reference))
            .map_or(1, |i| i + 1);
        let remaining = window.get(start..).unwrap_or_default();
        info!(
            "Guild {}: ingesting {} more playlist entries",
            guild_id,
            remaining.len()
        );

        let mut summary = IngestionSummary::default();
        for (index, entry) in remaining.iter().enumerate() {
            let track = match self.prepare_entry(entry).await {
                Ok(track) => track,
                Err(e) => {
                    debug!("Guild {}: skipping entry {}: {}", guild_id, entry.reference, e);
                    summary.skipped += 1;
                    continue;
                }
            };
            if !track.is_lazy() && track.canonical_reference == first_reference {
                debug!("Guild {}: {} is already queued", guild_id, track.title);
                continue;
            }

            let appended = self
                .with_session(guild_id, generation, |s| {
                    let result = s.queue.push_back(track).map(|_| ());
                    if result.is_ok() {
                        self.kick_locked(s);
                    }
                    result
                })
                .await?;

            match appended {
                Ok(()) => summary.added += 1,
                Err(full) => {
                    summary.rejected = remaining.len() - index;
                    warn!(
                        "Guild {}: {}; {} entries not queued",
                        guild_id, full, summary.rejected
                    );
                    let notifier = self.notifier(guild_id).await;
                    self.publish(
                        notifier.as_ref(),
                        BardEvent::QueueFull {
                            guild_id,
                            capacity: full.capacity,
                            timestamp: chrono::Utc::now(),
                        },
                    )
                    .await;
                    break;
                }
            }
        }
        Some(summary)
    }

    /// Descriptor for a listing entry according to the ingestion mode
    async fn prepare_entry(&self, entry: &RawEntry) -> Result<TrackDescriptor> {
        match self.settings.ingestion_mode {
            IngestionMode::Eager => Ok(self.resolver.resolve_lazy_entry(entry).await?),
            IngestionMode::Lazy => {
                if entry.reference.trim().is_empty() {
                    return Err(Error::BadRequest("unavailable playlist entry".to_string()));
                }
                Ok(TrackDescriptor::lazy(entry.clone()))
            }
        }
    }

    /// Join a voice channel without queueing anything
    pub async fn join(&self, guild_id: GuildId, channel: Option<ChannelId>) -> Result<()> {
        let channel = channel.ok_or(TransportError::NoVoiceChannel)?;
        let session = self.sessions.get_or_create(guild_id).await;
        let mut session = session.lock().await;
        if self.transport.is_connected(guild_id) {
            debug!("Guild {}: already connected", guild_id);
            return Ok(());
        }
        self.connect_locked(&mut session, channel).await
    }

    /// Join voice for a locked session
    ///
    /// A session still holding tracks or a driver while the transport reports
    /// no link lost that link before its session-left event was handled. That
    /// leftover state belongs to the old link and is cleared before joining,
    /// so the late event finds the guild connected and has nothing to do.
    async fn connect_locked(&self, session: &mut GuildSession, channel: ChannelId) -> Result<()> {
        let guild_id = session.guild_id();
        if !session.is_idle() {
            let reset = session.reset();
            if let Some(driver) = reset.driver {
                driver.abort();
            }
            debug!(
                "Guild {}: dropped {} tracks left over from the previous link",
                guild_id, reset.removed
            );
            self.publish_cleared(guild_id, ClearReason::SessionLeft);
        }

        info!("Guild {}: joining voice channel {}", guild_id, channel);
        self.transport.connect(guild_id, channel).await?;
        Ok(())
    }

    /// Stop the current track; the driver moves on without a retry
    ///
    /// Returns false when nothing was playing.
    pub async fn skip(&self, guild_id: GuildId) -> bool {
        let stopped = self.transport.stop(guild_id).await;
        if stopped {
            info!("Guild {}: skipped current track", guild_id);
        }
        stopped
    }

    /// Empty the queue and cancel ingestion, leaving the current track playing
    ///
    /// Idempotent; returns the number of tracks removed.
    pub async fn clear_queue(&self, guild_id: GuildId) -> usize {
        let Some(session) = self.sessions.get(guild_id).await else {
            return 0;
        };
        let cleared = session.lock().await.clear_queue();
        if cleared.was_active {
            debug!(
                "Guild {}: cleared {} tracks, cancelled {} ingestions",
                guild_id, cleared.removed, cleared.cancelled_ingestions
            );
            self.publish_cleared(guild_id, ClearReason::UserClear);
        }
        cleared.removed
    }

    /// Disconnect from voice and clear the session
    pub async fn leave(&self, guild_id: GuildId) -> Result<()> {
        if !self.transport.is_connected(guild_id) {
            return Err(TransportError::NotConnected(guild_id).into());
        }

        let session = self.sessions.get_or_create(guild_id).await;
        let mut session = session.lock().await;
        let reset = session.reset();
        if let Some(driver) = reset.driver {
            driver.abort();
        }
        self.transport.disconnect(guild_id).await;
        drop(session);

        info!("Guild {}: left voice channel", guild_id);
        if reset.was_active {
            self.publish_cleared(guild_id, ClearReason::UserLeave);
        }
        Ok(())
    }
}

/// Whether a listing reference names the track resolved as `first_reference`
///
/// Listings may report bare ids where resolution reports a full page
/// reference; a bare id matches when it is one of the reference's path or
/// query components.
fn is_same_item(entry_reference: &str, first_reference: &str) -> bool {
    let entry_reference = entry_reference.trim();
    if entry_reference.is_empty() {
        return false;
    }
    if entry_reference == first_reference {
        return true;
    }
    if entry_reference.contains(['/', ':']) {
        return false;
    }
    first_reference
        .split(['/', '?', '&', '=', '#'])
        .any(|part| part == entry_reference)
}
