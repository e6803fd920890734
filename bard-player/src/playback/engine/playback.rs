//! Playback driver - one task per active guild session
//!
//! **Responsibilities:**
//! - Pop the next track, resolve it late if it is lazy, hand it to the transport
//! - Await the completion signal and apply the retry policy
//! - Bounded idle wait while ingestion is still running, then disconnect
//!
//! The driver is a loop rather than a chain of callbacks: the transport's
//! completion arrives on a one-shot channel and the loop continues from there
//! on the runtime, so no session state is touched from transport threads.

use bard_common::events::{BardEvent, ClearReason, DropReason};
use bard_common::GuildId;
use tracing::{debug, info, warn};

use super::core::PlaybackEngine;
use crate::playback::state::DriverState;
use crate::playback::track::TrackDescriptor;
use crate::transport::{completion_channel, PlaybackOutcome};

impl PlaybackEngine {
    /// Driver loop for one guild
    ///
    /// Exits when the queue is exhausted (after disconnecting) or when the
    /// session is reset under it.
    pub(super) async fn drive(&self, guild_id: GuildId, generation: u64) {
        debug!("Driver for guild {} running", guild_id);

        loop {
            let next = self
                .with_session(guild_id, generation, |s| {
                    let track = s.queue.pop_front()?;
                    s.set_now_playing(Some(track.clone()));
                    s.set_state(DriverState::Playing);
                    Some(track)
                })
                .await;

            let track = match next {
                None => {
                    debug!("Driver for guild {} superseded", guild_id);
                    return;
                }
                Some(Some(track)) => track,
                Some(None) => {
                    if self.await_ingestion(guild_id, generation).await {
                        continue;
                    }
                    if self.finish(guild_id, generation).await {
                        return;
                    }
                    continue;
                }
            };

            self.play_track(guild_id, generation, track).await;

            let still_current = self
                .with_session(guild_id, generation, |s| {
                    s.set_now_playing(None);
                    s.set_state(DriverState::Idle);
                })
                .await;
            if still_current.is_none() {
                return;
            }
        }
    }

    /// Play one track to completion, retrying a failure once
    async fn play_track(&self, guild_id: GuildId, generation: u64, mut track: TrackDescriptor) {
        let notifier = self.notifier(guild_id).await;

        if let Some(entry) = track.raw_entry().cloned() {
            debug!("Guild {}: resolving {} before playback", guild_id, entry.reference);
            match self.resolver.resolve_lazy_entry(&entry).await {
                Ok(fresh) => track = track.with_resolution(fresh),
                Err(e) => {
                    warn!("Guild {}: dropping {}: {}", guild_id, track.title, e);
                    self.publish_dropped(guild_id, &track, DropReason::ResolutionFailed);
                    return;
                }
            }
        }

        let Some(stream) = track.stream_locator().filter(|s| !s.is_empty()).cloned() else {
            warn!("Guild {}: {} has no stream, dropping", guild_id, track.title);
            self.publish_dropped(guild_id, &track, DropReason::ResolutionFailed);
            return;
        };

        let (completion, receiver) = completion_channel();
        if let Err(e) = self.transport.play(guild_id, &stream, completion).await {
            warn!("Guild {}: transport refused {}: {}", guild_id, track.title, e);
            self.publish_dropped(guild_id, &track, DropReason::TransportRejected);
            return;
        }

        let first_play = track.mark_announced();
        let snapshot = track.clone();
        if self
            .with_session(guild_id, generation, |s| s.set_now_playing(Some(snapshot)))
            .await
            .is_none()
        {
            return;
        }

        if first_play {
            info!("Guild {}: now playing {}", guild_id, track.title);
            self.publish(
                notifier.as_ref(),
                BardEvent::NowPlaying {
                    guild_id,
                    track: track.info(),
                    timestamp: chrono::Utc::now(),
                },
            )
            .await;
        } else {
            info!("Guild {}: replaying {}", guild_id, track.title);
        }

        match receiver.wait().await {
            PlaybackOutcome::Finished => debug!("Guild {}: finished {}", guild_id, track.title),
            PlaybackOutcome::Stopped => debug!("Guild {}: stopped {}", guild_id, track.title),
            PlaybackOutcome::Abandoned => {
                warn!("Guild {}: transport abandoned {}", guild_id, track.title)
            }
            PlaybackOutcome::Failed(error) => {
                self.retry_or_drop(guild_id, generation, track, error).await;
            }
        }
    }

    /// Re-queue a failed track at the front, once
    async fn retry_or_drop(
        &self,
        guild_id: GuildId,
        generation: u64,
        track: TrackDescriptor,
        error: String,
    ) {
        if !track.can_retry() {
            warn!(
                "Guild {}: {} failed again ({}), dropping",
                guild_id, track.title, error
            );
            self.publish_dropped(guild_id, &track, DropReason::RetryExhausted);
            return;
        }

        warn!("Guild {}: {} failed ({}), retrying", guild_id, track.title, error);
        let fresh = match self.resolver.resolve_single(&track.canonical_reference).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!("Guild {}: could not re-resolve {}: {}", guild_id, track.title, e);
                self.publish_dropped(guild_id, &track, DropReason::RetryResolutionFailed);
                return;
            }
        };

        let retry = track.into_retry(fresh);
        let info = retry.info();
        match self
            .with_session(guild_id, generation, |s| s.queue.push_front(retry))
            .await
        {
            None => {}
            Some(Ok(())) => {
                self.event_bus.emit_lossy(BardEvent::TrackRetrying {
                    guild_id,
                    track: info,
                    error,
                    timestamp: chrono::Utc::now(),
                });
            }
            Some(Err(full)) => {
                warn!("Guild {}: cannot retry {}: {}", guild_id, info.title, full);
                self.publish_dropped(guild_id, &full.track, DropReason::QueueFull);
            }
        }
    }

    /// Bounded wait for ingestion to supply another track
    ///
    /// Returns true as soon as the queue is non-empty. Returns false right
    /// away when no ingestion is running, or after the last poll.
    async fn await_ingestion(&self, guild_id: GuildId, generation: u64) -> bool {
        let waiting = self
            .with_session(guild_id, generation, |s| {
                if s.ingestion_active() {
                    s.set_state(DriverState::AwaitingIngestion);
                    true
                } else {
                    false
                }
            })
            .await;
        if waiting != Some(true) {
            return false;
        }

        let interval = self.settings.idle_poll_interval();
        let attempts = self.settings.idle_poll_attempts;
        debug!(
            "Guild {}: queue empty, waiting up to {} x {:?} for ingestion",
            guild_id, attempts, interval
        );

        for attempt in 1..=attempts {
            tokio::time::sleep(interval).await;
            match self
                .with_session(guild_id, generation, |s| !s.queue.is_empty())
                .await
            {
                None => return false,
                Some(true) => {
                    debug!("Guild {}: new track after {} polls", guild_id, attempt);
                    return true;
                }
                Some(false) => {}
            }
        }

        info!("Guild {}: idle wait expired", guild_id);
        false
    }

    /// Clear the session and disconnect when the queue stayed empty
    ///
    /// Returns false if a track arrived in the meantime and the driver
    /// should keep going.
    async fn finish(&self, guild_id: GuildId, generation: u64) -> bool {
        let Some(session) = self.sessions.get(guild_id).await else {
            return true;
        };
        let mut session = session.lock().await;
        if session.generation() != generation {
            return true;
        }
        if !session.queue.is_empty() {
            return false;
        }

        let notifier = session.notifier();
        // The driver handle returned here is our own; dropping it detaches.
        let reset = session.reset();
        debug!(
            "Guild {}: queue exhausted, cancelled {} ingestions",
            guild_id, reset.cancelled_ingestions
        );

        info!("Guild {}: queue empty, disconnecting", guild_id);
        // Disconnect before unlocking; a request waiting on the lock then sees no link.
        self.transport.disconnect(guild_id).await;
        drop(session);

        self.publish(
            notifier.as_ref(),
            BardEvent::QueueEmpty {
                guild_id,
                timestamp: chrono::Utc::now(),
            },
        )
        .await;
        self.publish_cleared(guild_id, ClearReason::QueueExhausted);
        true
    }

    fn publish_dropped(&self, guild_id: GuildId, track: &TrackDescriptor, reason: DropReason) {
        self.event_bus.emit_lossy(BardEvent::TrackDropped {
            guild_id,
            track: track.info(),
            reason,
            timestamp: chrono::Utc::now(),
        });
    }
}
