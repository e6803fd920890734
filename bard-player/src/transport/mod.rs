//! Voice transport seam
//!
//! The transport owns voice connections and the decode pipeline. It may report
//! completion from its own delivery thread, so completion is a one-shot
//! channel: the transport fires [`PlaybackCompletion`] from wherever it likes
//! and the playback driver awaits the matching receiver on the runtime.
//!
//! "Session left" notifications travel the same way, over an unbounded channel
//! drained by the engine.

pub mod simulated;

pub use simulated::SimulatedTransport;

use async_trait::async_trait;
use bard_common::GuildId;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::TransportError;
use crate::playback::events::TransportEvent;
use crate::playback::track::StreamLocator;

/// Voice channel to join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Played to the end
    Finished,
    /// Stopped on request (skip, leave)
    Stopped,
    /// Stream broke during playback
    Failed(String),
    /// Transport dropped the completion without reporting
    Abandoned,
}

impl PlaybackOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, PlaybackOutcome::Failed(_))
    }
}

/// Completion signal handed to [`Transport::play`]
///
/// Safe to fire from any thread. Dropping it without firing is reported to
/// the driver as [`PlaybackOutcome::Abandoned`].
#[derive(Debug)]
pub struct PlaybackCompletion {
    tx: oneshot::Sender<PlaybackOutcome>,
}

impl PlaybackCompletion {
    /// Report the end of the stream
    pub fn complete(self, outcome: PlaybackOutcome) {
        if self.tx.send(outcome).is_err() {
            debug!("Completion fired after the driver stopped listening");
        }
    }

    /// Report in the `(error?)` callback shape transports usually have
    pub fn finish(self, error: Option<String>) {
        match error {
            Some(e) => self.complete(PlaybackOutcome::Failed(e)),
            None => self.complete(PlaybackOutcome::Finished),
        }
    }
}

/// Driver side of a completion channel
#[derive(Debug)]
pub struct CompletionReceiver {
    rx: oneshot::Receiver<PlaybackOutcome>,
}

impl CompletionReceiver {
    /// Wait for the transport to report the end of the stream
    pub async fn wait(self) -> PlaybackOutcome {
        self.rx.await.unwrap_or(PlaybackOutcome::Abandoned)
    }
}

/// Create a linked completion signal and receiver
pub fn completion_channel() -> (PlaybackCompletion, CompletionReceiver) {
    let (tx, rx) = oneshot::channel();
    (PlaybackCompletion { tx }, CompletionReceiver { rx })
}

/// Handle transports use to report connection events to the engine
#[derive(Debug, Clone)]
pub struct TransportEventSender {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportEventSender {
    /// Bot was removed from the guild's voice session by any means
    ///
    /// Callable from any thread.
    pub fn session_left(&self, guild_id: GuildId) {
        if self.tx.send(TransportEvent::SessionLeft { guild_id }).is_err() {
            debug!("Session-left for guild {} dropped: engine not listening", guild_id);
        }
    }
}

/// Engine side of the transport event channel
#[derive(Debug)]
pub struct TransportEventReceiver {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportEventReceiver {
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// Create the channel that carries transport events to the engine
pub fn transport_event_channel() -> (TransportEventSender, TransportEventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TransportEventSender { tx }, TransportEventReceiver { rx })
}

/// Voice transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Join a voice channel in the guild
    async fn connect(&self, guild_id: GuildId, channel: ChannelId) -> Result<(), TransportError>;

    /// Leave the guild's voice channel; stops any active stream
    async fn disconnect(&self, guild_id: GuildId);

    fn is_connected(&self, guild_id: GuildId) -> bool;

    /// Whether a stream is currently being output
    fn is_playing(&self, guild_id: GuildId) -> bool;

    /// Start a stream; `completion` fires when it ends
    async fn play(
        &self,
        guild_id: GuildId,
        stream: &StreamLocator,
        completion: PlaybackCompletion,
    ) -> Result<(), TransportError>;

    /// Stop the active stream, returning whether one was playing
    async fn stop(&self, guild_id: GuildId) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completion_from_another_thread() {
        let (completion, receiver) = completion_channel();
        std::thread::spawn(move || completion.finish(Some("stream reset".to_string())))
            .join()
            .unwrap();
        assert_eq!(
            receiver.wait().await,
            PlaybackOutcome::Failed("stream reset".to_string())
        );
    }

    #[tokio::test]
    async fn test_dropped_completion_is_abandoned() {
        let (completion, receiver) = completion_channel();
        drop(completion);
        assert_eq!(receiver.wait().await, PlaybackOutcome::Abandoned);
    }

    #[tokio::test]
    async fn test_session_left_event() {
        let (tx, mut rx) = transport_event_channel();
        tx.session_left(GuildId(4));
        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::SessionLeft { guild_id: GuildId(4) })
        );
    }

    #[test]
    fn test_outcome_failure() {
        assert!(PlaybackOutcome::Failed("x".into()).is_failure());
        assert!(!PlaybackOutcome::Stopped.is_failure());
        assert!(!PlaybackOutcome::Abandoned.is_failure());
    }
}
