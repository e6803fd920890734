//! Test helper modules for bard-player integration tests
//!
//! Provides reusable test infrastructure components:
//! - MockResolver: scripted resolution and listings
//! - MockTransport: records connects/plays, completions fired by the test
//! - RecordingSink: captures user-facing notices
//! - Harness: engine wired to all three

#![allow(dead_code)]

pub mod mock_resolver;
pub mod mock_transport;
pub mod recording_sink;

pub use mock_resolver::{playlist, stream_of, Listing, MockResolver};
pub use mock_transport::MockTransport;
pub use recording_sink::RecordingSink;

use bard_common::config::PlayerSettings;
use bard_common::events::BardEvent;
use bard_common::GuildId;
use bard_player::transport::{transport_event_channel, ChannelId};
use bard_player::{EnqueueOutcome, PlayRequest, PlaybackEngine, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub const GUILD: GuildId = GuildId(1);
pub const VOICE: ChannelId = ChannelId(10);

/// Engine wired to mocks, with a subscription opened before any activity
pub struct Harness {
    pub engine: PlaybackEngine,
    pub resolver: Arc<MockResolver>,
    pub transport: Arc<MockTransport>,
    pub sink: Arc<RecordingSink>,
    events: broadcast::Receiver<BardEvent>,
    seen: Vec<BardEvent>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_settings(PlayerSettings::default()).await
    }

    pub async fn with_settings(settings: PlayerSettings) -> Self {
        let (events_tx, events_rx) = transport_event_channel();
        let resolver = Arc::new(MockResolver::new());
        let transport = Arc::new(MockTransport::new(events_tx));
        let engine = PlaybackEngine::new(
            settings,
            resolver.clone(),
            transport.clone(),
            events_rx,
        );
        engine.start().await;
        let events = engine.subscribe_events();

        Self {
            engine,
            resolver,
            transport,
            sink: Arc::new(RecordingSink::new()),
            events,
            seen: Vec::new(),
        }
    }

    pub fn request(&self, guild_id: GuildId, reference: &str) -> PlayRequest {
        PlayRequest {
            guild_id,
            reference: reference.to_string(),
            voice_channel: Some(VOICE),
            notifier: self.sink.clone(),
        }
    }

    /// Enqueue in the default guild
    pub async fn play(&self, reference: &str) -> Result<EnqueueOutcome> {
        self.engine
            .enqueue_from_reference(self.request(GUILD, reference))
            .await
    }

    /// Every event published so far
    pub fn events(&mut self) -> Vec<BardEvent> {
        while let Ok(event) = self.events.try_recv() {
            self.seen.push(event);
        }
        self.seen.clone()
    }

    pub fn count_events(&mut self, matches: impl Fn(&BardEvent) -> bool) -> usize {
        self.events().iter().filter(|e| matches(e)).count()
    }
}

/// Let spawned tasks run without advancing the clock
pub async fn settle() {
    for _ in 0..200 {
        tokio::task::yield_now().await;
    }
}

/// Yield until `condition` holds, without advancing the clock
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..2000 {
        if condition() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    condition()
}

/// Sleep in small steps until `condition` holds (advances a paused clock)
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
