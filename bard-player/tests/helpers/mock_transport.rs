//! Recording transport
//!
//! Streams never end on their own: tests finish them explicitly with
//! [`MockTransport::finish`], from a plain thread if they want to mimic a
//! real delivery thread.

use async_trait::async_trait;
use bard_common::GuildId;
use bard_player::error::TransportError;
use bard_player::playback::StreamLocator;
use bard_player::transport::{
    ChannelId, PlaybackCompletion, PlaybackOutcome, Transport, TransportEventSender,
};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    connected: HashMap<GuildId, ChannelId>,
    playing: HashMap<GuildId, PlaybackCompletion>,
    /// Completions of streams cut off by a kick; never fired
    orphaned: Vec<PlaybackCompletion>,
    plays: Vec<(GuildId, String)>,
    connects: Vec<(GuildId, ChannelId)>,
    disconnects: Vec<GuildId>,
    fail_connect: bool,
}

pub struct MockTransport {
    state: Mutex<State>,
    events: TransportEventSender,
}

impl MockTransport {
    pub fn new(events: TransportEventSender) -> Self {
        Self {
            state: Mutex::new(State::default()),
            events,
        }
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.state.lock().unwrap().fail_connect = fail;
    }

    /// Streams handed to `play` for a guild, in order
    pub fn plays(&self, guild_id: GuildId) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .plays
            .iter()
            .filter(|(g, _)| *g == guild_id)
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn connects(&self) -> Vec<(GuildId, ChannelId)> {
        self.state.lock().unwrap().connects.clone()
    }

    pub fn disconnects(&self) -> Vec<GuildId> {
        self.state.lock().unwrap().disconnects.clone()
    }

    /// Fire the completion of the active stream; false if none is active
    pub fn finish(&self, guild_id: GuildId, outcome: PlaybackOutcome) -> bool {
        let completion = self.state.lock().unwrap().playing.remove(&guild_id);
        match completion {
            Some(completion) => {
                completion.complete(outcome);
                true
            }
            None => false,
        }
    }

    /// Fire the completion from another OS thread
    pub fn finish_from_thread(&self, guild_id: GuildId, error: Option<String>) -> bool {
        let completion = self.state.lock().unwrap().playing.remove(&guild_id);
        match completion {
            Some(completion) => {
                std::thread::spawn(move || completion.finish(error))
                    .join()
                    .unwrap();
                true
            }
            None => false,
        }
    }

    /// Bot removed from voice by the platform
    pub fn kick(&self, guild_id: GuildId) {
        {
            let mut state = self.state.lock().unwrap();
            state.connected.remove(&guild_id);
            if let Some(completion) = state.playing.remove(&guild_id) {
                state.orphaned.push(completion);
            }
        }
        self.events.session_left(guild_id);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, guild_id: GuildId, channel: ChannelId) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(TransportError::Connect("missing permissions".to_string()));
        }
        state.connects.push((guild_id, channel));
        state.connected.insert(guild_id, channel);
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) {
        let was_connected = {
            let mut state = self.state.lock().unwrap();
            state.disconnects.push(guild_id);
            if let Some(completion) = state.playing.remove(&guild_id) {
                completion.complete(PlaybackOutcome::Stopped);
            }
            state.connected.remove(&guild_id).is_some()
        };
        if was_connected {
            self.events.session_left(guild_id);
        }
    }

    fn is_connected(&self, guild_id: GuildId) -> bool {
        self.state.lock().unwrap().connected.contains_key(&guild_id)
    }

    fn is_playing(&self, guild_id: GuildId) -> bool {
        self.state.lock().unwrap().playing.contains_key(&guild_id)
    }

    async fn play(
        &self,
        guild_id: GuildId,
        stream: &StreamLocator,
        completion: PlaybackCompletion,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected.contains_key(&guild_id) {
            return Err(TransportError::NotConnected(guild_id));
        }
        if state.playing.contains_key(&guild_id) {
            return Err(TransportError::Play("Already playing audio.".to_string()));
        }
        state.plays.push((guild_id, stream.to_string()));
        state.playing.insert(guild_id, completion);
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> bool {
        let completion = self.state.lock().unwrap().playing.remove(&guild_id);
        match completion {
            Some(completion) => {
                completion.complete(PlaybackOutcome::Stopped);
                true
            }
            None => false,
        }
    }
}
