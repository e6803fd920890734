//! Per-guild session state and the session registry
//!
//! Each guild gets one `GuildSession` behind its own lock, created on first
//! access. The lock is never held across resolver calls; the only awaits made
//! under it are transport connect/disconnect, which keeps teardown and a
//! concurrent re-join from interleaving.

use bard_common::GuildId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::notify::NotificationSink;
use crate::playback::queue_manager::GuildQueue;
use crate::playback::state::DriverState;
use crate::playback::track::TrackDescriptor;

/// What a reset tore down
#[derive(Debug, Default)]
pub struct SessionReset {
    /// Tracks removed from the queue
    pub removed: usize,
    /// Ingestion tasks aborted
    pub cancelled_ingestions: usize,
    /// Driver task handle, if one was running; the caller decides whether to abort it
    pub driver: Option<JoinHandle<()>>,
    /// Whether anything was actually active before the reset
    pub was_active: bool,
}

/// Mutable playback state of one guild
pub struct GuildSession {
    guild_id: GuildId,
    pub(crate) queue: GuildQueue,
    now_playing: Option<TrackDescriptor>,
    state: DriverState,
    ingestions: HashMap<u64, JoinHandle<()>>,
    next_ingestion_id: u64,
    driver: Option<JoinHandle<()>>,
    driver_active: bool,
    /// Bumped on every reset; tasks started before a reset stop touching state
    generation: u64,
    notifier: Option<Arc<dyn NotificationSink>>,
}

impl GuildSession {
    pub fn new(guild_id: GuildId, capacity: usize) -> Self {
        Self {
            guild_id,
            queue: GuildQueue::new(capacity),
            now_playing: None,
            state: DriverState::Idle,
            ingestions: HashMap::new(),
            next_ingestion_id: 0,
            driver: None,
            driver_active: false,
            generation: 0,
            notifier: None,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn set_state(&mut self, state: DriverState) {
        if self.state != state {
            debug!("Guild {} driver: {} -> {}", self.guild_id, self.state, state);
            self.state = state;
        }
    }

    pub fn now_playing(&self) -> Option<&TrackDescriptor> {
        self.now_playing.as_ref()
    }

    pub fn set_now_playing(&mut self, track: Option<TrackDescriptor>) {
        self.now_playing = track;
    }

    pub fn notifier(&self) -> Option<Arc<dyn NotificationSink>> {
        self.notifier.clone()
    }

    pub fn set_notifier(&mut self, notifier: Arc<dyn NotificationSink>) {
        self.notifier = Some(notifier);
    }

    // ----- ingestion bookkeeping -----

    /// True while any background ingestion for this guild is unfinished
    pub fn ingestion_active(&self) -> bool {
        !self.ingestions.is_empty()
    }

    pub fn ingestion_count(&self) -> usize {
        self.ingestions.len()
    }

    /// Reserve an id for an ingestion task about to be spawned
    pub fn next_ingestion_id(&mut self) -> u64 {
        self.next_ingestion_id += 1;
        self.next_ingestion_id
    }

    /// Track a spawned ingestion task (marks ingestion active)
    pub fn attach_ingestion(&mut self, id: u64, handle: JoinHandle<()>) {
        self.ingestions.insert(id, handle);
    }

    /// Release a finished ingestion task's handle
    pub fn finish_ingestion(&mut self, id: u64) -> bool {
        self.ingestions.remove(&id).is_some()
    }

    /// Abort every in-flight ingestion task
    pub fn cancel_ingestions(&mut self) -> usize {
        let count = self.ingestions.len();
        for (_, handle) in self.ingestions.drain() {
            handle.abort();
        }
        count
    }

    // ----- driver bookkeeping -----

    pub fn driver_active(&self) -> bool {
        self.driver_active
    }

    /// Mark the driver as running; returns the generation it runs under
    pub fn claim_driver(&mut self) -> u64 {
        self.driver_active = true;
        self.generation
    }

    pub fn attach_driver(&mut self, handle: JoinHandle<()>) {
        self.driver = Some(handle);
    }

    // ----- lifecycle -----

    /// Nothing queued, nothing playing, nothing being ingested
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
            && self.now_playing.is_none()
            && !self.driver_active
            && self.ingestions.is_empty()
    }

    /// Empty the queue and cancel ingestion, keeping the driver and current track
    pub fn clear_queue(&mut self) -> SessionReset {
        let removed = self.queue.clear();
        let cancelled_ingestions = self.cancel_ingestions();
        SessionReset {
            removed,
            cancelled_ingestions,
            driver: None,
            was_active: removed > 0 || cancelled_ingestions > 0,
        }
    }

    /// Return the session to its freshly created state
    ///
    /// Idempotent: resetting an idle session reports `was_active == false`.
    pub fn reset(&mut self) -> SessionReset {
        let was_active = !self.is_idle();
        let mut reset = self.clear_queue();
        reset.was_active = was_active;
        reset.driver = self.driver.take();
        self.driver_active = false;
        self.now_playing = None;
        if was_active {
            self.generation += 1;
            self.set_state(DriverState::Disconnected);
        }
        reset
    }
}

/// Registry of guild sessions, created lazily
pub struct SessionRegistry {
    sessions: RwLock<HashMap<GuildId, Arc<Mutex<GuildSession>>>>,
    capacity: usize,
}

impl SessionRegistry {
    /// `capacity` is the queue bound given to every new session
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Session for a guild, created on first access
    pub async fn get_or_create(&self, guild_id: GuildId) -> Arc<Mutex<GuildSession>> {
        if let Some(session) = self.sessions.read().await.get(&guild_id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(guild_id).or_insert_with(|| {
            debug!("Creating session for guild {}", guild_id);
            Arc::new(Mutex::new(GuildSession::new(guild_id, self.capacity)))
        });
        Arc::clone(session)
    }

    /// Existing session, without creating one
    pub async fn get(&self, guild_id: GuildId) -> Option<Arc<Mutex<GuildSession>>> {
        self.sessions.read().await.get(&guild_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn guild_ids(&self) -> Vec<GuildId> {
        let mut ids: Vec<GuildId> = self.sessions.read().await.keys().copied().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::track::StreamLocator;

    fn track(name: &str) -> TrackDescriptor {
        TrackDescriptor::resolved(Some(name.to_string()), name, StreamLocator::new(name))
    }

    #[tokio::test]
    async fn test_registry_creates_lazily_and_reuses() {
        let registry = SessionRegistry::new(5);
        assert!(registry.is_empty().await);
        assert!(registry.get(GuildId(1)).await.is_none());

        let a = registry.get_or_create(GuildId(1)).await;
        let b = registry.get_or_create(GuildId(1)).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.lock().await.queue.capacity(), 5);

        registry.get_or_create(GuildId(2)).await;
        assert_eq!(registry.guild_ids().await, vec![GuildId(1), GuildId(2)]);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let registry = SessionRegistry::new(5);
        let a = registry.get_or_create(GuildId(1)).await;
        let b = registry.get_or_create(GuildId(2)).await;

        a.lock().await.queue.push_back(track("x")).unwrap();
        assert_eq!(a.lock().await.queue.len(), 1);
        assert!(b.lock().await.queue.is_empty());
    }

    #[tokio::test]
    async fn test_ingestion_bookkeeping() {
        let mut session = GuildSession::new(GuildId(1), 10);
        assert!(!session.ingestion_active());

        let id = session.next_ingestion_id();
        session.attach_ingestion(id, tokio::spawn(std::future::pending::<()>()));
        assert!(session.ingestion_active());

        assert!(session.finish_ingestion(id));
        assert!(!session.finish_ingestion(id));
        assert!(!session.ingestion_active());
    }

    #[tokio::test]
    async fn test_reset_cancels_ingestion_and_is_idempotent() {
        let mut session = GuildSession::new(GuildId(1), 10);
        session.queue.push_back(track("a")).unwrap();
        let id = session.next_ingestion_id();
        let handle = tokio::spawn(std::future::pending::<()>());
        let abort_probe = handle.abort_handle();
        session.attach_ingestion(id, handle);
        let generation = session.generation();

        let reset = session.reset();
        assert!(reset.was_active);
        assert_eq!(reset.removed, 1);
        assert_eq!(reset.cancelled_ingestions, 1);
        assert!(session.queue.is_empty());
        assert!(!session.ingestion_active());
        assert_eq!(session.generation(), generation + 1);
        assert_eq!(session.state(), DriverState::Disconnected);

        tokio::task::yield_now().await;
        assert!(abort_probe.is_finished());

        let again = session.reset();
        assert!(!again.was_active);
        assert_eq!(again.removed, 0);
        assert_eq!(session.generation(), generation + 1);
    }

    #[tokio::test]
    async fn test_clear_queue_keeps_driver() {
        let mut session = GuildSession::new(GuildId(1), 10);
        session.claim_driver();
        session.set_now_playing(Some(track("current")));
        session.queue.push_back(track("a")).unwrap();

        let cleared = session.clear_queue();
        assert_eq!(cleared.removed, 1);
        assert!(session.driver_active());
        assert!(session.now_playing().is_some());
        assert!(session.queue.is_empty());
    }
}
