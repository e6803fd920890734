//! Core playback engine - construction, lifecycle and shared plumbing
//!
//! **Responsibilities:**
//! - PlaybackEngine struct definition and initialization
//! - Lifecycle control (start, shutdown)
//! - Session access guarded by generation, driver spawning
//! - Event publication (EventBus + session notification sink)

use bard_common::config::PlayerSettings;
use bard_common::events::{BardEvent, ClearReason, EventBus};
use bard_common::GuildId;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::notify::NotificationSink;
use crate::playback::session::{GuildSession, SessionRegistry};
use crate::resolver::Resolver;
use crate::transport::{Transport, TransportEventReceiver};

/// Playback engine - coordinates every guild session
///
/// Owns the session registry and the collaborator handles. Cheap to clone
/// through `clone_handles()`; background tasks each carry their own copy.
pub struct PlaybackEngine {
    /// Scheduler settings (capacity, idle wait, ingestion mode)
    pub(super) settings: Arc<PlayerSettings>,

    /// Resolution backend
    pub(super) resolver: Arc<dyn Resolver>,

    /// Voice transport
    pub(super) transport: Arc<dyn Transport>,

    /// Per-guild sessions, created on first access
    pub(super) sessions: Arc<SessionRegistry>,

    /// Event broadcast for observers
    pub(super) event_bus: EventBus,

    /// Transport event receiver, taken by the handler on start
    pub(super) transport_event_rx: Arc<Mutex<Option<TransportEventReceiver>>>,

    /// Transport event handler task
    pub(super) handler: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PlaybackEngine {
    /// Create a new playback engine
    ///
    /// `transport_events` is the receiving end of the channel the transport
    /// was built with; it is consumed once `start()` runs.
    pub fn new(
        settings: PlayerSettings,
        resolver: Arc<dyn Resolver>,
        transport: Arc<dyn Transport>,
        transport_events: TransportEventReceiver,
    ) -> Self {
        info!(
            "Creating playback engine (max queue: {}, playlist items: {}, ingestion: {:?})",
            settings.max_queue_size, settings.max_playlist_items, settings.ingestion_mode
        );

        Self {
            sessions: Arc::new(SessionRegistry::new(settings.max_queue_size)),
            event_bus: EventBus::new(settings.event_bus_capacity),
            settings: Arc::new(settings),
            resolver,
            transport,
            transport_event_rx: Arc::new(Mutex::new(Some(transport_events))),
            handler: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the transport event handler
    ///
    /// Calling it twice is harmless; the second handler finds the receiver
    /// already taken and exits.
    pub async fn start(&self) {
        info!("Starting playback engine");

        let self_clone = self.clone_handles();
        let handle = tokio::spawn(async move {
            self_clone.transport_event_handler().await;
        });

        let mut slot = self.handler.lock().await;
        if slot.is_none() {
            *slot = Some(handle);
        }
    }

    /// Leave every connected guild and stop the event handler
    pub async fn shutdown(&self) {
        info!("Shutting down playback engine");
        for guild_id in self.sessions.guild_ids().await {
            if self.transport.is_connected(guild_id) {
                if let Err(e) = self.leave(guild_id).await {
                    warn!("Failed to leave guild {} during shutdown: {}", guild_id, e);
                }
            }
        }
        if let Some(handle) = self.handler.lock().await.take() {
            handle.abort();
        }
    }

    /// Subscribe to every event the engine publishes
    pub fn subscribe_events(&self) -> broadcast::Receiver<BardEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    /// Clone the shared handles for a background task
    pub(super) fn clone_handles(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            resolver: Arc::clone(&self.resolver),
            transport: Arc::clone(&self.transport),
            sessions: Arc::clone(&self.sessions),
            event_bus: self.event_bus.clone(),
            transport_event_rx: Arc::clone(&self.transport_event_rx),
            handler: Arc::clone(&self.handler),
        }
    }

    /// Run `f` on the session if it is still at `generation`
    ///
    /// Returns `None` when the session was reset (or never existed), which
    /// tells a background task its work is stale.
    pub(super) async fn with_session<T>(
        &self,
        guild_id: GuildId,
        generation: u64,
        f: impl FnOnce(&mut GuildSession) -> T,
    ) -> Option<T> {
        let session = self.sessions.get(guild_id).await?;
        let mut session = session.lock().await;
        if session.generation() != generation {
            debug!(
                "Guild {} moved to generation {} (task had {})",
                guild_id,
                session.generation(),
                generation
            );
            return None;
        }
        Some(f(&mut session))
    }

    /// Current notification sink of a guild
    pub(super) async fn notifier(&self, guild_id: GuildId) -> Option<Arc<dyn NotificationSink>> {
        let session = self.sessions.get(guild_id).await?;
        let session = session.lock().await;
        session.notifier()
    }

    /// Start the driver unless one is running or the transport is busy
    ///
    /// Must be called with the session locked. Returns true if a driver was
    /// started.
    pub(super) fn kick_locked(&self, session: &mut GuildSession) -> bool {
        let guild_id = session.guild_id();
        if session.driver_active() || self.transport.is_playing(guild_id) {
            return false;
        }

        let generation = session.claim_driver();
        debug!("Starting driver for guild {} (generation {})", guild_id, generation);

        let self_clone = self.clone_handles();
        let handle = tokio::spawn(async move {
            self_clone.drive(guild_id, generation).await;
        });
        session.attach_driver(handle);
        true
    }

    /// Publish on the bus and deliver user-facing events to the sink
    ///
    /// Sink failures are logged and otherwise ignored.
    pub(super) async fn publish(
        &self,
        notifier: Option<&Arc<dyn NotificationSink>>,
        event: BardEvent,
    ) {
        if event.user_message().is_some() {
            if let Some(sink) = notifier {
                if let Err(e) = sink.deliver(&event).await {
                    warn!(guild_id = %event.guild_id(), "{}", e);
                }
            }
        }
        self.event_bus.emit_lossy(event);
    }

    /// Publish a session-cleared event (never user-facing)
    pub(super) fn publish_cleared(&self, guild_id: GuildId, reason: ClearReason) {
        info!("Session for guild {} cleared ({})", guild_id, reason);
        self.event_bus.emit_lossy(BardEvent::SessionCleared {
            guild_id,
            reason,
            timestamp: chrono::Utc::now(),
        });
    }
}
