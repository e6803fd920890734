//! Internal transport events (not published on the EventBus)
//!
//! Transports report connection changes through these; the engine's event
//! handler task consumes them on the runtime and turns them into session
//! cleanup. For user-visible events see `bard_common::events::BardEvent`.

use bard_common::GuildId;

/// Events sent by the transport to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Bot was removed from the guild's voice session (kicked, moved out,
    /// disconnected by us, or connection lost)
    SessionLeft { guild_id: GuildId },
}

impl TransportEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            TransportEvent::SessionLeft { guild_id } => *guild_id,
        }
    }
}
