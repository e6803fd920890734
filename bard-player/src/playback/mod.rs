//! Playback engine, session state and queue management

pub mod engine;
pub mod events;
pub mod queue_manager;
pub mod session;
pub mod state;
pub mod track;

pub use engine::{EnqueueOutcome, PlayRequest, PlaybackEngine, QueueSnapshot};
pub use queue_manager::{GuildQueue, QueueFull};
pub use state::DriverState;
pub use track::{RawEntry, StreamLocator, TrackDescriptor, TrackSource};
