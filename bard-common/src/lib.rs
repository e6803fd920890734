//! # Bard Common Library
//!
//! Shared code for the Bard playback scheduler crates:
//! - Identifier newtypes (guilds, tracks)
//! - Event types (BardEvent enum) and the EventBus
//! - Configuration loading

pub mod config;
pub mod error;
pub mod events;
pub mod ids;

pub use error::{Error, Result};
pub use ids::{GuildId, TrackId};
