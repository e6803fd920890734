//! Error types for bard-player
//!
//! Collaborator seams (resolver, transport, notification sink) get their own
//! leaf error types; `Error` is what engine operations return to the caller.

use bard_common::GuildId;
use thiserror::Error;

use crate::playback::queue_manager::QueueFull;

/// Failure to turn a reference into playable media
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Resolver process could not be started
    #[error("Failed to start resolver: {0}")]
    Spawn(String),

    /// Resolver ran and reported an error
    #[error("Resolver failed ({status}): {message}")]
    Backend { status: String, message: String },

    /// Resolver output was not the expected document
    #[error("Could not parse resolver output: {0}")]
    Parse(String),

    /// Reference resolved to nothing playable (empty playlist, unavailable entry)
    #[error("Nothing playable found for {0}")]
    NoPlayableItem(String),

    /// Media was found but carried no stream locator
    #[error("No stream available for {0}")]
    MissingStream(String),

    /// Item exists but cannot be played (private, region-locked, age-restricted)
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Failure at the voice transport boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Requester is not in a voice channel and the bot is not connected
    #[error("You must be in a voice channel to play music!")]
    NoVoiceChannel,

    /// Operation needs an active voice connection
    #[error("Not connected to a voice channel in guild {0}")]
    NotConnected(GuildId),

    /// Joining the voice channel failed
    #[error("Failed to join voice channel: {0}")]
    Connect(String),

    /// Transport refused to start a stream
    #[error("Failed to start playback: {0}")]
    Play(String),
}

/// Notification delivery failed (always logged, never escalated)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Main error type for bard-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors bubbled up from bard-common
    #[error(transparent)]
    Common(#[from] bard_common::Error),

    /// Requested reference could not be resolved
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Voice transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Append refused by the queue capacity bound
    #[error(transparent)]
    Queue(#[from] QueueFull),

    /// Notification delivery errors, for callers that surface them
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Convenience Result type using bard-player Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(
            TransportError::NoVoiceChannel.to_string(),
            "You must be in a voice channel to play music!"
        );
        let err: Error = ResolutionError::Unavailable("Private video".to_string()).into();
        assert_eq!(err.to_string(), "Resolution error: Unavailable: Private video");
    }

    #[test]
    fn test_common_error_is_transparent() {
        let err: Error = bard_common::Error::Config("bad".to_string()).into();
        assert_eq!(err.to_string(), "Configuration error: bad");
    }
}
