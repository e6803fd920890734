//! # Bard Player Library (bard-player)
//!
//! Per-guild playback scheduler for a voice-channel music bot.
//!
//! **Purpose:** Resolve references into tracks, keep one bounded queue per
//! guild, ingest playlists in the background, and drive playback through a
//! voice transport with a single retry per track and a bounded idle wait
//! before disconnecting.
//!
//! **Architecture:** `PlaybackEngine` owns the session registry and talks to
//! three seams: [`resolver::Resolver`], [`transport::Transport`] and
//! [`notify::NotificationSink`].

pub mod error;
pub mod notify;
pub mod playback;
pub mod resolver;
pub mod transport;

pub use error::{Error, Result};
pub use playback::{EnqueueOutcome, PlayRequest, PlaybackEngine, QueueSnapshot};
