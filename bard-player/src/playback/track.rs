//! Track descriptors
//!
//! A descriptor is either `Lazy` (only a raw listing entry is known) or
//! `Resolved` (a stream locator is available). Only resolved descriptors with a
//! non-empty locator are handed to the transport.

use bard_common::events::TrackInfo;
use bard_common::TrackId;
use serde::{Deserialize, Serialize};

/// Title used when resolution metadata has none
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// A track is retried at most this many times after a playback failure
pub const MAX_RETRIES: u8 = 1;

/// Ephemeral handle to the audio bytes of a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamLocator(String);

impl StreamLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for StreamLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lightweight playlist member from a flat listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Page-level reference (or bare id) of the entry; empty when the listing
    /// reported the entry as unavailable
    pub reference: String,
    /// Title, when the listing carried one
    pub title: Option<String>,
}

impl RawEntry {
    pub fn new(reference: impl Into<String>, title: Option<String>) -> Self {
        Self {
            reference: reference.into(),
            title,
        }
    }
}

/// Resolution state of a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum TrackSource {
    /// Not resolved yet; resolve the entry right before playback
    Lazy(RawEntry),
    /// Ready to hand to the transport
    Resolved(StreamLocator),
}

/// Unit of playable media tracked in a session queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub id: TrackId,
    pub title: String,
    /// Stable reference usable to re-resolve the track
    pub canonical_reference: String,
    pub source: TrackSource,
    pub retry_count: u8,
    /// Set once the "now playing" notice went out
    pub announced: bool,
}

impl TrackDescriptor {
    /// Build a resolved descriptor
    ///
    /// Missing or blank titles fall back to [`UNKNOWN_TITLE`].
    pub fn resolved(
        title: Option<String>,
        canonical_reference: impl Into<String>,
        stream: StreamLocator,
    ) -> Self {
        Self {
            id: TrackId::new(),
            title: normalize_title(title),
            canonical_reference: canonical_reference.into(),
            source: TrackSource::Resolved(stream),
            retry_count: 0,
            announced: false,
        }
    }

    /// Build a lazy descriptor from a listing entry
    pub fn lazy(entry: RawEntry) -> Self {
        Self {
            id: TrackId::new(),
            title: normalize_title(entry.title.clone()),
            canonical_reference: entry.reference.clone(),
            source: TrackSource::Lazy(entry),
            retry_count: 0,
            announced: false,
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.source, TrackSource::Lazy(_))
    }

    /// Resolved with a usable stream locator
    pub fn is_playable(&self) -> bool {
        matches!(&self.source, TrackSource::Resolved(stream) if !stream.is_empty())
    }

    pub fn stream_locator(&self) -> Option<&StreamLocator> {
        match &self.source {
            TrackSource::Resolved(stream) => Some(stream),
            TrackSource::Lazy(_) => None,
        }
    }

    pub fn raw_entry(&self) -> Option<&RawEntry> {
        match &self.source {
            TrackSource::Lazy(entry) => Some(entry),
            TrackSource::Resolved(_) => None,
        }
    }

    /// Take title, reference and stream from a fresh resolution
    ///
    /// Identity, retry count and the announced flag stay with `self`, so the
    /// result is still the same logical track.
    pub fn with_resolution(self, fresh: TrackDescriptor) -> Self {
        Self {
            id: self.id,
            title: fresh.title,
            canonical_reference: if fresh.canonical_reference.is_empty() {
                self.canonical_reference
            } else {
                fresh.canonical_reference
            },
            source: fresh.source,
            retry_count: self.retry_count,
            announced: self.announced,
        }
    }

    /// Whether a playback failure may still be retried
    pub fn can_retry(&self) -> bool {
        self.retry_count < MAX_RETRIES
    }

    /// Re-resolved copy queued for the single retry
    pub fn into_retry(self, fresh: TrackDescriptor) -> Self {
        let mut retry = self.with_resolution(fresh);
        retry.retry_count = MAX_RETRIES;
        retry
    }

    /// Flip `announced`; returns true only on the first call
    pub fn mark_announced(&mut self) -> bool {
        if self.announced {
            return false;
        }
        self.announced = true;
        true
    }

    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            track_id: self.id,
            title: self.title.clone(),
            reference: self.canonical_reference.clone(),
            resolved: !self.is_lazy(),
        }
    }
}

fn normalize_title(title: Option<String>) -> String {
    title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
}
