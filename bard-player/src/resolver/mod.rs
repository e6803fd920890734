//! Media resolution
//!
//! The resolver turns a user reference into track descriptors. Three entry
//! points let the ingestion controller queue the first track quickly and
//! resolve the rest of a playlist one entry at a time, so a broken entry
//! never aborts the whole batch.

pub mod ytdlp;

pub use ytdlp::YtDlpResolver;

use async_trait::async_trait;

use crate::error::ResolutionError;
use crate::playback::track::{RawEntry, TrackDescriptor};

/// Resolution backend seam
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Fully resolve a reference into one playable descriptor
    ///
    /// A playlist reference resolves to its first playable item.
    async fn resolve_single(&self, reference: &str) -> Result<TrackDescriptor, ResolutionError>;

    /// Cheaply enumerate playlist members
    ///
    /// Returns an empty listing when the reference is not a playlist.
    async fn resolve_flat_listing(&self, reference: &str)
        -> Result<Vec<RawEntry>, ResolutionError>;

    /// Resolve one listing entry into a playable descriptor
    async fn resolve_lazy_entry(&self, entry: &RawEntry)
        -> Result<TrackDescriptor, ResolutionError>;
}
