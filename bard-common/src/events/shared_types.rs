//! Shared type definitions for event data
//!
//! Common structs used across multiple event types and queue listings.

use serde::{Deserialize, Serialize};

use crate::ids::TrackId;

/// Display summary of one track in a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Logical track id
    pub track_id: TrackId,
    /// Display title ("Unknown Title" when metadata omitted it)
    pub title: String,
    /// Page-level reference the track can be re-resolved from
    pub reference: String,
    /// Whether the stream locator is already known
    pub resolved: bool,
}

impl TrackInfo {
    /// Markdown link used in chat notifications
    pub fn link(&self) -> String {
        if self.reference.is_empty() {
            self.title.clone()
        } else {
            format!("[{}]({})", self.title, self.reference)
        }
    }
}
