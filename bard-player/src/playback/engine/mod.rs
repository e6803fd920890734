//! Playback engine
//!
//! **Module Structure:**
//! - `core.rs`: Construction, lifecycle, session access, event publication
//! - `queue.rs`: Enqueue, background ingestion, skip, clear, leave
//! - `playback.rs`: Per-guild driver loop, retry policy, idle wait
//! - `diagnostics.rs`: Queue snapshot, transport event handling

mod core;
mod diagnostics;
mod playback;
mod queue;

pub use core::PlaybackEngine;
pub use diagnostics::QueueSnapshot;
pub use queue::{EnqueueOutcome, PlayRequest};
