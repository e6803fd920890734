//! Queue Manager
//!
//! Bounded FIFO of track descriptors for one guild. Ingestion appends at the
//! back, the driver pops from the front and re-inserts retries at the front.
//! Every operation is synchronous; callers serialize access through the
//! session lock.

use crate::playback::track::TrackDescriptor;
use std::collections::VecDeque;
use thiserror::Error;

/// Append refused because the queue is at capacity
#[derive(Debug, Error)]
#[error("queue is full (max {capacity} songs)")]
pub struct QueueFull {
    pub capacity: usize,
    /// The descriptor that was not queued
    pub track: Box<TrackDescriptor>,
}

/// Per-guild track queue
#[derive(Debug, Clone)]
pub struct GuildQueue {
    entries: VecDeque<TrackDescriptor>,
    capacity: usize,
}

impl GuildQueue {
    /// Create new empty queue holding at most `capacity` tracks
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append to the back if under capacity
    ///
    /// Returns the 1-based position of the new entry. A full queue is left
    /// untouched and the track is handed back inside the error.
    pub fn push_back(&mut self, track: TrackDescriptor) -> Result<usize, QueueFull> {
        if self.is_full() {
            return Err(QueueFull {
                capacity: self.capacity,
                track: Box::new(track),
            });
        }
        self.entries.push_back(track);
        Ok(self.entries.len())
    }

    /// Insert at the front so the track plays next
    ///
    /// The capacity bound applies here too.
    pub fn push_front(&mut self, track: TrackDescriptor) -> Result<(), QueueFull> {
        if self.is_full() {
            return Err(QueueFull {
                capacity: self.capacity,
                track: Box::new(track),
            });
        }
        self.entries.push_front(track);
        Ok(())
    }

    /// Remove and return the next track
    pub fn pop_front(&mut self) -> Option<TrackDescriptor> {
        self.entries.pop_front()
    }

    /// Next track without removing it
    pub fn peek(&self) -> Option<&TrackDescriptor> {
        self.entries.front()
    }

    /// Remove all entries, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
