//! Scripted resolver
//!
//! Every reference resolves to `Song <reference>` streaming from
//! `stream://<reference>` unless it was marked as failing. Listings are
//! scripted per reference. Canonical references default to the reference
//! itself and can be overridden per reference.

use async_trait::async_trait;
use bard_player::error::ResolutionError;
use bard_player::playback::{RawEntry, StreamLocator, TrackDescriptor};
use bard_player::resolver::Resolver;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted answer to a flat listing request
#[derive(Debug, Clone)]
pub enum Listing {
    /// Returned immediately
    Entries(Vec<RawEntry>),
    /// Returned after a delay
    Delayed(Duration, Vec<RawEntry>),
    /// Never returns
    Pending,
    /// Listing fails
    Fail,
}

impl Listing {
    fn entries(&self) -> Option<&[RawEntry]> {
        match self {
            Listing::Entries(entries) | Listing::Delayed(_, entries) => Some(entries),
            Listing::Pending | Listing::Fail => None,
        }
    }
}

/// Entries `<name>/1` ..= `<name>/<count>`
pub fn playlist(name: &str, count: usize) -> Vec<RawEntry> {
    (1..=count)
        .map(|i| RawEntry::new(format!("{}/{}", name, i), Some(format!("Song {}/{}", name, i))))
        .collect()
}

pub fn stream_of(reference: &str) -> String {
    format!("stream://{}", reference)
}

#[derive(Default)]
pub struct MockResolver {
    failing: Mutex<HashSet<String>>,
    listings: Mutex<HashMap<String, Listing>>,
    canonical: Mutex<HashMap<String, String>>,
    skip_broken_leading: AtomicBool,
    single_calls: Mutex<Vec<String>>,
    entry_calls: Mutex<Vec<String>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every resolution of `reference` fail from now on
    pub fn fail(&self, reference: &str) {
        self.failing.lock().unwrap().insert(reference.to_string());
    }

    pub fn heal(&self, reference: &str) {
        self.failing.lock().unwrap().remove(reference);
    }

    pub fn set_listing(&self, reference: &str, listing: Listing) {
        self.listings
            .lock()
            .unwrap()
            .insert(reference.to_string(), listing);
    }

    /// Report `canonical` as the canonical reference of `reference`
    pub fn set_canonical(&self, reference: &str, canonical: &str) {
        self.canonical
            .lock()
            .unwrap()
            .insert(reference.to_string(), canonical.to_string());
    }

    /// Resolve a listing to its first entry that resolves, like an extractor
    /// that passes over unavailable items
    pub fn skip_broken_leading(&self) {
        self.skip_broken_leading.store(true, Ordering::SeqCst);
    }

    pub fn single_calls(&self) -> Vec<String> {
        self.single_calls.lock().unwrap().clone()
    }

    pub fn entry_calls(&self) -> Vec<String> {
        self.entry_calls.lock().unwrap().clone()
    }

    fn resolve(&self, reference: &str) -> Result<TrackDescriptor, ResolutionError> {
        if reference.is_empty() {
            return Err(ResolutionError::NoPlayableItem("playlist entry".to_string()));
        }
        if self.failing.lock().unwrap().contains(reference) {
            return Err(ResolutionError::Unavailable(format!("{} is private", reference)));
        }
        let canonical = self
            .canonical
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .unwrap_or_else(|| reference.to_string());
        Ok(TrackDescriptor::resolved(
            Some(format!("Song {}", reference)),
            canonical,
            StreamLocator::new(stream_of(reference)),
        ))
    }
}

#[async_trait]
impl Resolver for MockResolver {
    async fn resolve_single(&self, reference: &str) -> Result<TrackDescriptor, ResolutionError> {
        self.single_calls.lock().unwrap().push(reference.to_string());
        let entries = self
            .listings
            .lock()
            .unwrap()
            .get(reference)
            .and_then(|l| l.entries().map(<[RawEntry]>::to_vec))
            .filter(|e| !e.is_empty());
        let Some(entries) = entries else {
            return self.resolve(reference);
        };

        if self.skip_broken_leading.load(Ordering::SeqCst) {
            if let Some(track) = entries.iter().find_map(|e| self.resolve(&e.reference).ok()) {
                return Ok(track);
            }
        }
        self.resolve(&entries[0].reference)
    }

    async fn resolve_flat_listing(
        &self,
        reference: &str,
    ) -> Result<Vec<RawEntry>, ResolutionError> {
        let listing = self.listings.lock().unwrap().get(reference).cloned();
        match listing {
            None => Ok(Vec::new()),
            Some(Listing::Entries(entries)) => Ok(entries),
            Some(Listing::Delayed(delay, entries)) => {
                tokio::time::sleep(delay).await;
                Ok(entries)
            }
            Some(Listing::Pending) => std::future::pending().await,
            Some(Listing::Fail) => Err(ResolutionError::Backend {
                status: "exit status: 1".to_string(),
                message: "ERROR: playlist does not exist".to_string(),
            }),
        }
    }

    async fn resolve_lazy_entry(
        &self,
        entry: &RawEntry,
    ) -> Result<TrackDescriptor, ResolutionError> {
        self.entry_calls.lock().unwrap().push(entry.reference.clone());
        self.resolve(&entry.reference)
    }
}
