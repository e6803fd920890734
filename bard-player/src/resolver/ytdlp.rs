//! yt-dlp resolution backend
//!
//! Runs the configured extractor with `-J` and reads the JSON info document.
//! Listing mode adds `--flat-playlist`, which returns only ids, page references
//! and titles for playlist members without resolving their streams.

use async_trait::async_trait;
use bard_common::config::ResolverSettings;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use super::Resolver;
use crate::error::ResolutionError;
use crate::playback::track::{RawEntry, StreamLocator, TrackDescriptor};

/// What a single invocation is asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Full resolution, playlists allowed (first item is used)
    Single,
    /// Flat playlist enumeration
    Listing,
    /// Full resolution of one playlist member
    Entry,
}

/// Resolver backed by a yt-dlp compatible executable
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    settings: ResolverSettings,
}

impl YtDlpResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Command-line arguments for one invocation
    fn args(&self, mode: Mode, reference: &str) -> Vec<String> {
        let s = &self.settings;
        let mut args = vec![
            "-J".to_string(),
            "--no-warnings".to_string(),
            "--ignore-errors".to_string(),
            "-f".to_string(),
            s.format.clone(),
            "--socket-timeout".to_string(),
            s.socket_timeout_secs.to_string(),
            "--retries".to_string(),
            s.retries.to_string(),
        ];

        match mode {
            Mode::Single => {
                args.push("--playlist-items".to_string());
                args.push(format!("1-{}", s.playlist_items));
            }
            Mode::Listing => {
                args.push("--flat-playlist".to_string());
                args.push("--playlist-items".to_string());
                args.push(format!("1-{}", s.playlist_items));
            }
            Mode::Entry => {
                args.push("--no-playlist".to_string());
            }
        }

        if let Some(cookies) = &s.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.display().to_string());
        }
        if s.force_ipv4 {
            args.push("--force-ipv4".to_string());
        }

        args.push("--".to_string());
        args.push(reference.to_string());
        args
    }

    /// Run the extractor and parse its JSON document
    async fn run(&self, mode: Mode, reference: &str) -> Result<Value, ResolutionError> {
        let args = self.args(mode, reference);
        debug!("Running {} {:?}", self.settings.program, args);

        let output = Command::new(&self.settings.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ResolutionError::Spawn(format!("{}: {}", self.settings.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or("no error output")
                .to_string();
            warn!("Resolver failed for {}: {}", reference, message);
            return Err(ResolutionError::Backend {
                status: output.status.to_string(),
                message,
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| ResolutionError::Parse(e.to_string()))
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve_single(&self, reference: &str) -> Result<TrackDescriptor, ResolutionError> {
        let info = self.run(Mode::Single, reference).await?;
        parse_single(&info, reference)
    }

    async fn resolve_flat_listing(
        &self,
        reference: &str,
    ) -> Result<Vec<RawEntry>, ResolutionError> {
        let info = self.run(Mode::Listing, reference).await?;
        Ok(parse_listing(&info))
    }

    async fn resolve_lazy_entry(
        &self,
        entry: &RawEntry,
    ) -> Result<TrackDescriptor, ResolutionError> {
        if entry.reference.trim().is_empty() {
            return Err(ResolutionError::NoPlayableItem(
                entry.title.clone().unwrap_or_else(|| "playlist entry".to_string()),
            ));
        }
        let info = self.run(Mode::Entry, &entry.reference).await?;
        parse_single(&info, &entry.reference)
    }
}

fn str_field<'a>(info: &'a Value, key: &str) -> Option<&'a str> {
    info.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Build a descriptor from a full info document
///
/// Playlist documents resolve to their first entry that carries a stream.
pub(crate) fn parse_single(info: &Value, reference: &str) -> Result<TrackDescriptor, ResolutionError> {
    if let Some(entries) = info.get("entries").and_then(Value::as_array) {
        return entries
            .iter()
            .filter(|e| e.is_object())
            .find(|e| str_field(e, "url").is_some())
            .ok_or_else(|| ResolutionError::NoPlayableItem(reference.to_string()))
            .and_then(|entry| parse_single(entry, reference));
    }

    let stream = str_field(info, "url")
        .ok_or_else(|| ResolutionError::MissingStream(reference.to_string()))?;
    let canonical = str_field(info, "webpage_url")
        .or_else(|| str_field(info, "original_url"))
        .unwrap_or(reference);
    let title = str_field(info, "title").map(str::to_string);

    Ok(TrackDescriptor::resolved(
        title,
        canonical,
        StreamLocator::new(stream),
    ))
}

/// Extract raw entries from a flat listing document
///
/// Non-playlist documents yield an empty listing. Entries the extractor could
/// not list (null) are kept with an empty reference so they count as skipped.
pub(crate) fn parse_listing(info: &Value) -> Vec<RawEntry> {
    let Some(entries) = info.get("entries").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .map(|entry| {
            let reference = str_field(entry, "url")
                .or_else(|| str_field(entry, "webpage_url"))
                .or_else(|| str_field(entry, "id"))
                .unwrap_or_default();
            let title = str_field(entry, "title").map(str::to_string);
            RawEntry::new(reference, title)
        })
        .collect()
}
