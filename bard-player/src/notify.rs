//! Notification sinks
//!
//! A sink is the text surface attached to a session (the channel the request
//! came from). Delivery is fire-and-forget from the engine's point of view:
//! failures come back as [`NotifyError`] and are only logged.

use async_trait::async_trait;
use bard_common::events::BardEvent;
use tracing::info;

use crate::error::NotifyError;

/// Delivery channel for user-facing events
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one user-facing event
    async fn deliver(&self, event: &BardEvent) -> Result<(), NotifyError>;
}

/// Sink that prints the default message text to stdout
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink {
    /// Optional prefix, e.g. the guild name
    prefix: Option<String>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn render(&self, event: &BardEvent) -> Option<String> {
        let text = event.user_message()?;
        Some(match &self.prefix {
            Some(prefix) => format!("[{}] {}", prefix, text),
            None => text,
        })
    }
}

#[async_trait]
impl NotificationSink for ConsoleSink {
    async fn deliver(&self, event: &BardEvent) -> Result<(), NotifyError> {
        if let Some(text) = self.render(event) {
            info!(guild_id = %event.guild_id(), "{}", text);
            println!("{}", text);
        }
        Ok(())
    }
}
