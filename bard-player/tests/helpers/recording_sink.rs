//! Notification sink that records delivered text

use async_trait::async_trait;
use bard_common::events::BardEvent;
use bard_player::error::NotifyError;
use bard_player::notify::NotificationSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery fail (nothing is recorded while failing)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.messages()
            .iter()
            .filter(|m| m.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, event: &BardEvent) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError("channel deleted".to_string()));
        }
        if let Some(text) = event.user_message() {
            self.messages.lock().unwrap().push(text);
        }
        Ok(())
    }
}
