use std::sync::Mutex;

use tracing::warn;

use crate::metrics::NOTIFICATIONS_SENT;

/// Text shown to the user whenever a backend call fails, whatever the cause.
pub const BACKEND_UNREACHABLE: &str = "Unable to reach backend";

/// Side channel for transient user-facing notices.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

/// Emits notices as log events; the default for the terminal front end.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, message: &str) {
        NOTIFICATIONS_SENT.inc();
        warn!(target: "notify", "{message}");
    }
}

/// Keeps every notice in memory so callers can inspect what the user saw.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        NOTIFICATIONS_SENT.inc();
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(message.to_string());
        }
    }
}
