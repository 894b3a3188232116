//! Reporting of per-request failures from the voice loop.

use crate::error::TalkboxError;
use std::sync::Mutex;

/// Trait for reporting request failures.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error raised while handling `text`.
    fn report(&self, text: &str, error: &TalkboxError);
}

/// Reporter that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, text: &str, error: &TalkboxError) {
        tracing::warn!(chars = text.chars().count(), error = %error, "voice request failed");
    }
}

/// Reporter that keeps every failure, for tests.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    failures: Mutex<Vec<(String, String)>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(text, error message)` pairs in report order.
    pub fn failures(&self) -> Vec<(String, String)> {
        match self.failures.lock() {
            Ok(failures) => failures.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, text: &str, error: &TalkboxError) {
        let entry = (text.to_string(), error.to_string());
        match self.failures.lock() {
            Ok(mut failures) => failures.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
