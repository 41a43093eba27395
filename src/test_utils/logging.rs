//! Log capture for assertions on what components report.
//!
//! Capture is scoped to one closure on the current thread, so parallel tests
//! do not see each other's events.

use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Entries captured by [`capture_logs`], in emission order.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    entries: Vec<LogEntry>,
}

impl CapturedLogs {
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn for_target<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a LogEntry> {
        self.entries.iter().filter(move |entry| entry.target == target)
    }

    /// Any entry for `target` whose message contains `needle`.
    pub fn contains(&self, target: &str, needle: &str) -> bool {
        self.for_target(target).any(|entry| entry.message.contains(needle))
    }

    pub fn has_level(&self, level: Level) -> bool {
        self.entries.iter().any(|entry| entry.level == level)
    }

    pub fn has_warnings(&self) -> bool {
        self.has_level(Level::WARN)
    }
}

struct CaptureLayer {
    sink: Arc<Mutex<Vec<LogEntry>>>,
}

struct EntryVisitor<'a> {
    message: &'a mut String,
    fields: &'a mut Vec<(String, String)>,
}

impl Visit for EntryVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value = format!("{value:?}");
        if field.name() == "message" {
            *self.message = value;
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        let mut fields = Vec::new();
        event.record(&mut EntryVisitor {
            message: &mut message,
            fields: &mut fields,
        });
        let metadata = event.metadata();
        if let Ok(mut sink) = self.sink.lock() {
            sink.push(LogEntry {
                level: *metadata.level(),
                target: metadata.target().to_string(),
                message,
                fields,
            });
        }
    }
}

/// Run `f` with every event at `filter` or above captured.
pub fn capture_logs<R>(filter: &str, f: impl FnOnce() -> R) -> (R, CapturedLogs) {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(CaptureLayer { sink: Arc::clone(&sink) });
    let result = tracing::subscriber::with_default(subscriber, f);
    let entries = sink.lock().map(|entries| entries.clone()).unwrap_or_default();
    (result, CapturedLogs { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_target_message_and_fields() {
        let ((), logs) = capture_logs("debug", || {
            tracing::warn!(target: "reconcile", skill = "triage", "event log shrank");
            tracing::trace!(target: "reconcile", "filtered out");
        });
        assert_eq!(logs.entries().len(), 1);
        assert!(logs.contains("reconcile", "shrank"));
        assert_eq!(logs.entries()[0].field("skill"), Some("triage"));
        assert!(logs.has_warnings());
    }
}
