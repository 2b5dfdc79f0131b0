//! Thread-local log capture for asserting on diagnostics in tests.
//!
//! Runtime components report stray pushes, parse failures and clamped
//! settings only through `tracing`, so tests check those paths by capturing
//! the events emitted on the test thread.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One event seen by [`capture_logs`].
#[derive(Clone, Debug)]
pub struct LogRecord {
    /// Severity.
    pub level: Level,
    /// Rendered message.
    pub message: String,
    fields: Vec<(&'static str, String)>,
}

impl LogRecord {
    /// Structured field rendered as text.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find_map(|(key, value)| (*key == name).then_some(value.as_str()))
    }
}

/// Handle to the records captured on one thread.
#[derive(Clone, Default)]
pub struct LogCapture {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl LogCapture {
    /// Whether an event at `level` mentions `needle`.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.find(level, needle).is_some()
    }

    /// First event at `level` mentioning `needle`.
    pub fn find(&self, level: Level, needle: &str) -> Option<LogRecord> {
        self.records
            .lock()
            .iter()
            .find(|r| r.level == level && r.message.contains(needle))
            .cloned()
    }

    /// Number of events at `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.records.lock().iter().filter(|r| r.level == level).count()
    }
}

#[derive(Default)]
struct Recorder {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl Visit for Recorder {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }
}

impl Recorder {
    fn push(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut recorder = Recorder::default();
        event.record(&mut recorder);
        self.records.lock().push(LogRecord {
            level: *event.metadata().level(),
            message: recorder.message,
            fields: recorder.fields,
        });
    }
}

/// Capture every event emitted on the current thread until the guard drops.
///
/// Async tests must stay on the current-thread runtime for their events to
/// be seen.
pub fn capture_logs() -> (LogCapture, tracing::subscriber::DefaultGuard) {
    let capture = LogCapture::default();
    let guard = tracing_subscriber::registry()
        .with(capture.clone())
        .with(LevelFilter::TRACE)
        .set_default();
    (capture, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_level() {
        let (logs, _guard) = capture_logs();
        tracing::info!("runtime built");
        tracing::warn!("setObject for unwatched object");

        assert_eq!(logs.count_at_level(Level::INFO), 1);
        assert!(logs.has_event(Level::WARN, "unwatched"));
        assert!(!logs.has_event(Level::ERROR, "unwatched"));
    }

    #[test]
    fn keeps_structured_fields() {
        let (logs, _guard) = capture_logs();
        tracing::error!(identifier = 12_u64, object_id = "users/9", "no registered callback");

        let record = logs.find(Level::ERROR, "no registered callback").unwrap();
        assert_eq!(record.field("object_id"), Some("users/9"));
        assert_eq!(record.field("identifier"), Some("12"));
        assert_eq!(record.field("missing"), None);
    }
}
