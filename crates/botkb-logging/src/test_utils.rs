//! In-memory log capture for tests.
//!
//! Degraded paths (quarantined snapshots, failed dimension probes, dangling
//! ids) only report themselves through logs, so tests assert on what was
//! emitted rather than on return values alone.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One recorded event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Severity.
    pub level: Level,
    /// Module path the event came from.
    pub target: String,
    /// The `message` field, empty if the event had none.
    pub message: String,
    /// Every other field in recording order, values rendered as text.
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    fn empty(level: Level, target: &str) -> Self {
        Self {
            level,
            target: target.to_owned(),
            message: String::new(),
            fields: Vec::new(),
        }
    }

    /// Rendered value of the named field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find_map(|(k, v)| (k == name).then_some(v.as_str()))
    }

    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_owned(), value));
        }
    }
}

impl Visit for CapturedEvent {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

/// Shared handle to the events seen by a [`capture_logs`] subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    fn lock(&self) -> MutexGuard<'_, Vec<CapturedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.lock().clone()
    }

    /// First event at `level` whose message contains `needle`.
    pub fn find(&self, level: Level, needle: &str) -> Option<CapturedEvent> {
        self.lock()
            .iter()
            .find(|e| e.level == level && e.message.contains(needle))
            .cloned()
    }

    /// Whether an event at `level` mentions `needle` in its message.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.find(level, needle).is_some()
    }

    /// Whether any event, at any level, mentions `needle`.
    pub fn has_message(&self, needle: &str) -> bool {
        self.lock().iter().any(|e| e.message.contains(needle))
    }

    /// Number of events recorded at exactly `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.lock().iter().filter(|e| e.level == level).count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut captured = CapturedEvent::empty(*meta.level(), meta.target());
        event.record(&mut captured);
        self.lock().push(captured);
    }
}

/// Record every event emitted on the current thread until the returned
/// guard is dropped.
///
/// The subscriber is thread-local, so parallel tests do not see each
/// other's events. Async tests need the current-thread runtime that
/// `#[tokio::test]` uses by default.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing_subscriber::registry()
        .with(logs.clone())
        .with(LevelFilter::TRACE)
        .set_default();
    (logs, guard)
}
