//! Event sinks
//!
//! Procedures forward every event they record to an injected [`EventSink`].
//! The default sink writes them to `tracing`.

use super::types::{Event, Severity};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Receives events as they are recorded
pub trait EventSink: Send + Sync {
    /// Record one event
    fn record(&self, event: &Event);
}

/// Logs events through `tracing`, at a level derived from their severity
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &Event) {
        let kind = event.name();
        let line = event.logline();
        match event.severity {
            Severity::Debug => debug!(event = kind, "{line}"),
            Severity::Info | Severity::Success => info!(event = kind, "{line}"),
            Severity::Warning => warn!(event = kind, "{line}"),
            Severity::Error => error!(event = kind, "{line}"),
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &Event) {}
}

/// Keeps a copy of every event in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
