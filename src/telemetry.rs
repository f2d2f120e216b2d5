//! Process-wide telemetry sink.
//!
//! One logical instance created at process start and passed into the
//! orchestrator as an explicit `Arc` handle; no implicit global state. All
//! writers serialize through a single mutex, so event order in the log
//! matches the order `log_event` calls were issued regardless of which
//! concurrent run issued them.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An immutable, timestamped record of a pipeline lifecycle occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Event name, e.g. "stage_completed"
    pub name: String,

    /// When the event was logged
    pub timestamp: DateTime<Utc>,

    /// String metadata (run id, stage, duration, ...)
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct TelemetryInner {
    registered: HashSet<String>,
    events: Vec<TelemetryEvent>,
    enabled: bool,
}

/// Append-only event log shared by every run in the process
#[derive(Debug)]
pub struct Telemetry {
    inner: Mutex<TelemetryInner>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    /// Create an enabled sink with an empty log
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TelemetryInner {
                registered: HashSet::new(),
                events: Vec::new(),
                enabled: true,
            }),
        }
    }

    /// Register a module for tracking
    pub fn register(&self, module: &str) {
        let mut inner = self.inner.lock().expect("telemetry lock poisoned");
        inner.registered.insert(module.to_string());
    }

    /// Check whether a module has been registered
    pub fn is_registered(&self, module: &str) -> bool {
        let inner = self.inner.lock().expect("telemetry lock poisoned");
        inner.registered.contains(module)
    }

    /// Append an event. No-op when the sink is disabled.
    pub fn log_event(&self, name: &str, metadata: HashMap<String, String>) {
        let mut inner = self.inner.lock().expect("telemetry lock poisoned");
        if !inner.enabled {
            return;
        }

        debug!(event = name, ?metadata, "telemetry");

        inner.events.push(TelemetryEvent {
            name: name.to_string(),
            timestamp: Utc::now(),
            metadata,
        });
    }

    /// The most recent `count` events, oldest first
    pub fn recent_events(&self, count: usize) -> Vec<TelemetryEvent> {
        let inner = self.inner.lock().expect("telemetry lock poisoned");
        let len = inner.events.len();
        inner.events[len.saturating_sub(count)..].to_vec()
    }

    /// Events matching a name, oldest first
    pub fn events_named(&self, name: &str) -> Vec<TelemetryEvent> {
        let inner = self.inner.lock().expect("telemetry lock poisoned");
        inner
            .events
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    /// Clear the event log (registrations are kept)
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("telemetry lock poisoned");
        inner.events.clear();
    }

    /// Enable or disable logging
    pub fn set_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock().expect("telemetry lock poisoned");
        inner.enabled = enabled;
    }
}

/// Build a metadata map from string pairs
pub fn metadata<const N: usize>(pairs: [(&str, String); N]) -> HashMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_registration() {
        let telemetry = Telemetry::new();
        assert!(!telemetry.is_registered("segmentation"));

        telemetry.register("segmentation");
        assert!(telemetry.is_registered("segmentation"));
        assert!(!telemetry.is_registered("taxonomy"));
    }

    #[test]
    fn test_log_order_and_recent_bound() {
        let telemetry = Telemetry::new();
        for i in 0..10 {
            telemetry.log_event(&format!("event_{}", i), HashMap::new());
        }

        let recent = telemetry.recent_events(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].name, "event_7");
        assert_eq!(recent[2].name, "event_9");

        // Asking for more than exist returns everything
        assert_eq!(telemetry.recent_events(100).len(), 10);
    }

    #[test]
    fn test_disabled_sink_drops_events() {
        let telemetry = Telemetry::new();
        telemetry.set_enabled(false);
        telemetry.log_event("dropped", HashMap::new());
        assert!(telemetry.recent_events(10).is_empty());

        telemetry.set_enabled(true);
        telemetry.log_event("kept", HashMap::new());
        assert_eq!(telemetry.recent_events(10).len(), 1);
    }

    #[test]
    fn test_clear_keeps_registrations() {
        let telemetry = Telemetry::new();
        telemetry.register("segmentation");
        telemetry.log_event("x", HashMap::new());

        telemetry.clear();
        assert!(telemetry.recent_events(10).is_empty());
        assert!(telemetry.is_registered("segmentation"));
    }

    #[test]
    fn test_concurrent_writers_all_land() {
        let telemetry = Arc::new(Telemetry::new());
        let mut handles = Vec::new();

        for t in 0..4 {
            let sink = Arc::clone(&telemetry);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    sink.log_event(
                        "concurrent",
                        metadata([("writer", t.to_string()), ("seq", i.to_string())]),
                    );
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let events = telemetry.events_named("concurrent");
        assert_eq!(events.len(), 200);

        // Each writer's issue order is preserved in the interleaved log
        for t in 0..4 {
            let seqs: Vec<usize> = events
                .iter()
                .filter(|e| e.metadata["writer"] == t.to_string())
                .map(|e| e.metadata["seq"].parse().unwrap())
                .collect();
            assert_eq!(seqs, (0..50).collect::<Vec<_>>());
        }
    }
}
