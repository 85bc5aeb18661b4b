//! Structured logging and in-process metrics for the execution core.
//!
//! Generalizes the teacher's `observability.rs` (`ExecutionEvent` +
//! `MetricsCollector` + `AlertManager`) down to what SPEC_FULL.md's ambient
//! stack actually needs: a `tracing::event!` at every action lifecycle point
//! (always compiled in, unlike the teacher's `observability`-feature-gated
//! calls) plus an optional counter/event collector the Executor threads
//! through when a host wants it. There is no Prometheus exporter and no
//! alerting surface here — the spec's Non-goals exclude a metrics exporter
//! surface, and nothing in SPEC_FULL.md needs one.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One point-in-time observation: an action (or run) entering, completing,
/// or failing a lifecycle stage.
#[derive(Debug, Clone)]
pub struct ExecutionEvent {
    pub run_id: String,
    pub action_name: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub metadata: HashMap<String, Value>,
}

/// A bounded in-process counter/event collector. Not exported anywhere; a
/// host process can poll [`MetricsCollector::get_metric`] /
/// [`MetricsCollector::get_events`] itself (e.g. to serve its own `/metrics`
/// endpoint) if it attaches one via [`crate::executor::Executor::with_metrics`].
#[derive(Debug)]
pub struct MetricsCollector {
    counters: Mutex<HashMap<String, f64>>,
    events: Mutex<Vec<ExecutionEvent>>,
    /// Caps memory use; oldest events are dropped once exceeded.
    max_events: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self { counters: Mutex::new(HashMap::new()), events: Mutex::new(Vec::new()), max_events: 10_000 }
    }

    pub fn with_max_events(max_events: usize) -> Self {
        Self { max_events, ..Self::new() }
    }

    pub fn increment_counter(&self, name: &str, value: f64) {
        let mut counters = self.counters.lock().expect("metrics counters lock poisoned");
        *counters.entry(name.to_string()).or_insert(0.0) += value;
    }

    pub fn record_event(&self, event: ExecutionEvent) {
        let mut events = self.events.lock().expect("metrics events lock poisoned");
        if events.len() >= self.max_events {
            events.remove(0);
        }
        events.push(event);
    }

    pub fn get_metric(&self, name: &str) -> Option<f64> {
        self.counters.lock().expect("metrics counters lock poisoned").get(name).copied()
    }

    pub fn get_events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().expect("metrics events lock poisoned").clone()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits a `tracing` event for one action lifecycle transition and, when a
/// collector is attached, records the matching counter increment and event.
/// `event_type` is one of `action_start`, `action_completed`,
/// `action_failed`, `action_retrying`, `dlq_inserted`.
pub fn record_action_event(
    metrics: Option<&Arc<MetricsCollector>>,
    run_id: &str,
    action_name: &str,
    kind: &str,
    event_type: &str,
    duration_ms: Option<u64>,
) {
    match event_type {
        "action_failed" | "dlq_inserted" => {
            tracing::warn!(run_id, action_name, kind, event_type, duration_ms = ?duration_ms, "action lifecycle event");
        }
        _ => {
            tracing::debug!(run_id, action_name, kind, event_type, duration_ms = ?duration_ms, "action lifecycle event");
        }
    }

    if let Some(collector) = metrics {
        collector.increment_counter(&format!("{}.{}", kind, event_type), 1.0);
        collector.record_event(ExecutionEvent {
            run_id: run_id.to_string(),
            action_name: action_name.to_string(),
            event_type: event_type.to_string(),
            timestamp: Utc::now(),
            duration_ms,
            metadata: HashMap::new(),
        });
    }
}
