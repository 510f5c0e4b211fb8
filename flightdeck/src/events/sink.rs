//! Event sink trait and implementations.

use async_trait::async_trait;
use tracing::{debug, info, warn, Level};

/// Trait for sinks that receive flight lifecycle events.
///
/// The executor emits through [`EventSink::try_emit`] so that a slow or
/// failing sink never stalls a flight.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The type of event (e.g., "step.completed")
    /// * `data` - Optional event data
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>);

    /// Emits an event without blocking. Must never panic.
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// A sink that discards all events. The executor's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// A sink that writes events to `tracing`.
///
/// Failure events (`*.failed`, `step.retrying`, dismal completions) are
/// raised to `WARN` regardless of the configured level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }

    fn is_warning(event_type: &str, data: Option<&serde_json::Value>) -> bool {
        if event_type.ends_with(".failed") || event_type == super::STEP_RETRYING {
            return true;
        }
        data.and_then(|d| d.get("status"))
            .and_then(serde_json::Value::as_str)
            .is_some_and(|status| status == "dismal_failure")
    }

    fn log_event(&self, event_type: &str, data: Option<&serde_json::Value>) {
        if Self::is_warning(event_type, data) {
            warn!(event_type = %event_type, event_data = ?data, "Event: {}", event_type);
            return;
        }
        if self.level == Level::DEBUG {
            debug!(event_type = %event_type, event_data = ?data, "Event: {}", event_type);
        } else {
            info!(event_type = %event_type, event_data = ?data, "Event: {}", event_type);
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_event(event_type, data.as_ref());
    }
}

/// A sink that keeps every event in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<(String, Option<serde_json::Value>)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.events.read().clone()
    }

    /// Returns the collected event types in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, Option<serde_json::Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push((event_type.to_string(), data));
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{FLIGHT_COMPLETED, STEP_COMPLETED, STEP_STARTED};

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit(STEP_STARTED, None).await;
        sink.try_emit(STEP_STARTED, Some(serde_json::json!({"x": 1})));
    }

    #[test]
    fn test_logging_sink_warning_classification() {
        assert!(LoggingEventSink::is_warning("step.retrying", None));
        assert!(LoggingEventSink::is_warning("lock.failed", None));
        assert!(LoggingEventSink::is_warning(
            FLIGHT_COMPLETED,
            Some(&serde_json::json!({"status": "dismal_failure"}))
        ));
        assert!(!LoggingEventSink::is_warning(
            FLIGHT_COMPLETED,
            Some(&serde_json::json!({"status": "success"}))
        ));
    }

    #[tokio::test]
    async fn test_logging_sink() {
        let sink = LoggingEventSink::debug();
        sink.emit(STEP_COMPLETED, Some(serde_json::json!({"step": "lock"}))).await;
        sink.try_emit(STEP_COMPLETED, None);
    }

    #[tokio::test]
    async fn test_collecting_sink_filter() {
        let sink = CollectingEventSink::new();
        sink.emit(STEP_STARTED, None).await;
        sink.emit(STEP_COMPLETED, None).await;
        sink.try_emit(FLIGHT_COMPLETED, None);

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_of_type("step.").len(), 2);
        assert_eq!(
            sink.event_types(),
            vec![STEP_STARTED, STEP_COMPLETED, FLIGHT_COMPLETED]
        );

        sink.clear();
        assert!(sink.is_empty());
    }
}
