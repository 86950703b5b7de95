//! Event envelope published on the bus.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A lifecycle event.
///
/// `event_type` is a dot-delimited topic such as `task.123.completed`;
/// `data` is an arbitrary payload chosen by the publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<D> {
    /// Dot-delimited event type
    pub event_type: String,
    /// Component that produced the event
    pub source: String,
    /// Wall-clock time the event was created
    pub timestamp: SystemTime,
    /// Event payload
    pub data: D,
}

impl<D> Event<D> {
    /// Create an event stamped with the current wall-clock time.
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, data: D) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            timestamp: SystemTime::now(),
            data,
        }
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Iterate over the dot-delimited segments of the event type.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.event_type.split('.')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_event() {
        let before = SystemTime::now();
        let event = Event::new("task.created", "scheduler", 7u32);
        assert_eq!(event.event_type, "task.created");
        assert_eq!(event.source, "scheduler");
        assert_eq!(event.data, 7);
        assert!(event.timestamp >= before);
    }

    #[test]
    fn test_segments() {
        let event = Event::new("task.123.completed", "worker", ());
        let segments: Vec<_> = event.segments().collect();
        assert_eq!(segments, vec!["task", "123", "completed"]);
    }

    #[test]
    fn test_with_timestamp() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let event = Event::new("a", "b", ()).with_timestamp(at);
        assert_eq!(event.timestamp, at);
    }
}
