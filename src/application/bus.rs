//! In-process publish/subscribe with hierarchical wildcard topics.
//!
//! Handlers subscribe to a dot-delimited pattern such as `task.*` or
//! `task.**`. Publishing an event runs every handler whose pattern matches the
//! event type. Handlers are isolated from each other: an error or a panic in
//! one is logged and counted, and the rest still run.

use crate::application::metrics::Metrics;
use crate::domain::event::Event;
use crate::domain::pattern::TopicPattern;
use dashmap::DashMap;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Error returned by an event handler.
#[derive(Debug)]
pub struct HandlerError(Box<dyn std::error::Error + Send + Sync>);

impl HandlerError {
    /// Wrap a message or an error.
    pub fn new(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(error.into())
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// A subscribed callback.
///
/// Handlers are compared by `Arc` identity: subscribing the same `Arc` twice
/// under one pattern registers it once.
pub type Handler<D> = Arc<dyn Fn(&Event<D>) -> Result<(), HandlerError> + Send + Sync>;

/// Wrap a closure as a [`Handler`].
///
/// # Example
/// ```
/// use request_governor::{handler, EventBus};
///
/// let bus: EventBus<u32> = EventBus::new();
/// bus.subscribe("task.*", handler(|event| {
///     println!("{} from {}", event.event_type, event.source);
///     Ok(())
/// }));
/// ```
pub fn handler<D, F>(f: F) -> Handler<D>
where
    F: Fn(&Event<D>) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Outcome of a single [`EventBus::publish`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Registered patterns that matched the event type
    pub matched_patterns: usize,
    /// Handlers that returned `Ok`
    pub delivered: usize,
    /// Handlers that returned an error or panicked
    pub failed: usize,
}

impl PublishReport {
    /// Total handlers invoked.
    pub fn invoked(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Topic-based event bus.
///
/// # Concurrency
///
/// `publish` snapshots the matching handlers and releases every map lock
/// before invoking them, so handlers may subscribe or unsubscribe on the
/// same bus. Changes made during a publish take effect from the next one.
pub struct EventBus<D> {
    handlers: DashMap<String, Vec<Handler<D>>, ahash::RandomState>,
    compiled: DashMap<String, TopicPattern, ahash::RandomState>,
    metrics: Metrics,
}

impl<D> EventBus<D> {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::with_metrics(Metrics::new())
    }

    /// Create an empty bus reporting into a shared metrics handle.
    pub fn with_metrics(metrics: Metrics) -> Self {
        Self {
            handlers: DashMap::with_hasher(ahash::RandomState::new()),
            compiled: DashMap::with_hasher(ahash::RandomState::new()),
            metrics,
        }
    }

    /// Register `handler` under `pattern`.
    ///
    /// Any string is accepted as a pattern. Returns `false` if this exact
    /// handler was already registered under the pattern.
    pub fn subscribe(&self, pattern: impl Into<String>, handler: Handler<D>) -> bool {
        let pattern = pattern.into();
        let mut handlers = self.handlers.entry(pattern.clone()).or_default();

        if handlers.iter().any(|existing| Arc::ptr_eq(existing, &handler)) {
            return false;
        }
        handlers.push(handler);

        self.compiled
            .entry(pattern.clone())
            .or_insert_with(|| TopicPattern::compile(&pattern));
        true
    }

    /// Deliver `event` to every handler whose pattern matches its type.
    ///
    /// Never fails: handler errors and panics are logged at `warn` and
    /// reported in the returned [`PublishReport`]. Handler order across
    /// different patterns is unspecified; within one pattern handlers run in
    /// subscription order.
    pub fn publish(&self, event: &Event<D>) -> PublishReport {
        self.metrics.record_published();

        let matched = self.matching_handlers(&event.event_type);
        let mut report = PublishReport {
            matched_patterns: matched.len(),
            ..PublishReport::default()
        };

        for (pattern, handlers) in &matched {
            for handler in handlers {
                match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                    Ok(Ok(())) => report.delivered += 1,
                    Ok(Err(error)) => {
                        warn!(
                            pattern = %pattern,
                            event_type = %event.event_type,
                            error = %error,
                            "event handler failed"
                        );
                        self.metrics.record_handler_failure();
                        report.failed += 1;
                    }
                    Err(payload) => {
                        warn!(
                            pattern = %pattern,
                            event_type = %event.event_type,
                            panic = panic_message(payload.as_ref()),
                            "event handler panicked"
                        );
                        self.metrics.record_handler_failure();
                        report.failed += 1;
                    }
                }
            }
        }

        report
    }

    /// Build an event stamped with the current time and publish it.
    pub fn emit(
        &self,
        event_type: impl Into<String>,
        source: impl Into<String>,
        data: D,
    ) -> PublishReport {
        self.publish(&Event::new(event_type, source, data))
    }

    /// Remove every handler registered under exactly `pattern`.
    ///
    /// Other patterns are untouched even when they match the same event
    /// types. Returns how many handlers were removed.
    pub fn unsubscribe(&self, pattern: &str) -> usize {
        let removed = self
            .handlers
            .remove(pattern)
            .map_or(0, |(_, handlers)| handlers.len());
        self.compiled.remove(pattern);
        removed
    }

    /// Remove all patterns, handlers and compiled patterns.
    pub fn destroy(&self) {
        self.handlers.clear();
        self.compiled.clear();
    }

    /// Number of registered patterns.
    pub fn pattern_count(&self) -> usize {
        self.handlers.len()
    }

    /// Number of handlers registered under exactly `pattern`.
    pub fn handler_count(&self, pattern: &str) -> usize {
        self.handlers.get(pattern).map_or(0, |handlers| handlers.len())
    }

    /// Number of cached compiled patterns.
    pub fn compiled_count(&self) -> usize {
        self.compiled.len()
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn matching_handlers(&self, event_type: &str) -> Vec<(String, Vec<Handler<D>>)> {
        self.handlers
            .iter()
            .filter(|entry| self.pattern_matches(entry.key(), event_type))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn pattern_matches(&self, pattern: &str, event_type: &str) -> bool {
        match self.compiled.get(pattern) {
            Some(compiled) => compiled.matches(event_type),
            // Racing an unsubscribe; compile without caching
            None => TopicPattern::compile(pattern).matches(event_type),
        }
    }
}

impl<D> Default for EventBus<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> std::fmt::Debug for EventBus<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("patterns", &self.handlers.len())
            .field("compiled", &self.compiled.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MockCaptureLayer;
    use std::sync::Mutex;
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, name: &'static str) -> Handler<()> {
        let log = Arc::clone(log);
        handler(move |event: &Event<()>| {
            log.lock()
                .unwrap()
                .push(format!("{}:{}", name, event.event_type));
            Ok(())
        })
    }

    fn emit(bus: &EventBus<()>, event_type: &str) -> PublishReport {
        bus.emit(event_type, "test", ())
    }

    #[test]
    fn test_exact_pattern() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.subscribe("task.created", recorder(&log, "h"));

        assert_eq!(emit(&bus, "task.created").delivered, 1);
        assert_eq!(emit(&bus, "task.updated").delivered, 0);
        assert_eq!(*log.lock().unwrap(), vec!["h:task.created"]);
    }

    #[test]
    fn test_single_segment_wildcard() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.subscribe("task.*", recorder(&log, "h"));

        assert_eq!(emit(&bus, "task.created").delivered, 1);
        assert_eq!(emit(&bus, "task.123.completed").delivered, 0);
        assert_eq!(emit(&bus, "task").delivered, 0);
    }

    #[test]
    fn test_multi_segment_wildcard() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.subscribe("task.**", recorder(&log, "h"));

        assert_eq!(emit(&bus, "task.created").delivered, 1);
        assert_eq!(emit(&bus, "task.123.completed").delivered, 1);
        assert_eq!(emit(&bus, "task.deadline.approaching").delivered, 1);
        assert_eq!(emit(&bus, "project.created").delivered, 0);
    }

    #[test]
    fn test_multiple_patterns_match() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.subscribe("task.*", recorder(&log, "one"));
        bus.subscribe("task.**", recorder(&log, "many"));
        bus.subscribe("**", recorder(&log, "all"));

        let report = emit(&bus, "task.created");
        assert_eq!(report.matched_patterns, 3);
        assert_eq!(report.delivered, 3);
    }

    #[test]
    fn test_duplicate_handler_deduplicated() {
        let bus = EventBus::new();
        let log = Log::default();
        let h = recorder(&log, "h");

        assert!(bus.subscribe("task.*", Arc::clone(&h)));
        assert!(!bus.subscribe("task.*", Arc::clone(&h)));
        assert!(bus.subscribe("task.*", recorder(&log, "h")));
        assert_eq!(bus.handler_count("task.*"), 2);

        // The same Arc under a different pattern is a separate subscription
        assert!(bus.subscribe("task.**", h));
        assert_eq!(emit(&bus, "task.created").delivered, 3);
    }

    #[test]
    fn test_handler_order_within_pattern() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.subscribe("a", recorder(&log, "first"));
        bus.subscribe("a", recorder(&log, "second"));
        bus.subscribe("a", recorder(&log, "third"));

        emit(&bus, "a");
        assert_eq!(*log.lock().unwrap(), vec!["first:a", "second:a", "third:a"]);
    }

    #[test]
    fn test_failing_handler_is_isolated() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.subscribe("task.*", recorder(&log, "before"));
        bus.subscribe("task.*", handler(|_| Err("boom".into())));
        bus.subscribe("task.*", recorder(&log, "after"));
        bus.subscribe("**", recorder(&log, "other"));

        let report = emit(&bus, "task.created");
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.invoked(), 4);
        assert_eq!(log.lock().unwrap().len(), 3);
        assert_eq!(bus.metrics().handler_failures(), 1);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.subscribe("task.*", handler(|_| panic!("handler bug")));
        bus.subscribe("task.*", recorder(&log, "after"));

        let report = emit(&bus, "task.created");
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(*log.lock().unwrap(), vec!["after:task.created"]);
    }

    #[test]
    fn test_failures_logged_at_warn() {
        let capture = MockCaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            let bus: EventBus<()> = EventBus::new();
            bus.subscribe("task.*", handler(|_| Err("db offline".into())));
            bus.subscribe("task.**", handler(|_| panic!("oops")));
            emit(&bus, "task.created");
        });

        assert_eq!(capture.count_at(Level::WARN), 2);
        let events = capture.events();
        let failed = events
            .iter()
            .find(|e| e.message == "event handler failed")
            .unwrap();
        assert_eq!(failed.field("pattern"), Some("task.*"));
        assert_eq!(failed.field("event_type"), Some("task.created"));
        assert_eq!(failed.field("error"), Some("db offline"));

        let panicked = events
            .iter()
            .find(|e| e.message == "event handler panicked")
            .unwrap();
        assert_eq!(panicked.field("panic"), Some("oops"));
    }

    #[test]
    fn test_unsubscribe_removes_pattern() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.subscribe("task.*", recorder(&log, "a"));
        bus.subscribe("task.*", recorder(&log, "b"));
        bus.subscribe("task.**", recorder(&log, "c"));
        assert_eq!(bus.compiled_count(), 2);

        assert_eq!(bus.unsubscribe("task.*"), 2);
        assert_eq!(bus.pattern_count(), 1);
        assert_eq!(bus.compiled_count(), 1);
        assert_eq!(bus.handler_count("task.*"), 0);

        log.lock().unwrap().clear();
        emit(&bus, "task.created");
        assert_eq!(*log.lock().unwrap(), vec!["c:task.created"]);

        assert_eq!(bus.unsubscribe("task.*"), 0);
    }

    #[test]
    fn test_destroy_makes_bus_inert() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.subscribe("**", recorder(&log, "h"));
        bus.subscribe("task.*", recorder(&log, "h"));

        bus.destroy();
        assert_eq!(bus.pattern_count(), 0);
        assert_eq!(bus.compiled_count(), 0);

        let report = emit(&bus, "task.created");
        assert_eq!(report, PublishReport::default());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reentrant_subscribe() {
        let bus = Arc::new(EventBus::<()>::new());
        let log = Log::default();

        let inner_bus = Arc::downgrade(&bus);
        let inner_log = Arc::clone(&log);
        bus.subscribe(
            "setup",
            handler(move |_| {
                if let Some(bus) = inner_bus.upgrade() {
                    bus.subscribe("late", recorder(&inner_log, "late"));
                    bus.unsubscribe("setup");
                }
                Ok(())
            }),
        );

        assert_eq!(emit(&bus, "setup").delivered, 1);
        assert_eq!(bus.pattern_count(), 1);
        assert_eq!(emit(&bus, "late").delivered, 1);
        assert_eq!(emit(&bus, "setup").delivered, 0);
    }

    #[test]
    fn test_publish_counted() {
        let bus = EventBus::new();
        emit(&bus, "a");
        emit(&bus, "b");
        assert_eq!(bus.metrics().events_published(), 2);
    }

    #[test]
    fn test_handler_error_display() {
        let err = HandlerError::from("failed to notify");
        assert_eq!(err.to_string(), "failed to notify");

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(HandlerError::new(io).to_string(), "disk full");
    }
}
