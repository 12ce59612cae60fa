//! # Runtime events emitted by the registry, tasks and daemons.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Surface events**: attach/detach transitions and bulk hand-off
//! - **Task events**: registration, callback delivery, completion
//! - **Daemon events**: registration and loop state transitions
//! - **Subscriber events**: overflow and panics of subscriber workers
//!
//! The [`Event`] struct carries additional metadata such as the entry tag,
//! the callback name, a reason and the daemon iteration.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use attachvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::CallbackDeferred)
//!     .with_tag("load")
//!     .with_callback("pre_execute")
//!     .with_reason("detached");
//!
//! assert_eq!(ev.kind, EventKind::CallbackDeferred);
//! assert_eq!(ev.tag.as_deref(), Some("load"));
//! assert_eq!(ev.callback.as_deref(), Some("pre_execute"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `tag`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `tag`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Surface events ===
    /// The surface became attached; every entry is being informed.
    ///
    /// Sets:
    /// - `count`: number of entries notified
    SurfaceAttached,

    /// The surface became detached; every entry is being informed.
    ///
    /// Sets:
    /// - `count`: number of entries notified
    SurfaceDetached,

    /// Live entries were moved out of a registry for a hand-off.
    ///
    /// Sets:
    /// - `count`: number of entries exported
    EntriesExported,

    /// Entries were moved into a registry from a hand-off.
    ///
    /// Sets:
    /// - `count`: number of entries imported
    EntriesImported,

    // === Task events ===
    /// A task claimed its tag slot.
    ///
    /// Sets:
    /// - `tag`: task tag
    TaskRegistered,

    /// A task left its tag slot (finished or unregistered).
    ///
    /// Sets:
    /// - `tag`: task tag
    TaskRemoved,

    /// A callback was handed to the surface thread.
    ///
    /// Sets:
    /// - `tag`: task or daemon tag
    /// - `callback`: callback name
    CallbackRan,

    /// A callback was parked in the pending queue.
    ///
    /// Sets:
    /// - `tag`: task or daemon tag
    /// - `callback`: callback name
    /// - `reason`: `detached`, `queue_busy` or `registry_gone`
    CallbackDeferred,

    /// A callback was discarded.
    ///
    /// Sets:
    /// - `tag`: task or daemon tag
    /// - `callback`: callback name
    /// - `reason`: `already_executed`, `finished` or `queue_full`
    CallbackDropped,

    /// The terminal callback ran; the task is closed.
    ///
    /// Sets:
    /// - `tag`: task tag
    /// - `callback`: `post_execute` or `cancelled`
    TaskFinished,

    /// The background computation panicked.
    ///
    /// Sets:
    /// - `tag`: task tag
    /// - `reason`: panic message
    TaskPanicked,

    // === Daemon events ===
    /// A daemon claimed its tag slot.
    ///
    /// Sets:
    /// - `tag`: daemon tag
    DaemonRegistered,

    /// A daemon left its tag slot.
    ///
    /// Sets:
    /// - `tag`: daemon tag
    DaemonRemoved,

    /// The daemon loop was spawned.
    ///
    /// Sets:
    /// - `tag`: daemon tag
    DaemonStarted,

    /// The daemon transitioned `Running → Paused`.
    DaemonPaused,

    /// The daemon transitioned `Paused → Running`.
    DaemonResumed,

    /// Stop was requested; the loop exits at the next boundary.
    DaemonStopping,

    /// The daemon loop exited.
    ///
    /// Sets:
    /// - `tag`: daemon tag
    /// - `iteration`: number of completed iterations
    DaemonStopped,

    /// One worker iteration panicked; the loop keeps going.
    ///
    /// Sets:
    /// - `tag`: daemon tag
    /// - `iteration`: iteration that panicked
    /// - `reason`: panic message
    WorkerPanicked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Tag of the task or daemon (or subscriber name), if applicable.
    pub tag: Option<Arc<str>>,
    /// Callback name, if applicable.
    pub callback: Option<Arc<str>>,
    /// Human-readable reason (drop cause, panic message, etc.).
    pub reason: Option<Arc<str>>,
    /// Daemon iteration counter (starting from 1).
    pub iteration: Option<u64>,
    /// Number of entries affected by a registry-wide operation.
    pub count: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            tag: None,
            callback: None,
            reason: None,
            iteration: None,
            count: None,
        }
    }

    /// Attaches an entry tag.
    #[inline]
    pub fn with_tag(mut self, tag: impl Into<Arc<str>>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Attaches a callback name.
    #[inline]
    pub fn with_callback(mut self, callback: impl Into<Arc<str>>) -> Self {
        self.callback = Some(callback.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a daemon iteration counter.
    #[inline]
    pub fn with_iteration(mut self, n: u64) -> Self {
        self.iteration = Some(n);
        self
    }

    /// Attaches an entry count (saturates at `u32::MAX`).
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_tag(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_tag(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::TaskRegistered);
        let b = Event::new(EventKind::TaskRemoved);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn count_saturates() {
        let ev = Event::new(EventKind::EntriesExported).with_count(usize::MAX);
        assert_eq!(ev.count, Some(u32::MAX));
    }

    #[test]
    fn subscriber_helpers_classify() {
        let ev = Event::subscriber_overflow("metrics", "full");
        assert!(ev.is_subscriber_overflow());
        assert!(!ev.is_subscriber_panic());
        assert_eq!(ev.tag.as_deref(), Some("metrics"));
    }
}
