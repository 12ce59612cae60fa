//! # LogWriter: event renderer over `tracing`
//!
//! A minimal subscriber that renders incoming [`Event`]s as `tracing` records.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output
//! ```text
//! INFO  attachvisor: surface attached entries=2
//! DEBUG attachvisor: callback deferred tag="load" callback="pre_execute" reason="detached"
//! DEBUG attachvisor: callback ran tag="load" callback="pre_execute"
//! INFO  attachvisor: task finished tag="load" callback="post_execute"
//! INFO  attachvisor: daemon stopped tag="ticker" iterations=12
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let tag = e.tag.as_deref().unwrap_or("-");
        let callback = e.callback.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::SurfaceAttached => {
                tracing::info!(target: "attachvisor", entries = ?e.count, "surface attached");
            }
            EventKind::SurfaceDetached => {
                tracing::info!(target: "attachvisor", entries = ?e.count, "surface detached");
            }
            EventKind::EntriesExported => {
                tracing::info!(target: "attachvisor", entries = ?e.count, "entries exported");
            }
            EventKind::EntriesImported => {
                tracing::info!(target: "attachvisor", entries = ?e.count, "entries imported");
            }
            EventKind::TaskRegistered => {
                tracing::debug!(target: "attachvisor", tag, "task registered");
            }
            EventKind::TaskRemoved => {
                tracing::debug!(target: "attachvisor", tag, "task removed");
            }
            EventKind::CallbackRan => {
                tracing::debug!(target: "attachvisor", tag, callback, "callback ran");
            }
            EventKind::CallbackDeferred => {
                tracing::debug!(target: "attachvisor", tag, callback, reason, "callback deferred");
            }
            EventKind::CallbackDropped => {
                tracing::debug!(target: "attachvisor", tag, callback, reason, "callback dropped");
            }
            EventKind::TaskFinished => {
                tracing::info!(target: "attachvisor", tag, callback, "task finished");
            }
            EventKind::TaskPanicked => {
                tracing::warn!(target: "attachvisor", tag, reason, "background computation panicked");
            }
            EventKind::DaemonRegistered => {
                tracing::debug!(target: "attachvisor", tag, "daemon registered");
            }
            EventKind::DaemonRemoved => {
                tracing::debug!(target: "attachvisor", tag, "daemon removed");
            }
            EventKind::DaemonStarted => {
                tracing::info!(target: "attachvisor", tag, "daemon started");
            }
            EventKind::DaemonPaused => {
                tracing::debug!(target: "attachvisor", tag, "daemon paused");
            }
            EventKind::DaemonResumed => {
                tracing::debug!(target: "attachvisor", tag, "daemon resumed");
            }
            EventKind::DaemonStopping => {
                tracing::debug!(target: "attachvisor", tag, "daemon stopping");
            }
            EventKind::DaemonStopped => {
                tracing::info!(target: "attachvisor", tag, iterations = ?e.iteration, "daemon stopped");
            }
            EventKind::WorkerPanicked => {
                tracing::warn!(target: "attachvisor", tag, iteration = ?e.iteration, reason, "worker panicked");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "attachvisor", subscriber = tag, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(target: "attachvisor", subscriber = tag, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }

    fn queue_capacity(&self) -> usize {
        4096
    }
}
