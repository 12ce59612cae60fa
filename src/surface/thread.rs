//! # Dedicated surface thread.
//!
//! [`SurfaceThread`] owns one named OS thread that drains an unbounded job
//! channel in FIFO order. It is the reference [`Surface`] used by tests and
//! by embedders that have no UI toolkit thread of their own.
//!
//! ## Rules
//! - Jobs run one at a time, in posting order.
//! - A panicking job is caught and logged; the thread keeps draining.
//! - The thread exits once the last [`SurfaceThread`] handle is dropped and
//!   the queue is empty.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tokio::sync::{mpsc, oneshot};

use crate::error::panic_message;
use crate::surface::{Surface, SurfaceJob};

/// Surface implementation backed by a dedicated OS thread.
pub struct SurfaceThread {
    tx: mpsc::UnboundedSender<SurfaceJob>,
    id: ThreadId,
}

impl SurfaceThread {
    /// Spawns the thread and returns a shared handle to it.
    pub fn spawn(name: impl Into<String>) -> std::io::Result<Arc<Self>> {
        let (tx, mut rx) = mpsc::unbounded_channel::<SurfaceJob>();
        let handle = thread::Builder::new().name(name.into()).spawn(move || {
            while let Some(job) = rx.blocking_recv() {
                if let Err(panic_err) = std::panic::catch_unwind(AssertUnwindSafe(job)) {
                    tracing::warn!(
                        reason = %panic_message(&*panic_err),
                        "surface job panicked"
                    );
                }
            }
        })?;

        Ok(Arc::new(Self {
            tx,
            id: handle.thread().id(),
        }))
    }

    /// Returns `true` when called from the surface thread itself.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }

    /// Waits until every job posted before this call has run.
    ///
    /// Must not be awaited from the surface thread itself.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        self.run_on_surface_thread(Box::new(move || {
            let _ = done_tx.send(());
        }));
        let _ = done_rx.await;
    }

    /// Blocking variant of [`flush`](Self::flush) for non-async callers.
    ///
    /// Must not be called from the surface thread or from inside an async context.
    pub fn flush_blocking(&self) {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        self.run_on_surface_thread(Box::new(move || {
            let _ = done_tx.send(());
        }));
        let _ = done_rx.blocking_recv();
    }
}

impl Surface for SurfaceThread {
    fn run_on_surface_thread(&self, job: SurfaceJob) {
        if self.tx.send(job).is_err() {
            tracing::warn!("surface thread is gone; job discarded");
        }
    }

    fn name(&self) -> &'static str {
        "surface-thread"
    }
}
