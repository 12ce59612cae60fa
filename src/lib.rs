//! # attachvisor
//!
//! **Attachvisor** runs background work on behalf of a transient front-end
//! *surface* (a window, a screen, a view) that can be attached and detached
//! at any time.
//!
//! Two primitives are provided:
//! - [`Task`]: a one-shot background computation whose lifecycle callbacks
//!   run on the surface thread exactly once and in order, parked in a
//!   pending queue while the surface is detached and replayed on re-attach.
//! - [`Daemon`]: a periodic worker that is paused while the surface is
//!   detached and resumed when it comes back, stoppable from any thread.
//!
//! ## Architecture
//! ```text
//!   surface adapter
//!     │ set_attached(bool)                       run_on_surface_thread(job)
//!     ▼                                                   ▲
//! ┌───────────────────────────────────────────────────────┼──────────┐
//! │  Registry (one per surface instance)                  │          │
//! │  - tag → Task slot, tag → Daemon slot                 │          │
//! │  - attached flag, attach/detach fan-out               │          │
//! │  - Bus (broadcast events) ──► SubscriberSet           │          │
//! └──────┬──────────────────────────────┬─────────────────┼──────────┘
//!        │ on_attach_ui / on_detach_ui  │ on_resume / on_pause
//!        ▼                              ▼                 │
//!   ┌──────────┐                   ┌──────────┐           │
//!   │   Task   │── callbacks ─────►│  Daemon  │── on_stopped, custom
//!   │ (Job)    │   (or pending)    │ (Worker) │   (or pending)
//!   └────┬─────┘                   └────┬─────┘
//!        ▼                              ▼
//!   in_background (tokio)          tick loop (tokio)
//! ```
//!
//! ## Task lifecycle
//! ```text
//! pre_execute → ui_ready → [background] → progress_update* → post_execute | cancelled
//!                   ⇅ ui_pause / ui_ready on every detach / attach
//! ```
//!
//! ## Surface hand-off
//! When the surface is torn down and recreated, [`HandOff::park`] moves the
//! live entries out of the old registry and [`HandOff::restore`] moves them
//! into the new one under a stable logical name.
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Tasks**         | One-shot computations with replayed surface callbacks.       | [`Task`], [`Job`], [`TaskContext`]         |
//! | **Daemons**       | Periodic workers following the surface.                      | [`Daemon`], [`Worker`], [`WorkerFn`]       |
//! | **Registry**      | Tag slots, attach/detach fan-out, export/import.             | [`Registry`], [`RegistryBuilder`], [`HandOff`] |
//! | **Surface**       | Surface-thread capability and a built-in thread.             | [`Surface`], [`SurfaceThread`]             |
//! | **Subscriber API**| Observe registry, task and daemon events.                    | [`Subscribe`], [`Event`]                   |
//! | **Errors**        | Typed errors for misuse and task outcomes.                   | [`RuntimeError`], [`TaskError`]            |
//! | **Configuration** | Queue caps, bus capacity, daemon defaults.                   | [`Config`]                                 |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber _(renders events through `tracing`)_.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use attachvisor::{Job, Registry, SurfaceThread, Task, TaskContext};
//!
//! struct Load;
//!
//! #[async_trait]
//! impl Job for Load {
//!     type Params = u32;
//!     type Progress = ();
//!     type Output = u32;
//!
//!     async fn in_background(&self, n: u32, _ctx: TaskContext<Self>) -> u32 {
//!         n * 2
//!     }
//!
//!     fn on_post_execute(&self, out: &u32) {
//!         println!("loaded {out}");
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let surface = SurfaceThread::spawn("surface")?;
//!     let registry = Registry::new(surface.clone());
//!
//!     // Executed while detached: pre_execute waits in the pending queue.
//!     let task = Task::new(&registry, "load", Load);
//!     task.execute(21)?;
//!
//!     // Attaching replays pre_execute, ui_ready, then releases the computation.
//!     registry.set_attached(true);
//!     assert_eq!(task.get().await?, 42);
//!
//!     task.closed().await;
//!     surface.flush().await;
//!     assert!(registry.task("load").is_none());
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod daemons;
mod error;
mod events;
mod subscribers;
mod surface;
mod tasks;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{DaemonEntry, HandOff, Registry, RegistryBuilder, RegistrySnapshot, TaskEntry};
pub use daemons::{Daemon, DaemonContext, DaemonState, ON_STOPPED, Worker, WorkerFn};
pub use error::{RuntimeError, TaskError};
pub use events::{Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};
pub use surface::{Surface, SurfaceJob, SurfaceThread};
pub use tasks::{
    CANCELLED, Delivery, DeliveryMode, Job, POST_EXECUTE, PRE_EXECUTE, PROGRESS_UPDATE, Task,
    TaskContext, TaskStatus, UI_PAUSE, UI_READY,
};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
