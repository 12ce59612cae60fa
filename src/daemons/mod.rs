//! # Pausable periodic workers.
//!
//! - [`Worker`] - trait for the repeated unit of work
//! - [`WorkerFn`] - closure-backed worker
//! - [`Daemon`] - loop with start/pause/resume/stop control, driven by the registry
//! - [`DaemonContext`] - per-tick handle (iteration, surface callbacks)
//! - [`DaemonState`] - lifecycle states

mod daemon;
mod state;
mod worker;

pub use daemon::{Daemon, DaemonContext, ON_STOPPED};
pub use state::DaemonState;
pub use worker::{Worker, WorkerFn};
