//! Registry core: tag slots, attach/detach fan-out and surface hand-off.
//!
//! Internal modules:
//! - [`registry`]: tag-keyed slots, attachment state, export/import;
//! - [`builder`]: registry construction (config, subscribers, runtime);
//! - [`pending`]: ordered, last-write-wins queue of deferred surface jobs;
//! - [`handoff`]: parks exported entries under a stable logical name.

mod builder;
mod handoff;
pub(crate) mod pending;
mod registry;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use builder::RegistryBuilder;
pub use handoff::HandOff;
pub use registry::{DaemonEntry, Registry, RegistrySnapshot, TaskEntry};

/// Locks `m`, recovering the guard if a previous holder panicked.
///
/// Every critical section in this crate leaves its state consistent before
/// running user code, so a poisoned lock carries no torn state.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
