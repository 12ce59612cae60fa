//! # Surface-thread capability.
//!
//! The surface is the transient front-end object that comes and goes; the
//! only thing this crate needs from it is a way to run a closure on the
//! thread the surface requires. Attachment state is tracked by the
//! [`Registry`](crate::Registry), which the surface adapter drives through
//! [`Registry::set_attached`](crate::Registry::set_attached).
//!
//! - [`Surface`] trait implemented by the embedding adapter
//! - [`SurfaceThread`] built-in implementation: one dedicated OS thread fed by a channel

mod thread;

pub use thread::SurfaceThread;

/// Unit of work destined for the surface thread.
pub type SurfaceJob = Box<dyn FnOnce() + Send + 'static>;

/// Runs closures on the surface thread.
///
/// ### Contract
/// - Jobs posted from one thread run in the order they were posted (FIFO).
/// - `run_on_surface_thread` must not run the job inline on the caller's
///   stack: tasks post jobs while holding their own lock, and a job is
///   allowed to call back into the task that posted it.
/// - Posting must not block on the job's completion.
pub trait Surface: Send + Sync + 'static {
    /// Schedules `job` on the surface thread.
    fn run_on_surface_thread(&self, job: SurfaceJob);

    /// Returns the surface name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
