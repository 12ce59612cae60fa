//! # Job abstraction.
//!
//! A [`Job`] is the user half of a [`Task`](crate::Task): one async
//! background computation plus the lifecycle callbacks that run on the
//! surface thread. The coordinator decides *when* each callback runs; the job
//! only says *what* it does.

use async_trait::async_trait;

use crate::tasks::TaskContext;

/// # Background computation with surface-thread callbacks.
///
/// `in_background` runs on the runtime, never on the surface thread, and only
/// after `on_pre_execute` has run. Every `on_*` method runs on the surface
/// thread and should be short.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use attachvisor::{Job, TaskContext};
///
/// struct Sum;
///
/// #[async_trait]
/// impl Job for Sum {
///     type Params = Vec<u64>;
///     type Progress = usize;
///     type Output = u64;
///
///     async fn in_background(&self, params: Vec<u64>, ctx: TaskContext<Self>) -> u64 {
///         let mut total = 0;
///         for (i, n) in params.iter().enumerate() {
///             if ctx.is_cancelled() {
///                 break;
///             }
///             total += n;
///             ctx.publish_progress(i + 1);
///         }
///         total
///     }
///
///     fn on_post_execute(&self, total: &u64) {
///         println!("sum = {total}");
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync + Sized + 'static {
    /// Input moved into the background computation by [`Task::execute`](crate::Task::execute).
    type Params: Send + 'static;
    /// Payload of [`TaskContext::publish_progress`].
    type Progress: Send + 'static;
    /// Result of the computation; cloned out by [`Task::get`](crate::Task::get).
    type Output: Clone + Send + Sync + 'static;

    /// The background computation.
    ///
    /// Should check `ctx.is_cancelled()` and return early once cancellation is requested.
    async fn in_background(&self, params: Self::Params, ctx: TaskContext<Self>) -> Self::Output;

    /// First callback of every task.
    fn on_pre_execute(&self) {}

    /// The surface is attached and `on_pre_execute` has run.
    fn on_ui_ready(&self) {}

    /// The surface detached after `on_ui_ready`.
    fn on_ui_pause(&self) {}

    /// Latest progress; intermediate values published while detached are collapsed.
    fn on_progress_update(&self, _progress: Self::Progress) {}

    /// Terminal callback for a computation that completed without cancellation.
    fn on_post_execute(&self, _output: &Self::Output) {}

    /// Terminal callback for a cancelled or panicked computation.
    ///
    /// `output` is present when the computation returned after cancellation was requested.
    fn on_cancelled(&self, _output: Option<&Self::Output>) {}
}
