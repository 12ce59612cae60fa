//! # Callback vocabulary shared by tasks and daemons.
//!
//! Lifecycle callbacks are identified by name. The names below are the ones
//! the task coordinator drives itself; any other name can be routed through
//! [`Task::deliver_callback`](crate::Task::deliver_callback).

/// Runs on the surface thread before the background computation starts.
pub const PRE_EXECUTE: &str = "pre_execute";
/// The surface became usable for this task (once per attach episode).
pub const UI_READY: &str = "ui_ready";
/// The surface went away while the task was visible.
pub const UI_PAUSE: &str = "ui_pause";
/// Progress published by the background computation (repeatable).
pub const PROGRESS_UPDATE: &str = "progress_update";
/// Terminal: the background computation produced its output.
pub const POST_EXECUTE: &str = "post_execute";
/// Terminal: the computation was cancelled or panicked.
pub const CANCELLED: &str = "cancelled";

/// Returns `true` for the callbacks that close a task.
#[inline]
pub fn is_terminal(name: &str) -> bool {
    name == POST_EXECUTE || name == CANCELLED
}

/// How a callback is gated.
///
/// | mode       | already executed | detached / queue busy |
/// |------------|------------------|-----------------------|
/// | `Normal`   | dropped          | deferred              |
/// | `SkipOnce` | delivered again  | deferred              |
/// | `Force`    | delivered again  | delivered now         |
///
/// Every mode is dropped once the owner has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Exactly once per name.
    #[default]
    Normal,
    /// Repeatable; still ordered behind deferred callbacks.
    SkipOnce,
    /// Straight to the surface thread; used for attach/detach driven transitions.
    Force,
}

/// What happened to a delivered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Posted to the surface thread and recorded as executed.
    Ran,
    /// Parked in the pending queue until the next attach.
    Deferred,
    /// Discarded (duplicate, finished owner or full queue).
    Dropped,
}

impl Delivery {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Delivery::Ran => "ran",
            Delivery::Deferred => "deferred",
            Delivery::Dropped => "dropped",
        }
    }
}

/// Coarse lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Created, not executed yet.
    Pending,
    /// Executed; the terminal callback has not run.
    Running,
    /// `post_execute` or `cancelled` ran.
    Finished,
}
