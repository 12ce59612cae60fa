/// Lifecycle of a [`Daemon`](crate::Daemon).
///
/// ```text
/// Idle ──start──► Running ⇄ Paused
///                    │        │
///                    └─stop───┴──► Stopping ──(loop exits)──► Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// Created; `start` has not been called.
    Idle,
    /// The loop is ticking.
    Running,
    /// The loop waits for `resume` before the next tick.
    Paused,
    /// Stop requested; the loop exits at the next iteration boundary.
    Stopping,
    /// The loop exited. Terminal.
    Stopped,
}

impl DaemonState {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DaemonState::Idle => "idle",
            DaemonState::Running => "running",
            DaemonState::Paused => "paused",
            DaemonState::Stopping => "stopping",
            DaemonState::Stopped => "stopped",
        }
    }

    /// `Running` or `Paused`.
    pub fn is_active(&self) -> bool {
        matches!(self, DaemonState::Running | DaemonState::Paused)
    }
}
