//! Error types used by the registry, tasks and daemons.
//!
//! This module defines two error enums:
//!
//! - [`RuntimeError`]: misuse reported synchronously to the caller of
//!   `register`, `execute`, `start` or an import.
//! - [`TaskError`]: outcome of a task's background computation as observed
//!   through [`Task::get`](crate::Task::get).
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logs/metrics.
//! Lifecycle signals that arrive out of order (a `resume` on a daemon that never
//! started, a duplicate callback) are not errors; they are absorbed as no-ops.

use std::time::Duration;
use thiserror::Error;

/// # Errors reported to the caller of a registry-level operation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The tag is already held by a live (not finished, not stopped) entry.
    #[error("tag {tag:?} is held by an active entry")]
    AlreadyActive {
        /// The contested tag.
        tag: String,
    },

    /// The task was executed before, or its tag slot is occupied by another live task.
    #[error("task {tag:?} has already been started or has finished")]
    AlreadyRunning {
        /// Tag of the task.
        tag: String,
    },

    /// The daemon left `Idle` already; daemons are single-use.
    #[error("daemon {tag:?} has already been started or has finished")]
    AlreadyStarted {
        /// Tag of the daemon.
        tag: String,
    },

    /// The registry the entry was bound to has been dropped.
    #[error("registry of {tag:?} is gone")]
    RegistryGone {
        /// Tag of the orphaned entry.
        tag: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use attachvisor::RuntimeError;
    ///
    /// let err = RuntimeError::AlreadyActive { tag: "load".into() };
    /// assert_eq!(err.as_label(), "runtime_already_active");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyActive { .. } => "runtime_already_active",
            RuntimeError::AlreadyRunning { .. } => "runtime_already_running",
            RuntimeError::AlreadyStarted { .. } => "runtime_already_started",
            RuntimeError::RegistryGone { .. } => "runtime_registry_gone",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::AlreadyActive { tag } => format!("active entry holds tag={tag}"),
            RuntimeError::AlreadyRunning { tag } => format!("task already executed tag={tag}"),
            RuntimeError::AlreadyStarted { tag } => format!("daemon already started tag={tag}"),
            RuntimeError::RegistryGone { tag } => format!("registry dropped tag={tag}"),
        }
    }

    /// Returns the tag the error refers to.
    pub fn tag(&self) -> &str {
        match self {
            RuntimeError::AlreadyActive { tag }
            | RuntimeError::AlreadyRunning { tag }
            | RuntimeError::AlreadyStarted { tag }
            | RuntimeError::RegistryGone { tag } => tag,
        }
    }
}

/// # Outcome errors of a task's background computation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Cancellation was requested before the computation produced a usable result.
    #[error("task cancelled")]
    Cancelled,

    /// The background computation panicked.
    #[error("background computation panicked: {reason}")]
    Panicked {
        /// Panic payload rendered as text.
        reason: String,
    },

    /// `get_timeout` gave up waiting.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use attachvisor::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Cancelled => "task_cancelled",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Timeout { .. } => "task_timeout",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Cancelled => "cancelled".to_string(),
            TaskError::Panicked { reason } => format!("panic: {reason}"),
            TaskError::Timeout { timeout } => format!("timeout: {timeout:?}"),
        }
    }

    /// Indicates whether waiting again may still yield a result.
    ///
    /// Only [`TaskError::Timeout`] is transient; the others are final outcomes.
    pub fn is_transient(&self) -> bool {
        matches!(self, TaskError::Timeout { .. })
    }
}

/// Renders a panic payload the way the subscriber workers and task runner report it.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(
            RuntimeError::AlreadyRunning { tag: "t".into() }.as_label(),
            "runtime_already_running"
        );
        assert_eq!(
            RuntimeError::RegistryGone { tag: "t".into() }.as_label(),
            "runtime_registry_gone"
        );
        assert_eq!(TaskError::Cancelled.as_label(), "task_cancelled");
        assert_eq!(
            TaskError::Panicked { reason: "x".into() }.as_label(),
            "task_panicked"
        );
    }

    #[test]
    fn tag_is_exposed_for_every_variant() {
        let err = RuntimeError::AlreadyStarted { tag: "ticker".into() };
        assert_eq!(err.tag(), "ticker");
        assert_eq!(err.as_message(), "daemon already started tag=ticker");
    }

    #[test]
    fn only_timeout_is_transient() {
        assert!(
            TaskError::Timeout {
                timeout: Duration::from_millis(5)
            }
            .is_transient()
        );
        assert!(!TaskError::Cancelled.is_transient());
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
