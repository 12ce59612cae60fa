//! # Surface-aware one-shot tasks.
//!
//! This module provides the task-related types:
//! - [`Job`] - trait for the background computation and its lifecycle callbacks
//! - [`Task`] - coordinator replaying callbacks exactly once across attach/detach
//! - [`TaskContext`] - handle given to the background computation
//! - callback names, [`DeliveryMode`], [`Delivery`] and [`TaskStatus`]

pub(crate) mod callback;
mod job;
mod task;

pub use callback::{
    CANCELLED, Delivery, DeliveryMode, POST_EXECUTE, PRE_EXECUTE, PROGRESS_UPDATE, TaskStatus,
    UI_PAUSE, UI_READY,
};
pub use job::Job;
pub use task::{Task, TaskContext};
