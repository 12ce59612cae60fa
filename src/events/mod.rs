//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the registry, tasks, daemon loops
//! and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Registry` (attach/detach, registration, hand-off),
//!   `Task` (callback delivery), `Daemon` (loop transitions),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the registry listener (fans out to `SubscriberSet`) and
//!   any receiver obtained from `Registry::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
