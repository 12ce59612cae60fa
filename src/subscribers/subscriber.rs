//! # Observers of registry activity.
//!
//! A [`Subscribe`] implementation sees every [`Event`] a registry publishes:
//! surface attach/detach, task and daemon slots being taken or released,
//! callbacks that ran, were parked or were discarded, hand-off moves.
//!
//! Subscribers are handed to [`RegistryBuilder::with_subscribers`](crate::RegistryBuilder::with_subscribers)
//! and run on the registry's runtime, never on the surface thread. A
//! subscriber that falls behind loses events rather than holding up a
//! callback delivery.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use async_trait::async_trait;
//! use attachvisor::{Event, EventKind, Subscribe};
//!
//! /// Counts callbacks parked while the surface was away.
//! #[derive(Default)]
//! struct Parked(AtomicUsize);
//!
//! #[async_trait]
//! impl Subscribe for Parked {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::CallbackDeferred {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "parked"
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Receives the events of one registry.
///
/// Events arrive one at a time and in publish order. A panic inside
/// `on_event` is caught; the subscriber keeps receiving later events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Label carried by `SubscriberOverflow` / `SubscriberPanicked` events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Events buffered for this subscriber before new ones are dropped (min 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
