use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;

use crate::{
    config::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
    surface::Surface,
};
use super::registry::Registry;

/// Builder for constructing a [`Registry`] with optional features.
pub struct RegistryBuilder {
    surface: Arc<dyn Surface>,
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    runtime: Option<Handle>,
}

impl RegistryBuilder {
    /// Creates a new builder for `surface` with the default configuration.
    pub fn new(surface: Arc<dyn Surface>) -> Self {
        Self {
            surface,
            cfg: Config::default(),
            subscribers: Vec::new(),
            runtime: None,
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive registry events (attach/detach, callback delivery,
    /// daemon transitions) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Runtime that background computations, daemon loops and subscriber
    /// workers are spawned on.
    ///
    /// Defaults to [`Handle::current`] at [`build`](Self::build) time.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds and returns the registry.
    ///
    /// Initializes the event bus and, when subscribers were given, the
    /// subscriber workers plus the listener forwarding bus events to them.
    ///
    /// # Panics
    /// Panics if no runtime was given and this is called outside a tokio runtime.
    pub fn build(self) -> Arc<Registry> {
        let runtime = self.runtime.unwrap_or_else(Handle::current);
        let bus = Bus::new(self.cfg.bus_capacity_clamped());

        let subs = if self.subscribers.is_empty() {
            None
        } else {
            let set = Arc::new(SubscriberSet::new(self.subscribers, bus.clone(), &runtime));
            spawn_listener(&runtime, &bus, Arc::downgrade(&set));
            Some(set)
        };

        Arc::new(Registry::new_internal(
            self.surface,
            self.cfg,
            bus,
            runtime,
            subs,
        ))
    }
}

/// Forwards bus events to the subscriber set until the set or the bus goes away.
///
/// Holds the set weakly so that dropping the registry releases it.
fn spawn_listener(runtime: &Handle, bus: &Bus, set: std::sync::Weak<SubscriberSet>) {
    let mut rx = bus.subscribe();
    runtime.spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => match set.upgrade() {
                    Some(set) => set.emit(&ev),
                    None => break,
                },
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}
