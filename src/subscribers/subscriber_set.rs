//! # Per-registry subscriber fan-out.
//!
//! The registry's listener forwards every bus event to [`SubscriberSet::emit`].
//! Each subscriber owns a bounded queue drained by its own worker task, so a
//! slow or panicking subscriber never stalls the others or the publisher.
//!
//! ```text
//! bus ──► listener ──► emit ──┬─► queue ──► worker ──► on_event
//!                             └─► queue ──► worker ──► on_event
//! ```
//!
//! A full or closed queue drops the event for that subscriber and publishes
//! `SubscriberOverflow`; overflow notices are never reported about themselves.
//! Panics are caught per event with `AssertUnwindSafe`.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};

use crate::error::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Lane {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Subscribers of one registry, each behind its own queue.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber on `runtime`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus, runtime: &Handle) -> Self {
        let (lanes, workers) = subs
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let lane = Lane {
                    name: sub.name(),
                    tx,
                };
                (lane, runtime.spawn(drain(sub, rx, bus.clone())))
            })
            .unzip();
        Self {
            lanes,
            workers,
            bus,
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// `true` when no subscriber was given.
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Queues a copy of `event` for every subscriber.
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Queues `event` for every subscriber without copying it.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let quiet = event.kind == EventKind::SubscriberOverflow;
        for lane in &self.lanes {
            let reason = match lane.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !quiet {
                self.bus.publish(Event::subscriber_overflow(lane.name, reason));
            }
        }
    }

    /// Closes every queue and waits for the workers to drain what is left.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn drain(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev)).catch_unwind().await;
        if let Err(panic_err) = handled {
            bus.publish(Event::subscriber_panicked(sub.name(), panic_message(&*panic_err)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Collect(Mutex<Vec<u64>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.seq);
        }
        fn name(&self) -> &'static str {
            "collect"
        }
    }

    struct Explode(AtomicUsize);

    #[async_trait]
    impl Subscribe for Explode {
        async fn on_event(&self, _ev: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
            panic!("subscriber exploded");
        }
        fn name(&self) -> &'static str {
            "explode"
        }
    }

    #[tokio::test]
    async fn delivers_in_fifo_order_per_subscriber() {
        let bus = Bus::new(16);
        let collect = Arc::new(Collect(Mutex::new(Vec::new())));
        let set = SubscriberSet::new(vec![collect.clone() as Arc<dyn Subscribe>], bus, &Handle::current());

        let a = Event::new(EventKind::TaskRegistered);
        let b = Event::new(EventKind::TaskRemoved);
        set.emit(&a);
        set.emit(&b);
        set.shutdown().await;

        assert_eq!(*collect.0.lock().unwrap(), vec![a.seq, b.seq]);
    }

    struct Stuck;

    #[async_trait]
    impl Subscribe for Stuck {
        async fn on_event(&self, _ev: &Event) {
            std::future::pending::<()>().await;
        }
        fn name(&self) -> &'static str {
            "stuck"
        }
        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn full_queue_reports_overflow_for_that_subscriber() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Stuck) as Arc<dyn Subscribe>], bus, &Handle::current());

        for _ in 0..3 {
            set.emit(&Event::new(EventKind::CallbackDeferred));
        }
        let ev = rx.recv().await.unwrap();
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.tag.as_deref(), Some("stuck"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=stuck reason=full"));
    }

    #[tokio::test]
    async fn panics_are_reported_on_the_bus() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let explode = Arc::new(Explode(AtomicUsize::new(0)));
        let set = SubscriberSet::new(vec![explode.clone() as Arc<dyn Subscribe>], bus, &Handle::current());

        set.emit(&Event::new(EventKind::SurfaceAttached));
        let ev = rx.recv().await.unwrap();
        assert!(ev.is_subscriber_panic());
        assert_eq!(ev.tag.as_deref(), Some("explode"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber exploded"));

        set.emit(&Event::new(EventKind::SurfaceDetached));
        set.shutdown().await;
        assert_eq!(explode.0.load(Ordering::SeqCst), 2);
    }
}
