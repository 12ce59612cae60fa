//! # Daemon: pausable periodic worker.
//!
//! A [`Daemon`] repeats one [`Worker`] on the registry's runtime and follows
//! the surface: the registry pauses it on detach and resumes it on attach.
//!
//! ## Loop
//! ```text
//! start ──► register tag ──► Running ──► spawn loop:
//!
//! sleep(delay)                       (once; cut short by stop)
//! loop {
//!   ├─► wait while Paused
//!   ├─► Stopping? ──► break
//!   ├─► tick(params, ctx)            (panic caught, WorkerPanicked)
//!   └─► sleep(timeout)               (cut short by stop)
//! }
//! Stopped ──► on_stopped (surface thread, or pending until attach)
//!         ──► release tag once nothing is pending
//! ```
//!
//! ## Rules
//! - One loop per instance; a daemon is single-use once started.
//! - `pause` only acts on `Running`, `resume` only on `Paused`.
//! - `stop` from `Paused` resumes first, so a paused loop always exits.
//! - State lives in a `watch` channel: the loop cannot miss a transition.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::time;

use crate::core::pending::{Pending, PendingQueue, Push};
use crate::core::{DaemonEntry, Registry, lock};
use crate::daemons::{DaemonState, Worker};
use crate::error::{RuntimeError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::surface::SurfaceJob;
use crate::tasks::{Delivery, DeliveryMode};

/// Name of the completion callback delivered once the loop exits.
pub const ON_STOPPED: &str = "on_stopped";

struct DaemonSlot {
    registry: Weak<Registry>,
    bus: Bus,
    pending: PendingQueue,
}

/// Non-generic half of a daemon: what the registry and the worker context see.
pub(crate) struct DaemonShared {
    tag: Arc<str>,
    state: watch::Sender<DaemonState>,
    slot: Mutex<DaemonSlot>,
    iterations: AtomicU64,
}

/// Handle to a pausable periodic worker.
///
/// Cloning yields another handle to the same daemon.
pub struct Daemon<W: Worker> {
    shared: Arc<DaemonShared>,
    worker: Arc<W>,
    params: Arc<W::Params>,
}

impl<W: Worker> Clone for Daemon<W> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            worker: Arc::clone(&self.worker),
            params: Arc::clone(&self.params),
        }
    }
}

impl<W: Worker> Daemon<W> {
    /// Creates an idle daemon bound to `registry` under `tag`.
    pub fn new(registry: &Arc<Registry>, tag: impl Into<String>, params: W::Params, worker: W) -> Self {
        let slot = DaemonSlot {
            registry: Arc::downgrade(registry),
            bus: registry.bus().clone(),
            pending: PendingQueue::new(registry.config().pending_limit()),
        };
        Self {
            shared: Arc::new(DaemonShared {
                tag: Arc::from(tag.into()),
                state: watch::channel(DaemonState::Idle).0,
                slot: Mutex::new(slot),
                iterations: AtomicU64::new(0),
            }),
            worker: Arc::new(worker),
            params: Arc::new(params),
        }
    }

    /// Tag the daemon is keyed by.
    pub fn tag(&self) -> &str {
        &self.shared.tag
    }

    /// Starts the loop with the registry's default timeout and delay.
    ///
    /// # Errors
    /// See [`start_with`](Self::start_with).
    pub fn start(&self) -> Result<(), RuntimeError> {
        let defaults = lock(&self.shared.slot)
            .registry
            .upgrade()
            .map(|r| (r.config().daemon_timeout, r.config().daemon_delay));
        match defaults {
            Some((timeout, delay)) => self.start_with(timeout, delay),
            None => Err(RuntimeError::RegistryGone {
                tag: self.shared.tag.to_string(),
            }),
        }
    }

    /// Registers the tag and spawns the loop.
    ///
    /// `delay` is slept once before the first tick, `timeout` after every tick.
    ///
    /// # Errors
    /// - [`RuntimeError::AlreadyStarted`] unless the daemon is `Idle`.
    /// - [`RuntimeError::AlreadyActive`] if another live daemon holds the tag.
    /// - [`RuntimeError::RegistryGone`] if the registry was dropped.
    pub fn start_with(&self, timeout: Duration, delay: Duration) -> Result<(), RuntimeError> {
        let shared = &self.shared;
        let slot = lock(&shared.slot);
        if *shared.state.borrow() != DaemonState::Idle {
            return Err(RuntimeError::AlreadyStarted {
                tag: shared.tag.to_string(),
            });
        }
        let Some(registry) = slot.registry.upgrade() else {
            return Err(RuntimeError::RegistryGone {
                tag: shared.tag.to_string(),
            });
        };

        registry.register_daemon(&shared.tag, Arc::clone(shared) as Arc<dyn DaemonEntry>)?;
        shared.state.send_replace(DaemonState::Running);
        slot.bus.publish(
            Event::new(EventKind::DaemonStarted).with_tag(Arc::clone(&shared.tag)),
        );
        drop(slot);

        let shared = Arc::clone(shared);
        let worker = Arc::clone(&self.worker);
        let params = Arc::clone(&self.params);
        registry.spawn(run_loop(shared, worker, params, timeout, delay));
        Ok(())
    }

    /// `Running → Paused`; no-op in any other state.
    pub fn pause(&self) {
        self.shared.pause();
    }

    /// `Paused → Running`; no-op in any other state.
    pub fn resume(&self) {
        self.shared.resume();
    }

    /// Requests the loop to exit at the next iteration boundary.
    ///
    /// A paused daemon is resumed first. No-op on `Idle` and after stop.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Current state.
    pub fn state(&self) -> DaemonState {
        *self.shared.state.borrow()
    }

    /// Returns `true` once the loop has exited.
    pub fn is_stopped(&self) -> bool {
        self.state() == DaemonState::Stopped
    }

    /// Number of completed ticks.
    pub fn iterations(&self) -> u64 {
        self.shared.iterations.load(Ordering::Acquire)
    }

    /// Waits until the loop has exited. Never resolves for a daemon that is never started.
    pub async fn stopped(&self) {
        let mut rx = self.shared.state.subscribe();
        let _ = rx.wait_for(|s| *s == DaemonState::Stopped).await;
    }

    /// Names of surface callbacks waiting for the next attach, in replay order.
    pub fn pending_names(&self) -> Vec<String> {
        lock(&self.shared.slot).pending.names()
    }
}

async fn run_loop<W: Worker>(
    shared: Arc<DaemonShared>,
    worker: Arc<W>,
    params: Arc<W::Params>,
    timeout: Duration,
    delay: Duration,
) {
    let mut state = shared.state.subscribe();

    if !delay.is_zero() {
        sleep_unless_stopping(&mut state, delay).await;
    }
    loop {
        if wait_unpaused(&mut state).await != DaemonState::Running {
            break;
        }

        let iteration = shared.iterations.load(Ordering::Acquire) + 1;
        let ctx = DaemonContext {
            shared: Arc::clone(&shared),
            iteration,
        };
        let tick = worker.tick(Arc::clone(&params), ctx);
        if let Err(panic_err) = AssertUnwindSafe(tick).catch_unwind().await {
            shared.publish(
                Event::new(EventKind::WorkerPanicked)
                    .with_iteration(iteration)
                    .with_reason(panic_message(&*panic_err)),
            );
        }
        shared.iterations.store(iteration, Ordering::Release);

        if timeout.is_zero() {
            tokio::task::yield_now().await;
        } else if sleep_unless_stopping(&mut state, timeout).await {
            break;
        }
    }

    let on_stopped = Box::new(move || worker.on_stopped());
    shared.finish(on_stopped);
}

/// Waits until the state is not `Paused` and returns it.
async fn wait_unpaused(rx: &mut watch::Receiver<DaemonState>) -> DaemonState {
    rx.wait_for(|s| *s != DaemonState::Paused)
        .await
        .map(|s| *s)
        .unwrap_or(DaemonState::Stopping)
}

/// Sleeps for `d`; returns `true` early if stop was requested.
async fn sleep_unless_stopping(rx: &mut watch::Receiver<DaemonState>, d: Duration) -> bool {
    tokio::select! {
        _ = time::sleep(d) => false,
        stopping = async { rx.wait_for(|s| *s == DaemonState::Stopping).await.is_ok() } => stopping,
    }
}

impl DaemonShared {
    fn publish(&self, ev: Event) {
        lock(&self.slot)
            .bus
            .publish(ev.with_tag(Arc::clone(&self.tag)));
    }

    /// Applies `from → to` under the slot lock; returns `true` if the state changed.
    fn transition(&self, slot: &DaemonSlot, from: &[DaemonState], to: DaemonState, kind: EventKind) -> bool {
        let changed = self.state.send_if_modified(|s| {
            if from.contains(s) {
                *s = to;
                true
            } else {
                false
            }
        });
        if changed {
            slot.bus
                .publish(Event::new(kind).with_tag(Arc::clone(&self.tag)));
        }
        changed
    }

    fn pause(&self) {
        let slot = lock(&self.slot);
        self.transition(&slot, &[DaemonState::Running], DaemonState::Paused, EventKind::DaemonPaused);
    }

    fn resume(&self) {
        let slot = lock(&self.slot);
        self.transition(&slot, &[DaemonState::Paused], DaemonState::Running, EventKind::DaemonResumed);
    }

    fn stop(&self) {
        let slot = lock(&self.slot);
        self.transition(&slot, &[DaemonState::Paused], DaemonState::Running, EventKind::DaemonResumed);
        self.transition(&slot, &[DaemonState::Running], DaemonState::Stopping, EventKind::DaemonStopping);
    }

    /// Marks the loop as exited and delivers the completion callback.
    fn finish(&self, on_stopped: SurfaceJob) {
        let mut slot = lock(&self.slot);
        self.state.send_replace(DaemonState::Stopped);
        slot.bus.publish(
            Event::new(EventKind::DaemonStopped)
                .with_tag(Arc::clone(&self.tag))
                .with_iteration(self.iterations.load(Ordering::Acquire)),
        );
        self.deliver_locked(&mut slot, Arc::from(ON_STOPPED), on_stopped);
        self.release_if_done(&slot);
    }

    fn deliver(&self, name: &str, job: SurfaceJob) -> Delivery {
        let mut slot = lock(&self.slot);
        let delivery = self.deliver_locked(&mut slot, Arc::from(name), job);
        self.release_if_done(&slot);
        delivery
    }

    fn deliver_locked(&self, slot: &mut DaemonSlot, name: Arc<str>, job: SurfaceJob) -> Delivery {
        let reason = match slot.registry.upgrade() {
            None => "registry_gone",
            Some(registry) if !registry.is_attached() => "detached",
            Some(_) if !slot.pending.is_empty() => "queue_busy",
            Some(registry) => {
                registry.surface().run_on_surface_thread(job);
                slot.bus.publish(
                    Event::new(EventKind::CallbackRan)
                        .with_tag(Arc::clone(&self.tag))
                        .with_callback(name),
                );
                return Delivery::Ran;
            }
        };

        match slot.pending.push(Arc::clone(&name), DeliveryMode::SkipOnce, job) {
            Push::Inserted | Push::Replaced => {
                slot.bus.publish(
                    Event::new(EventKind::CallbackDeferred)
                        .with_tag(Arc::clone(&self.tag))
                        .with_callback(name)
                        .with_reason(reason),
                );
                Delivery::Deferred
            }
            Push::Full(_) => {
                slot.bus.publish(
                    Event::new(EventKind::CallbackDropped)
                        .with_tag(Arc::clone(&self.tag))
                        .with_callback(name)
                        .with_reason("queue_full"),
                );
                Delivery::Dropped
            }
        }
    }

    /// Releases the tag once the loop exited and nothing waits for the surface.
    fn release_if_done(&self, slot: &DaemonSlot) {
        if *self.state.borrow() != DaemonState::Stopped || !slot.pending.is_empty() {
            return;
        }
        if let Some(registry) = slot.registry.upgrade() {
            registry.release_daemon(&self.tag, self as *const Self as *const ());
        }
    }
}

impl DaemonEntry for DaemonShared {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn is_stopped(&self) -> bool {
        *self.state.borrow() == DaemonState::Stopped
    }

    fn on_pause(&self) {
        self.pause();
    }

    fn on_resume(&self) {
        self.resume();

        let mut slot = lock(&self.slot);
        for Pending { name, job, .. } in slot.pending.take() {
            self.deliver_locked(&mut slot, name, job);
        }
        self.release_if_done(&slot);
    }

    fn stop(&self) {
        DaemonShared::stop(self);
    }

    fn has_pending(&self) -> bool {
        !lock(&self.slot).pending.is_empty()
    }

    fn rebind(&self, registry: Weak<Registry>) {
        let mut slot = lock(&self.slot);
        if let Some(reg) = registry.upgrade() {
            slot.bus = reg.bus().clone();
            slot.pending.set_limit(reg.config().pending_limit());
        }
        slot.registry = registry;
    }
}

/// Handle given to every [`Worker::tick`].
#[derive(Clone)]
pub struct DaemonContext {
    shared: Arc<DaemonShared>,
    iteration: u64,
}

impl DaemonContext {
    /// Tag of the daemon.
    pub fn tag(&self) -> &str {
        &self.shared.tag
    }

    /// 1-based number of the current tick.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Returns `true` once stop was requested.
    pub fn is_stopping(&self) -> bool {
        matches!(
            *self.shared.state.borrow(),
            DaemonState::Stopping | DaemonState::Stopped
        )
    }

    /// Runs `f` on the surface thread, or keeps it until the next attach.
    ///
    /// While detached only the latest closure per `name` is kept.
    pub fn run_on_surface<F>(&self, name: &str, f: F) -> Delivery
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.deliver(name, Box::new(f))
    }
}
