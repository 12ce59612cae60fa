//! # Registry - tag-keyed slots for tasks and daemons.
//!
//! The registry maps a string tag to at most one live task and one live
//! daemon, tracks whether the surface is attached, and broadcasts
//! attach/detach transitions to every registered entry.
//!
//! ## Architecture
//! ```text
//! surface adapter ──► set_attached(bool)
//!                         ├─► flip `attached` (idempotent)
//!                         ├─► snapshot entries (registry lock released)
//!                         ├─► tasks:   on_attach_ui() / on_detach_ui()
//!                         └─► daemons: on_resume()    / on_pause()
//!
//! Task::execute ──► register_task(tag)   Daemon::start ──► register_daemon(tag)
//! terminal callback ──► remove (same instance only)
//! ```
//!
//! ## Rules
//! - A tag held by a live entry cannot be claimed again (`AlreadyActive`);
//!   a finished task or stopped daemon is replaced.
//! - Notifications go out in registration order, tasks first, while the
//!   registry lock is **not** held; each entry takes its own lock.
//! - Attach/detach transitions are serialized: the fan-out of one transition
//!   completes before the next one starts.
//! - The registry lock is always the innermost lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::core::builder::RegistryBuilder;
use crate::core::lock;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::SubscriberSet;
use crate::surface::Surface;

/// A task as seen by the registry.
///
/// Implemented by [`Task`](crate::Task); exposed so that lookups can hand out
/// type-erased handles.
pub trait TaskEntry: Send + Sync + 'static {
    /// Tag the task is keyed by.
    fn tag(&self) -> &str;

    /// `true` once the terminal callback ran.
    ///
    /// Must not take the entry's own lock: the registry calls it while holding its lock.
    fn is_finished(&self) -> bool;

    /// The surface became attached.
    fn on_attach_ui(&self);

    /// The surface became detached.
    fn on_detach_ui(&self);

    /// Requests cooperative cancellation; returns `true` if this call requested it.
    fn cancel(&self) -> bool;

    /// Points the entry at the registry it was moved into.
    fn rebind(&self, registry: Weak<Registry>);
}

/// A daemon as seen by the registry.
///
/// Implemented by [`Daemon`](crate::Daemon).
pub trait DaemonEntry: Send + Sync + 'static {
    /// Tag the daemon is keyed by.
    fn tag(&self) -> &str;

    /// `true` once the loop has exited.
    ///
    /// Must not take the entry's own lock: the registry calls it while holding its lock.
    fn is_stopped(&self) -> bool;

    /// The surface became detached.
    fn on_pause(&self);

    /// The surface became attached.
    fn on_resume(&self);

    /// Requests the loop to stop at the next iteration boundary.
    fn stop(&self);

    /// `true` while surface callbacks wait in the daemon's pending queue.
    ///
    /// May take the entry's own lock; never called under the registry's lock.
    fn has_pending(&self) -> bool {
        false
    }

    /// Points the entry at the registry it was moved into.
    fn rebind(&self, registry: Weak<Registry>);
}

/// Registration-ordered tag slots.
struct Slots<E: ?Sized> {
    entries: Vec<(Arc<str>, Arc<E>)>,
}

impl<E: ?Sized> Slots<E> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn position(&self, tag: &str) -> Option<usize> {
        self.entries.iter().position(|(t, _)| &**t == tag)
    }

    fn get(&self, tag: &str) -> Option<Arc<E>> {
        self.position(tag).map(|i| Arc::clone(&self.entries[i].1))
    }

    /// Claims `tag`, replacing a slot whose holder is no longer live.
    fn claim(
        &mut self,
        tag: Arc<str>,
        entry: Arc<E>,
        is_live: impl Fn(&E) -> bool,
    ) -> Result<(), RuntimeError> {
        if let Some(i) = self.position(&tag) {
            if is_live(&self.entries[i].1) {
                return Err(RuntimeError::AlreadyActive {
                    tag: tag.to_string(),
                });
            }
            self.entries.remove(i);
        }
        self.entries.push((tag, entry));
        Ok(())
    }

    fn remove(&mut self, tag: &str) -> Option<Arc<E>> {
        self.position(tag).map(|i| self.entries.remove(i).1)
    }

    /// Removes `tag` only if it is still held by the entry at `ptr`.
    fn remove_same(&mut self, tag: &str, ptr: *const ()) -> bool {
        match self.position(tag) {
            Some(i) if Arc::as_ptr(&self.entries[i].1) as *const () == ptr => {
                self.entries.remove(i);
                true
            }
            _ => false,
        }
    }

    fn handles(&self) -> Vec<Arc<E>> {
        self.entries.iter().map(|(_, e)| Arc::clone(e)).collect()
    }

    fn tags(&self) -> Vec<String> {
        self.entries.iter().map(|(t, _)| t.to_string()).collect()
    }

    fn drain(&mut self) -> Vec<(Arc<str>, Arc<E>)> {
        std::mem::take(&mut self.entries)
    }
}

struct Slotted {
    tasks: Slots<dyn TaskEntry>,
    daemons: Slots<dyn DaemonEntry>,
}

/// Live entries moved out of a registry by [`Registry::export_all`].
///
/// Carries the entries themselves, not copies: importing the snapshot into
/// another registry moves the running tasks and daemons over.
#[derive(Default)]
pub struct RegistrySnapshot {
    tasks: Vec<(Arc<str>, Arc<dyn TaskEntry>)>,
    daemons: Vec<(Arc<str>, Arc<dyn DaemonEntry>)>,
}

impl RegistrySnapshot {
    /// Total number of entries carried.
    pub fn len(&self) -> usize {
        self.tasks.len() + self.daemons.len()
    }

    /// Returns `true` if the snapshot carries nothing.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.daemons.is_empty()
    }

    /// Tags of the carried tasks, in registration order.
    pub fn task_tags(&self) -> Vec<String> {
        self.tasks.iter().map(|(t, _)| t.to_string()).collect()
    }

    /// Tags of the carried daemons, in registration order.
    pub fn daemon_tags(&self) -> Vec<String> {
        self.daemons.iter().map(|(t, _)| t.to_string()).collect()
    }

    /// Appends `other`; on a tag clash the entry from `other` wins.
    pub fn merge(&mut self, other: RegistrySnapshot) {
        for (tag, entry) in other.tasks {
            self.tasks.retain(|(t, _)| *t != tag);
            self.tasks.push((tag, entry));
        }
        for (tag, entry) in other.daemons {
            self.daemons.retain(|(t, _)| *t != tag);
            self.daemons.push((tag, entry));
        }
    }
}

/// Tag-keyed registry of tasks and daemons bound to one surface instance.
pub struct Registry {
    surface: Arc<dyn Surface>,
    cfg: Config,
    bus: Bus,
    runtime: Handle,
    attached: AtomicBool,
    slots: Mutex<Slotted>,
    transition: Mutex<()>,
    _subs: Option<Arc<SubscriberSet>>,
}

impl Registry {
    /// Returns a builder for a registry driving `surface`.
    pub fn builder(surface: Arc<dyn Surface>) -> RegistryBuilder {
        RegistryBuilder::new(surface)
    }

    /// Creates a registry with default config, no subscribers, on the current runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime (see [`RegistryBuilder::with_runtime`]).
    pub fn new(surface: Arc<dyn Surface>) -> Arc<Self> {
        RegistryBuilder::new(surface).build()
    }

    pub(crate) fn new_internal(
        surface: Arc<dyn Surface>,
        cfg: Config,
        bus: Bus,
        runtime: Handle,
        subs: Option<Arc<SubscriberSet>>,
    ) -> Self {
        Self {
            surface,
            cfg,
            bus,
            runtime,
            attached: AtomicBool::new(false),
            slots: Mutex::new(Slotted {
                tasks: Slots::new(),
                daemons: Slots::new(),
            }),
            transition: Mutex::new(()),
            _subs: subs,
        }
    }

    /// Current surface attachment state.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Configuration shared by every entry of this registry.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The surface jobs are posted to.
    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }

    /// Creates a receiver observing every subsequent event of this registry.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn spawn<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(fut)
    }

    /// Transitions the attachment state and informs every entry before returning.
    ///
    /// Setting the current value again is a no-op.
    pub fn set_attached(&self, attached: bool) {
        let _transition = lock(&self.transition);
        if self.attached.swap(attached, Ordering::AcqRel) == attached {
            return;
        }

        let (tasks, daemons) = {
            let slots = lock(&self.slots);
            (slots.tasks.handles(), slots.daemons.handles())
        };

        let kind = if attached {
            EventKind::SurfaceAttached
        } else {
            EventKind::SurfaceDetached
        };
        self.bus
            .publish(Event::new(kind).with_count(tasks.len() + daemons.len()));

        for task in &tasks {
            if attached {
                task.on_attach_ui();
            } else {
                task.on_detach_ui();
            }
        }
        for daemon in &daemons {
            if attached {
                daemon.on_resume();
            } else {
                daemon.on_pause();
            }
        }
    }

    /// Claims `tag` for a task.
    ///
    /// Fails with [`RuntimeError::AlreadyActive`] if a task that has not finished holds it.
    pub fn register_task(&self, tag: &str, task: Arc<dyn TaskEntry>) -> Result<(), RuntimeError> {
        lock(&self.slots)
            .tasks
            .claim(Arc::from(tag), task, |t| !t.is_finished())?;
        self.bus
            .publish(Event::new(EventKind::TaskRegistered).with_tag(tag));
        Ok(())
    }

    /// Releases `tag`; idempotent.
    pub fn unregister_task(&self, tag: &str) {
        if lock(&self.slots).tasks.remove(tag).is_some() {
            self.bus
                .publish(Event::new(EventKind::TaskRemoved).with_tag(tag));
        }
    }

    /// Looks up the task holding `tag`.
    pub fn task(&self, tag: &str) -> Option<Arc<dyn TaskEntry>> {
        lock(&self.slots).tasks.get(tag)
    }

    /// Tags of the registered tasks, in registration order.
    pub fn task_tags(&self) -> Vec<String> {
        lock(&self.slots).tasks.tags()
    }

    /// Claims `tag` for a daemon.
    ///
    /// Fails with [`RuntimeError::AlreadyActive`] if a daemon that has not stopped holds it.
    pub fn register_daemon(
        &self,
        tag: &str,
        daemon: Arc<dyn DaemonEntry>,
    ) -> Result<(), RuntimeError> {
        lock(&self.slots)
            .daemons
            .claim(Arc::from(tag), daemon, |d| !d.is_stopped())?;
        self.bus
            .publish(Event::new(EventKind::DaemonRegistered).with_tag(tag));
        Ok(())
    }

    /// Releases `tag`; idempotent.
    pub fn unregister_daemon(&self, tag: &str) {
        if lock(&self.slots).daemons.remove(tag).is_some() {
            self.bus
                .publish(Event::new(EventKind::DaemonRemoved).with_tag(tag));
        }
    }

    /// Looks up the daemon holding `tag`.
    pub fn daemon(&self, tag: &str) -> Option<Arc<dyn DaemonEntry>> {
        lock(&self.slots).daemons.get(tag)
    }

    /// Tags of the registered daemons, in registration order.
    pub fn daemon_tags(&self) -> Vec<String> {
        lock(&self.slots).daemons.tags()
    }

    /// Releases `tag` only if the task at `ptr` still holds it.
    pub(crate) fn release_task(&self, tag: &str, ptr: *const ()) {
        if lock(&self.slots).tasks.remove_same(tag, ptr) {
            self.bus
                .publish(Event::new(EventKind::TaskRemoved).with_tag(tag));
        }
    }

    /// Releases `tag` only if the daemon at `ptr` still holds it.
    pub(crate) fn release_daemon(&self, tag: &str, ptr: *const ()) {
        if lock(&self.slots).daemons.remove_same(tag, ptr) {
            self.bus
                .publish(Event::new(EventKind::DaemonRemoved).with_tag(tag));
        }
    }

    /// Moves every live entry out of this registry.
    ///
    /// Finished tasks are dropped. Stopped daemons are dropped unless their
    /// completion callback still waits for the surface. No entry is notified.
    pub fn export_all(&self) -> RegistrySnapshot {
        let (tasks, daemons) = {
            let mut slots = lock(&self.slots);
            (slots.tasks.drain(), slots.daemons.drain())
        };
        let snapshot = RegistrySnapshot {
            tasks: tasks.into_iter().filter(|(_, t)| !t.is_finished()).collect(),
            daemons: daemons.into_iter().filter(|(_, d)| carries(&**d)).collect(),
        };
        self.bus
            .publish(Event::new(EventKind::EntriesExported).with_count(snapshot.len()));
        snapshot
    }

    /// Moves `snapshot` into this registry and rebinds every entry to it.
    ///
    /// All-or-nothing: if any carried tag is held by a live entry here,
    /// nothing is imported and the snapshot is handed back inside the error
    /// tuple. Entries are **not** notified of attach/detach because of the move.
    pub fn import_all(
        self: &Arc<Self>,
        snapshot: RegistrySnapshot,
    ) -> Result<usize, (RuntimeError, RegistrySnapshot)> {
        let RegistrySnapshot { tasks, daemons } = snapshot;
        let tasks: Vec<_> = tasks.into_iter().filter(|(_, t)| !t.is_finished()).collect();
        let daemons: Vec<_> = daemons.into_iter().filter(|(_, d)| carries(&**d)).collect();

        {
            let mut slots = lock(&self.slots);
            let clash = tasks
                .iter()
                .map(|(tag, _)| tag)
                .find(|tag| slots.tasks.get(tag).is_some_and(|held| !held.is_finished()))
                .or_else(|| {
                    daemons
                        .iter()
                        .map(|(tag, _)| tag)
                        .find(|tag| slots.daemons.get(tag).is_some_and(|held| !held.is_stopped()))
                })
                .map(|tag| tag.to_string());
            if let Some(tag) = clash {
                drop(slots);
                return Err((
                    RuntimeError::AlreadyActive { tag },
                    RegistrySnapshot { tasks, daemons },
                ));
            }
            for (tag, task) in &tasks {
                let _ = slots
                    .tasks
                    .claim(Arc::clone(tag), Arc::clone(task), |t| !t.is_finished());
            }
            for (tag, daemon) in &daemons {
                let _ = slots
                    .daemons
                    .claim(Arc::clone(tag), Arc::clone(daemon), |d| !d.is_stopped());
            }
        }

        let me = Arc::downgrade(self);
        for (_, task) in &tasks {
            task.rebind(me.clone());
        }
        for (_, daemon) in &daemons {
            daemon.rebind(me.clone());
        }

        let count = tasks.len() + daemons.len();
        self.bus
            .publish(Event::new(EventKind::EntriesImported).with_count(count));
        Ok(count)
    }
}

/// Whether a hand-off must move `daemon` along.
fn carries(daemon: &dyn DaemonEntry) -> bool {
    !daemon.is_stopped() || daemon.has_pending()
}
