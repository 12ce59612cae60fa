//! # Task coordinator.
//!
//! A [`Task`] drives one [`Job`] through its lifecycle and decides, for every
//! callback, whether it runs on the surface thread now, waits in the pending
//! queue for the next attach, or is dropped.
//!
//! ## Lifecycle
//! ```text
//! execute(params)
//!   ├─► register tag (AlreadyRunning if held)
//!   ├─► pre_execute  ──(detached)──► pending queue
//!   │        └─ when posted: ui_ready (if attached), then release gate
//!   └─► spawn background:
//!          wait release gate (or cancel)
//!          in_background(params, ctx)      ctx.publish_progress ─► progress_update*
//!          ├─ completed ─► post_execute
//!          └─ cancelled / panicked ─► cancelled
//!                  └─ terminal posted: closed, tag released
//!
//! attach ─► ui_ready (if pre_execute ran), then drain pending in insertion order
//! detach ─► ui_pause (if ui_ready ran)
//! ```
//!
//! ## Rules
//! - Every surface job is posted while the task lock is held, so the surface
//!   thread sees one total order per task.
//! - The background computation starts only after `pre_execute` (and
//!   `ui_ready`, when attached) have run on the surface thread.
//! - Once a terminal callback is posted, every later callback is dropped.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::pending::{Pending, PendingQueue, Push};
use crate::core::{Registry, TaskEntry, lock};
use crate::error::{RuntimeError, TaskError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::surface::SurfaceJob;
use crate::tasks::Job;
use crate::tasks::callback::{
    CANCELLED, Delivery, DeliveryMode, POST_EXECUTE, PRE_EXECUTE, PROGRESS_UPDATE, TaskStatus,
    UI_PAUSE, UI_READY, is_terminal,
};

type Outcome<T> = Option<Result<T, TaskError>>;

struct TaskState {
    registry: Weak<Registry>,
    bus: Bus,
    status: TaskStatus,
    executed: HashSet<Arc<str>>,
    /// `ui_ready` ran and no `ui_pause` followed.
    visible: bool,
    pending: PendingQueue,
}

pub(crate) struct TaskInner<J: Job> {
    tag: Arc<str>,
    job: Arc<J>,
    state: Mutex<TaskState>,
    closed: watch::Sender<bool>,
    released: Arc<watch::Sender<bool>>,
    outcome: watch::Sender<Outcome<J::Output>>,
    token: CancellationToken,
    cancel_requested: AtomicBool,
}

/// Handle to a surface-aware background task.
///
/// Cloning yields another handle to the same task.
pub struct Task<J: Job> {
    inner: Arc<TaskInner<J>>,
}

impl<J: Job> Clone for Task<J> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<J: Job> Task<J> {
    /// Creates a task bound to `registry` under `tag`.
    ///
    /// The registry is held weakly; nothing is registered until [`execute`](Self::execute).
    pub fn new(registry: &Arc<Registry>, tag: impl Into<String>, job: J) -> Self {
        let state = TaskState {
            registry: Arc::downgrade(registry),
            bus: registry.bus().clone(),
            status: TaskStatus::Pending,
            executed: HashSet::new(),
            visible: false,
            pending: PendingQueue::new(registry.config().pending_limit()),
        };
        Self {
            inner: Arc::new(TaskInner {
                tag: Arc::from(tag.into()),
                job: Arc::new(job),
                state: Mutex::new(state),
                closed: watch::channel(false).0,
                released: Arc::new(watch::channel(false).0),
                outcome: watch::channel(None).0,
                token: CancellationToken::new(),
                cancel_requested: AtomicBool::new(false),
            }),
        }
    }

    /// Tag the task is keyed by.
    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    /// The job driven by this task.
    pub fn job(&self) -> &Arc<J> {
        &self.inner.job
    }

    /// Registers the task and starts the background computation.
    ///
    /// Usable from any thread, including the surface thread: the computation
    /// is spawned on the registry's runtime.
    ///
    /// # Errors
    /// - [`RuntimeError::AlreadyRunning`] if this task was executed before, or
    ///   another live task holds the tag.
    /// - [`RuntimeError::RegistryGone`] if the registry was dropped.
    pub fn execute(&self, params: J::Params) -> Result<(), RuntimeError> {
        let inner = &self.inner;
        let mut st = lock(&inner.state);
        if st.status != TaskStatus::Pending {
            return Err(RuntimeError::AlreadyRunning {
                tag: inner.tag.to_string(),
            });
        }
        let Some(registry) = st.registry.upgrade() else {
            return Err(RuntimeError::RegistryGone {
                tag: inner.tag.to_string(),
            });
        };

        let entry: Arc<dyn TaskEntry> = Arc::clone(inner) as Arc<dyn TaskEntry>;
        registry
            .register_task(&inner.tag, entry)
            .map_err(|err| match err {
                RuntimeError::AlreadyActive { tag } => RuntimeError::AlreadyRunning { tag },
                other => other,
            })?;
        st.status = TaskStatus::Running;

        let job = inner.callback(|job| job.on_pre_execute());
        inner.deliver_locked(&mut st, Arc::from(PRE_EXECUTE), DeliveryMode::Normal, job);
        drop(st);

        let background = Arc::clone(inner);
        registry.spawn(async move { background.run(params).await });
        Ok(())
    }

    /// Routes a surface-thread callback through the task's delivery rules.
    ///
    /// `post_execute` and `cancelled` close the task when they run, whoever
    /// delivers them.
    pub fn deliver_callback<F>(&self, name: &str, mode: DeliveryMode, f: F) -> Delivery
    where
        F: FnOnce(&J) + Send + 'static,
    {
        self.inner.deliver(name, mode, f)
    }

    /// Requests cooperative cancellation.
    ///
    /// Returns `false` if the task already finished or cancellation was requested before.
    pub fn cancel(&self) -> bool {
        self.inner.request_cancel()
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Current coarse status.
    pub fn status(&self) -> TaskStatus {
        lock(&self.inner.state).status
    }

    /// Returns `true` once the terminal callback was posted.
    pub fn is_finished(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Waits until the terminal callback was posted to the surface thread.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Waits for the outcome of the background computation.
    ///
    /// Resolves as soon as the computation returns, before the terminal
    /// callback runs. Never resolves for a task that is never executed.
    ///
    /// # Errors
    /// [`TaskError::Cancelled`] or [`TaskError::Panicked`].
    pub async fn get(&self) -> Result<J::Output, TaskError> {
        let mut rx = self.inner.outcome.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => match &*outcome {
                Some(result) => result.clone(),
                None => Err(TaskError::Cancelled),
            },
            Err(_) => Err(TaskError::Cancelled),
        }
    }

    /// [`get`](Self::get) bounded by `timeout`.
    ///
    /// # Errors
    /// [`TaskError::Timeout`] when `timeout` elapses first.
    pub async fn get_timeout(&self, timeout: Duration) -> Result<J::Output, TaskError> {
        tokio::time::timeout(timeout, self.get())
            .await
            .unwrap_or(Err(TaskError::Timeout { timeout }))
    }

    /// Blocking [`get`](Self::get) for threads outside the runtime.
    ///
    /// Must not be called from the surface thread while the task still needs
    /// it, nor from inside an async context.
    pub fn get_blocking(&self) -> Result<J::Output, TaskError> {
        futures::executor::block_on(self.get())
    }

    /// Returns `true` if a callback named `name` was posted at least once.
    pub fn has_executed(&self, name: &str) -> bool {
        lock(&self.inner.state).executed.contains(name)
    }

    /// Names currently waiting for the next attach, in replay order.
    pub fn pending_names(&self) -> Vec<String> {
        lock(&self.inner.state).pending.names()
    }
}

impl<J: Job> TaskInner<J> {
    fn callback(&self, f: impl FnOnce(&J) + Send + 'static) -> SurfaceJob {
        let job = Arc::clone(&self.job);
        Box::new(move || f(&job))
    }

    fn deliver(&self, name: &str, mode: DeliveryMode, f: impl FnOnce(&J) + Send + 'static) -> Delivery {
        let job = self.callback(f);
        let mut st = lock(&self.state);
        self.deliver_locked(&mut st, Arc::from(name), mode, job)
    }

    fn deliver_locked(
        &self,
        st: &mut TaskState,
        name: Arc<str>,
        mode: DeliveryMode,
        job: SurfaceJob,
    ) -> Delivery {
        if *self.closed.borrow() {
            return self.drop_locked(st, &name, "finished");
        }
        if mode == DeliveryMode::Normal && st.executed.contains(&name) {
            return self.drop_locked(st, &name, "already_executed");
        }
        let Some(registry) = st.registry.upgrade() else {
            return self.defer_locked(st, name, mode, job, "registry_gone");
        };
        if mode != DeliveryMode::Force {
            if !registry.is_attached() {
                return self.defer_locked(st, name, mode, job, "detached");
            }
            if !st.pending.is_empty() {
                return self.defer_locked(st, name, mode, job, "queue_busy");
            }
        }
        self.post_locked(st, &registry, name, job);
        Delivery::Ran
    }

    /// Posts `job` and applies the follow-ups tied to `name`.
    fn post_locked(&self, st: &mut TaskState, registry: &Arc<Registry>, name: Arc<str>, job: SurfaceJob) {
        if is_terminal(&name) && !st.executed.contains(UI_READY) {
            let ready = self.callback(|job| job.on_ui_ready());
            self.post_locked(st, registry, Arc::from(UI_READY), ready);
        }

        registry.surface().run_on_surface_thread(job);
        st.bus.publish(
            Event::new(EventKind::CallbackRan)
                .with_tag(Arc::clone(&self.tag))
                .with_callback(Arc::clone(&name)),
        );
        st.executed.insert(Arc::clone(&name));

        match &*name {
            PRE_EXECUTE => {
                if registry.is_attached() && !st.visible {
                    let ready = self.callback(|job| job.on_ui_ready());
                    self.post_locked(st, registry, Arc::from(UI_READY), ready);
                }
                let released = Arc::clone(&self.released);
                registry.surface().run_on_surface_thread(Box::new(move || {
                    released.send_replace(true);
                }));
            }
            UI_READY => st.visible = true,
            UI_PAUSE => st.visible = false,
            n if is_terminal(n) => self.close_locked(st, registry, &name),
            _ => {}
        }
    }

    fn close_locked(&self, st: &mut TaskState, registry: &Registry, name: &Arc<str>) {
        self.closed.send_replace(true);
        st.status = TaskStatus::Finished;
        st.visible = false;
        st.registry = Weak::new();
        let _ = st.pending.take();

        registry.release_task(&self.tag, self as *const Self as *const ());
        st.bus.publish(
            Event::new(EventKind::TaskFinished)
                .with_tag(Arc::clone(&self.tag))
                .with_callback(Arc::clone(name)),
        );
    }

    fn defer_locked(
        &self,
        st: &mut TaskState,
        name: Arc<str>,
        mode: DeliveryMode,
        job: SurfaceJob,
        reason: &'static str,
    ) -> Delivery {
        match st.pending.push(Arc::clone(&name), mode, job) {
            Push::Inserted | Push::Replaced => {
                st.bus.publish(
                    Event::new(EventKind::CallbackDeferred)
                        .with_tag(Arc::clone(&self.tag))
                        .with_callback(name)
                        .with_reason(reason),
                );
                Delivery::Deferred
            }
            Push::Full(_) => self.drop_locked(st, &name, "queue_full"),
        }
    }

    fn drop_locked(&self, st: &TaskState, name: &Arc<str>, reason: &'static str) -> Delivery {
        st.bus.publish(
            Event::new(EventKind::CallbackDropped)
                .with_tag(Arc::clone(&self.tag))
                .with_callback(Arc::clone(name))
                .with_reason(reason),
        );
        Delivery::Dropped
    }

    fn request_cancel(&self) -> bool {
        if *self.closed.borrow() || self.cancel_requested.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    async fn run(self: Arc<Self>, params: J::Params) {
        let mut released = self.released.subscribe();
        let proceed = tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            ok = async { released.wait_for(|r| *r).await.is_ok() } => ok,
        };

        let outcome = if proceed {
            let ctx = TaskContext {
                task: Arc::clone(&self),
            };
            match AssertUnwindSafe(self.job.in_background(params, ctx))
                .catch_unwind()
                .await
            {
                Ok(output) => Ok(output),
                Err(panic_err) => Err(TaskError::Panicked {
                    reason: panic_message(&*panic_err),
                }),
            }
        } else {
            Err(TaskError::Cancelled)
        };

        match outcome {
            Ok(output) if !self.token.is_cancelled() => {
                self.outcome.send_replace(Some(Ok(output.clone())));
                self.deliver(POST_EXECUTE, DeliveryMode::Normal, move |job| {
                    job.on_post_execute(&output)
                });
            }
            Ok(output) => {
                self.outcome.send_replace(Some(Err(TaskError::Cancelled)));
                self.deliver(CANCELLED, DeliveryMode::Normal, move |job| {
                    job.on_cancelled(Some(&output))
                });
            }
            Err(err) => {
                if let TaskError::Panicked { reason } = &err {
                    lock(&self.state).bus.publish(
                        Event::new(EventKind::TaskPanicked)
                            .with_tag(Arc::clone(&self.tag))
                            .with_reason(reason.as_str()),
                    );
                }
                self.outcome.send_replace(Some(Err(err)));
                self.deliver(CANCELLED, DeliveryMode::Normal, |job| job.on_cancelled(None));
            }
        }
    }
}

impl<J: Job> TaskEntry for TaskInner<J> {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn is_finished(&self) -> bool {
        *self.closed.borrow()
    }

    fn on_attach_ui(&self) {
        let mut st = lock(&self.state);
        if *self.closed.borrow() {
            return;
        }
        let Some(registry) = st.registry.upgrade() else {
            return;
        };

        if st.executed.contains(PRE_EXECUTE) && !st.visible {
            let ready = self.callback(|job| job.on_ui_ready());
            self.post_locked(&mut st, &registry, Arc::from(UI_READY), ready);
        }
        for Pending { name, mode, job } in st.pending.take() {
            self.deliver_locked(&mut st, name, mode, job);
        }
    }

    fn on_detach_ui(&self) {
        let mut st = lock(&self.state);
        if !st.visible || *self.closed.borrow() {
            return;
        }
        let pause = self.callback(|job| job.on_ui_pause());
        self.deliver_locked(&mut st, Arc::from(UI_PAUSE), DeliveryMode::Force, pause);
    }

    fn cancel(&self) -> bool {
        self.request_cancel()
    }

    fn rebind(&self, registry: Weak<Registry>) {
        let mut st = lock(&self.state);
        if let Some(reg) = registry.upgrade() {
            st.bus = reg.bus().clone();
            st.pending.set_limit(reg.config().pending_limit());
        }
        st.registry = registry;
    }
}

/// Handle given to [`Job::in_background`].
pub struct TaskContext<J: Job> {
    task: Arc<TaskInner<J>>,
}

impl<J: Job> Clone for TaskContext<J> {
    fn clone(&self) -> Self {
        Self {
            task: Arc::clone(&self.task),
        }
    }
}

impl<J: Job> TaskContext<J> {
    /// Tag of the running task.
    pub fn tag(&self) -> &str {
        &self.task.tag
    }

    /// Hands `progress` to [`Job::on_progress_update`] on the surface thread.
    ///
    /// While detached only the latest value is kept.
    pub fn publish_progress(&self, progress: J::Progress) -> Delivery {
        self.task
            .deliver(PROGRESS_UPDATE, DeliveryMode::SkipOnce, move |job| {
                job.on_progress_update(progress)
            })
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.task.token.is_cancelled()
    }

    /// Resolves when cancellation is requested.
    pub async fn cancelled(&self) {
        self.task.token.cancelled().await
    }

    /// Child token cancelled together with the task.
    pub fn token(&self) -> CancellationToken {
        self.task.token.child_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::surface::SurfaceThread;
    use async_trait::async_trait;
    use tokio::sync::oneshot;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records every callback; the computation waits for `Params` to fire.
    struct Recorder {
        log: Log,
        steps: u32,
    }

    impl Recorder {
        fn new(steps: u32) -> (Self, Log) {
            let log = Log::default();
            (
                Self {
                    log: Arc::clone(&log),
                    steps,
                },
                log,
            )
        }

        fn push(&self, entry: impl Into<String>) {
            self.log.lock().unwrap().push(entry.into());
        }
    }

    #[async_trait]
    impl Job for Recorder {
        type Params = Option<oneshot::Receiver<()>>;
        type Progress = u32;
        type Output = u32;

        async fn in_background(&self, gate: Self::Params, ctx: TaskContext<Self>) -> u32 {
            self.push("background");
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            for step in 1..=self.steps {
                ctx.publish_progress(step);
            }
            self.steps
        }

        fn on_pre_execute(&self) {
            self.push(PRE_EXECUTE);
        }
        fn on_ui_ready(&self) {
            self.push(UI_READY);
        }
        fn on_ui_pause(&self) {
            self.push(UI_PAUSE);
        }
        fn on_progress_update(&self, step: u32) {
            self.push(format!("progress:{step}"));
        }
        fn on_post_execute(&self, out: &u32) {
            self.push(format!("post_execute:{out}"));
        }
        fn on_cancelled(&self, out: Option<&u32>) {
            self.push(format!("cancelled:{out:?}"));
        }
    }

    struct Explode;

    #[async_trait]
    impl Job for Explode {
        type Params = ();
        type Progress = ();
        type Output = ();

        async fn in_background(&self, _: (), _ctx: TaskContext<Self>) {
            panic!("computation exploded");
        }
    }

    fn setup(name: &str) -> (Arc<SurfaceThread>, Arc<Registry>) {
        let surface = SurfaceThread::spawn(name).unwrap();
        let registry = Registry::new(surface.clone());
        (surface, registry)
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn executed_while_detached_waits_for_attach() {
        let (surface, registry) = setup("task-detached");
        let (job, log) = Recorder::new(0);
        let task = Task::new(&registry, "load", job);

        task.execute(None).unwrap();
        assert_eq!(task.status(), TaskStatus::Running);
        assert_eq!(task.pending_names(), vec![PRE_EXECUTE]);
        assert!(registry.task("load").is_some());

        tokio::time::sleep(Duration::from_millis(20)).await;
        surface.flush().await;
        assert!(entries(&log).is_empty(), "background must wait for pre_execute");

        registry.set_attached(true);
        task.closed().await;
        surface.flush().await;

        assert_eq!(
            entries(&log),
            vec![PRE_EXECUTE, UI_READY, "background", "post_execute:0"]
        );
        assert_eq!(task.get().await, Ok(0));
        assert_eq!(task.status(), TaskStatus::Finished);
        assert!(registry.task("load").is_none());
    }

    #[tokio::test]
    async fn progress_published_while_detached_collapses_to_the_latest() {
        let (surface, registry) = setup("task-progress");
        registry.set_attached(true);
        let (job, log) = Recorder::new(5);
        let task = Task::new(&registry, "sync", job);
        let (go, gate) = oneshot::channel();

        task.execute(Some(gate)).unwrap();
        surface.flush().await;

        registry.set_attached(false);
        go.send(()).unwrap();
        assert_eq!(task.get().await, Ok(5));
        assert_eq!(task.pending_names(), vec![PROGRESS_UPDATE, POST_EXECUTE]);

        registry.set_attached(true);
        task.closed().await;
        surface.flush().await;

        // "background" is pushed from the runtime and may land anywhere before the gate opens.
        let surface_side: Vec<String> = entries(&log)
            .into_iter()
            .filter(|e| e != "background")
            .collect();
        assert_eq!(
            surface_side,
            vec![
                PRE_EXECUTE,
                UI_READY,
                UI_PAUSE,
                UI_READY,
                "progress:5",
                "post_execute:5",
            ]
        );
    }

    #[tokio::test]
    async fn normal_callbacks_run_once_and_skip_once_repeats() {
        let (surface, registry) = setup("task-modes");
        registry.set_attached(true);
        let (job, log) = Recorder::new(0);
        let task = Task::new(&registry, "modes", job);

        let hello = |job: &Recorder| job.push("hello");
        assert_eq!(task.deliver_callback("hello", DeliveryMode::Normal, hello), Delivery::Ran);
        assert_eq!(task.deliver_callback("hello", DeliveryMode::Normal, hello), Delivery::Dropped);
        assert_eq!(task.deliver_callback("hello", DeliveryMode::SkipOnce, hello), Delivery::Ran);
        surface.flush().await;

        assert_eq!(entries(&log), vec!["hello", "hello"]);
        assert!(task.has_executed("hello"));
    }

    #[tokio::test]
    async fn full_pending_queue_drops_new_names() {
        let surface = SurfaceThread::spawn("task-full").unwrap();
        let registry = Registry::builder(surface)
            .with_config(Config {
                pending_capacity: 1,
                ..Config::default()
            })
            .build();
        let (job, _log) = Recorder::new(0);
        let task = Task::new(&registry, "full", job);

        assert_eq!(task.deliver_callback("a", DeliveryMode::Normal, |_| {}), Delivery::Deferred);
        assert_eq!(task.deliver_callback("b", DeliveryMode::Normal, |_| {}), Delivery::Dropped);
        assert_eq!(task.deliver_callback("a", DeliveryMode::Normal, |_| {}), Delivery::Deferred);
        assert_eq!(task.pending_names(), vec!["a"]);
    }

    #[tokio::test]
    async fn cancel_before_release_closes_with_cancelled() {
        let (surface, registry) = setup("task-cancel");
        let (job, log) = Recorder::new(0);
        let task = Task::new(&registry, "cancel", job);

        task.execute(None).unwrap();
        assert!(task.cancel());
        assert!(!task.cancel());
        assert_eq!(task.get().await, Err(TaskError::Cancelled));

        registry.set_attached(true);
        task.closed().await;
        surface.flush().await;

        assert_eq!(entries(&log), vec![PRE_EXECUTE, UI_READY, "cancelled:None"]);
        assert!(!task.cancel());
    }

    #[tokio::test]
    async fn panicking_computation_is_isolated() {
        let (surface, registry) = setup("task-panic");
        registry.set_attached(true);
        let mut rx = registry.subscribe();
        let task = Task::new(&registry, "boom", Explode);

        task.execute(()).unwrap();
        let err = task.get().await.unwrap_err();
        assert_eq!(
            err,
            TaskError::Panicked {
                reason: "computation exploded".into()
            }
        );
        task.closed().await;
        surface.flush().await;
        assert!(task.has_executed(CANCELLED));

        let mut saw_panic = false;
        while let Ok(ev) = rx.try_recv() {
            saw_panic |= ev.kind == EventKind::TaskPanicked;
        }
        assert!(saw_panic);
    }

    #[tokio::test]
    async fn a_tag_runs_one_task_at_a_time() {
        let (surface, registry) = setup("task-tag");
        let (first_job, _) = Recorder::new(0);
        let (second_job, _) = Recorder::new(0);
        let first = Task::new(&registry, "load", first_job);
        let second = Task::new(&registry, "load", second_job);

        first.execute(None).unwrap();
        assert_eq!(
            first.execute(None),
            Err(RuntimeError::AlreadyRunning { tag: "load".into() })
        );
        assert_eq!(
            second.execute(None),
            Err(RuntimeError::AlreadyRunning { tag: "load".into() })
        );
        assert_eq!(second.status(), TaskStatus::Pending);

        registry.set_attached(true);
        first.closed().await;
        surface.flush().await;

        second.execute(None).unwrap();
        second.closed().await;
        assert!(registry.task("load").is_none());
    }

    #[tokio::test]
    async fn execute_without_registry_fails() {
        let (_surface, registry) = setup("task-gone");
        let (job, _) = Recorder::new(0);
        let task = Task::new(&registry, "orphan", job);
        drop(registry);

        assert_eq!(
            task.execute(None),
            Err(RuntimeError::RegistryGone { tag: "orphan".into() })
        );
    }

    #[tokio::test]
    async fn callbacks_keep_queuing_once_the_registry_is_dropped() {
        let (surface, registry) = setup("task-orphaned");
        let mut events = registry.subscribe();
        let (job, log) = Recorder::new(0);
        let task = Task::new(&registry, "load", job);
        task.execute(None).unwrap();
        drop(registry);

        let delivery = task.deliver_callback(PROGRESS_UPDATE, DeliveryMode::SkipOnce, |job| {
            job.on_progress_update(7)
        });
        assert_eq!(delivery, Delivery::Deferred);
        assert_eq!(task.pending_names(), vec![PRE_EXECUTE, PROGRESS_UPDATE]);
        assert_eq!(task.status(), TaskStatus::Running);

        surface.flush().await;
        assert!(entries(&log).is_empty());

        let mut reason = None;
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::CallbackDeferred
                && ev.callback.as_deref() == Some(PROGRESS_UPDATE)
            {
                reason = ev.reason;
            }
        }
        assert_eq!(reason.as_deref(), Some("registry_gone"));
    }

    #[tokio::test]
    async fn forced_callback_skips_detach_and_the_pending_queue() {
        let (surface, registry) = setup("task-force");
        let (job, log) = Recorder::new(0);
        let task = Task::new(&registry, "load", job);
        task.execute(None).unwrap();
        assert_eq!(task.pending_names(), vec![PRE_EXECUTE]);

        let delivery = task.deliver_callback("toast", DeliveryMode::Force, |job| job.push("toast"));
        assert_eq!(delivery, Delivery::Ran);
        surface.flush().await;

        assert_eq!(entries(&log), vec!["toast"]);
        assert_eq!(task.pending_names(), vec![PRE_EXECUTE]);
        assert!(task.has_executed("toast"));
    }

    #[tokio::test]
    async fn get_timeout_reports_the_elapsed_timeout() {
        let (_surface, registry) = setup("task-timeout");
        let (job, _) = Recorder::new(0);
        let task = Task::new(&registry, "slow", job);
        task.execute(None).unwrap();

        let timeout = Duration::from_millis(10);
        assert_eq!(task.get_timeout(timeout).await, Err(TaskError::Timeout { timeout }));
    }
}
