//! End-to-end lifecycle scenarios over the public API, with a real surface thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use attachvisor::{
    Daemon, DaemonContext, DaemonState, Delivery, DeliveryMode, Event, EventKind, HandOff, Job,
    ON_STOPPED, PROGRESS_UPDATE, Registry, RuntimeError, Subscribe, SurfaceThread, Task,
    TaskContext, TaskError, TaskStatus, Worker, WorkerFn,
};
use tokio::sync::{Notify, mpsc};

type Log = Arc<Mutex<Vec<String>>>;

/// Records callbacks; the computation reports `steps` progress values, then
/// waits on `gate` if one is given.
struct Load {
    log: Log,
    steps: u32,
    gate: Option<Arc<Notify>>,
}

impl Load {
    fn push(&self, s: impl Into<String>) {
        self.log.lock().unwrap().push(s.into());
    }
}

#[async_trait]
impl Job for Load {
    type Params = String;
    type Progress = u32;
    type Output = String;

    async fn in_background(&self, url: String, ctx: TaskContext<Self>) -> String {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        for step in 1..=self.steps {
            ctx.publish_progress(step);
        }
        format!("body of {url}")
    }

    fn on_pre_execute(&self) {
        self.push("pre_execute");
    }
    fn on_ui_ready(&self) {
        self.push("ui_ready");
    }
    fn on_ui_pause(&self) {
        self.push("ui_pause");
    }
    fn on_progress_update(&self, step: u32) {
        self.push(format!("progress:{step}"));
    }
    fn on_post_execute(&self, body: &String) {
        self.push(format!("post_execute:{body}"));
    }
}

fn load(log: &Log, steps: u32, gate: Option<Arc<Notify>>) -> Load {
    Load {
        log: Arc::clone(log),
        steps,
        gate,
    }
}

fn snapshot(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn load_executed_while_detached_runs_in_order_after_attach() {
    let surface = SurfaceThread::spawn("it-load").unwrap();
    let registry = Registry::new(surface.clone());
    let log = Log::default();

    let task = Task::new(&registry, "load", load(&log, 0, None));
    task.execute("https://example.org".into()).unwrap();
    surface.flush().await;
    assert!(snapshot(&log).is_empty());

    registry.set_attached(true);
    assert_eq!(task.get().await.unwrap(), "body of https://example.org");
    task.closed().await;
    surface.flush().await;

    assert_eq!(
        snapshot(&log),
        vec![
            "pre_execute",
            "ui_ready",
            "post_execute:body of https://example.org"
        ]
    );
    assert_eq!(task.status(), TaskStatus::Finished);
    assert!(registry.task("load").is_none());
}

#[tokio::test]
async fn attach_detach_churn_keeps_each_main_callback_exactly_once() {
    let surface = SurfaceThread::spawn("it-churn").unwrap();
    let registry = Registry::new(surface.clone());
    let log = Log::default();
    let gate = Arc::new(Notify::new());

    let task = Task::new(&registry, "churn", load(&log, 0, Some(Arc::clone(&gate))));
    registry.set_attached(true);
    registry.set_attached(false);
    task.execute("a".into()).unwrap();
    for _ in 0..3 {
        registry.set_attached(true);
        registry.set_attached(true);
        registry.set_attached(false);
    }
    gate.notify_one();
    registry.set_attached(true);
    task.closed().await;
    surface.flush().await;

    let log = snapshot(&log);
    for name in ["pre_execute", "post_execute:body of a"] {
        assert_eq!(log.iter().filter(|e| *e == name).count(), 1, "{name}");
    }
    let first = |name: &str| log.iter().position(|e| e == name).unwrap();
    assert!(first("pre_execute") < first("ui_ready"));
    assert!(first("ui_ready") < first("post_execute:body of a"));
    assert_eq!(log.last().map(String::as_str), Some("post_execute:body of a"));
}

#[tokio::test]
async fn skip_once_progress_queued_while_detached_replays_once_with_latest_value() {
    let surface = SurfaceThread::spawn("it-progress").unwrap();
    let registry = Registry::new(surface.clone());
    let log = Log::default();
    let task = Task::new(&registry, "progress", load(&log, 0, None));
    task.execute("p".into()).unwrap();

    for step in 1..=5u32 {
        let delivery = task.deliver_callback(PROGRESS_UPDATE, DeliveryMode::SkipOnce, move |job| {
            job.on_progress_update(step)
        });
        assert_eq!(delivery, Delivery::Deferred);
    }
    assert_eq!(task.pending_names(), vec!["pre_execute", PROGRESS_UPDATE]);

    registry.set_attached(true);
    task.closed().await;
    surface.flush().await;
    assert_eq!(
        snapshot(&log),
        vec!["pre_execute", "ui_ready", "progress:5", "post_execute:body of p"]
    );
}

#[tokio::test]
async fn tag_is_reusable_only_after_the_holder_finished() {
    let surface = SurfaceThread::spawn("it-tags").unwrap();
    let registry = Registry::new(surface.clone());
    let log = Log::default();
    let a = Task::new(&registry, "x", load(&log, 0, None));
    let b = Task::new(&registry, "x", load(&log, 0, None));

    a.execute("a".into()).unwrap();
    assert_eq!(
        registry.register_task("x", registry.task("x").unwrap()),
        Err(RuntimeError::AlreadyActive { tag: "x".into() })
    );
    assert_eq!(
        b.execute("b".into()),
        Err(RuntimeError::AlreadyRunning { tag: "x".into() })
    );

    registry.set_attached(true);
    a.closed().await;
    b.execute("b".into()).unwrap();
    assert_eq!(b.get().await.unwrap(), "body of b");
}

#[tokio::test]
async fn daemon_follows_the_surface_and_stops_while_paused() {
    let surface = SurfaceThread::spawn("it-daemon").unwrap();
    let registry = Registry::new(surface.clone());
    registry.set_attached(true);
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let daemon = Daemon::new(
        &registry,
        "poll",
        (),
        WorkerFn::new(move |_: Arc<()>, _ctx: DaemonContext| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }),
    );

    daemon.start_with(Duration::from_millis(5), Duration::ZERO).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    registry.set_attached(false);
    assert_eq!(daemon.state(), DaemonState::Paused);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let frozen = ticks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), frozen);

    daemon.stop();
    tokio::time::timeout(Duration::from_secs(2), daemon.stopped())
        .await
        .unwrap();
    assert!(frozen > 0);
    assert_eq!(
        daemon.start(),
        Err(RuntimeError::AlreadyStarted { tag: "poll".into() })
    );
}

#[tokio::test]
async fn running_task_survives_a_surface_hand_off() {
    let surface = SurfaceThread::spawn("it-handoff").unwrap();
    let old = Registry::new(surface.clone());
    let log = Log::default();
    let gate = Arc::new(Notify::new());

    old.set_attached(true);
    let task = Task::new(&old, "load", load(&log, 0, Some(Arc::clone(&gate))));
    task.execute("moved".into()).unwrap();
    surface.flush().await;

    old.set_attached(false);
    let store = HandOff::new();
    assert_eq!(store.park("main", &old), 1);
    drop(old);

    let new = Registry::new(surface.clone());
    assert_eq!(store.restore("main", &new).unwrap(), 1);
    gate.notify_one();
    assert_eq!(task.get().await.unwrap(), "body of moved");
    assert!(!task.is_finished());

    new.set_attached(true);
    task.closed().await;
    surface.flush().await;

    assert_eq!(
        snapshot(&log),
        vec![
            "pre_execute",
            "ui_ready",
            "ui_pause",
            "ui_ready",
            "post_execute:body of moved"
        ]
    );
    assert!(new.task("load").is_none());
}

/// Counts ticks and completion callbacks.
struct Beacon {
    stopped: Arc<AtomicUsize>,
}

#[async_trait]
impl Worker for Beacon {
    type Params = ();

    async fn tick(&self, _: Arc<()>, _ctx: DaemonContext) {}

    fn on_stopped(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn stopped_daemon_carries_its_completion_callback_across_a_hand_off() {
    let surface = SurfaceThread::spawn("it-handoff-stopped").unwrap();
    let old = Registry::new(surface.clone());
    let stopped = Arc::new(AtomicUsize::new(0));
    let daemon = Daemon::new(
        &old,
        "beacon",
        (),
        Beacon {
            stopped: Arc::clone(&stopped),
        },
    );

    daemon.start_with(Duration::from_millis(5), Duration::ZERO).unwrap();
    daemon.stop();
    daemon.stopped().await;
    assert_eq!(daemon.pending_names(), vec![ON_STOPPED]);

    let store = HandOff::new();
    assert_eq!(store.park("main", &old), 1);
    drop(old);

    let new = Registry::new(surface.clone());
    assert_eq!(store.restore("main", &new).unwrap(), 1);
    assert_eq!(new.daemon_tags(), vec!["beacon"]);
    assert_eq!(stopped.load(Ordering::SeqCst), 0);

    new.set_attached(true);
    surface.flush().await;
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    assert!(daemon.pending_names().is_empty());
    assert!(new.daemon_tags().is_empty());
}

#[tokio::test]
async fn entries_looked_up_by_tag_can_be_cancelled_and_stopped() {
    let surface = SurfaceThread::spawn("it-lookup").unwrap();
    let registry = Registry::new(surface.clone());
    let log = Log::default();
    let task = Task::new(&registry, "load", load(&log, 0, Some(Arc::new(Notify::new()))));
    task.execute("never".into()).unwrap();

    let entry = registry.task("load").unwrap();
    assert!(entry.cancel());
    assert!(!entry.cancel());
    assert!(task.is_cancelled());
    assert_eq!(task.get().await, Err(TaskError::Cancelled));

    registry.set_attached(true);
    task.closed().await;
    assert!(registry.task("load").is_none());

    let daemon = Daemon::new(
        &registry,
        "beacon",
        (),
        Beacon {
            stopped: Arc::new(AtomicUsize::new(0)),
        },
    );
    daemon.start_with(Duration::from_millis(5), Duration::ZERO).unwrap();
    registry.daemon("beacon").unwrap().stop();
    tokio::time::timeout(Duration::from_secs(2), daemon.stopped())
        .await
        .unwrap();
    surface.flush().await;
    assert!(registry.daemon("beacon").is_none());
}

struct Counter {
    kinds: mpsc::UnboundedSender<EventKind>,
}

#[async_trait]
impl Subscribe for Counter {
    async fn on_event(&self, ev: &Event) {
        let _ = self.kinds.send(ev.kind);
    }

    fn name(&self) -> &'static str {
        "counter"
    }
}

#[tokio::test]
async fn subscribers_observe_the_lifecycle() {
    let surface = SurfaceThread::spawn("it-subscribers").unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let registry = Registry::builder(surface.clone())
        .with_subscribers(vec![Arc::new(Counter { kinds: tx }) as Arc<dyn Subscribe>])
        .build();
    let log = Log::default();

    let task = Task::new(&registry, "load", load(&log, 0, None));
    task.execute("seen".into()).unwrap();
    registry.set_attached(true);
    task.closed().await;

    let mut seen = Vec::new();
    while !seen.contains(&EventKind::TaskFinished) {
        seen.push(rx.recv().await.unwrap());
    }
    for kind in [
        EventKind::TaskRegistered,
        EventKind::CallbackDeferred,
        EventKind::SurfaceAttached,
        EventKind::CallbackRan,
        EventKind::TaskRemoved,
    ] {
        assert!(seen.contains(&kind), "{kind:?}");
    }
}
