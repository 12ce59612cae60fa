//! # Example: handoff
//!
//! A download task and a polling daemon outlive the surface that started them.
//!
//! Shows how to:
//! - Drive a [`Registry`] from a surface adapter (`set_attached`).
//! - Run a [`Task`] whose callbacks wait for the surface.
//! - Run a [`Daemon`] that pauses while the surface is gone.
//! - Move both to a recreated surface with [`HandOff`].
//!
//! ## Flow
//! ```text
//! surface #1 attached ──► execute "download", start "clock"
//! surface #1 detached ──► ui_pause, clock paused
//! HandOff::park("main")  ──► registry #1 emptied
//! HandOff::restore("main") ──► registry #2 owns both
//! surface #2 attached ──► ui_ready, progress, post_execute, clock resumed
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=attachvisor=debug cargo run --example handoff --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use attachvisor::{
    Config, Daemon, DaemonContext, HandOff, Job, LogWriter, Registry, Subscribe, SurfaceThread,
    Task, TaskContext, WorkerFn,
};

struct Download;

#[async_trait]
impl Job for Download {
    type Params = Vec<&'static str>;
    type Progress = (usize, usize);
    type Output = usize;

    async fn in_background(&self, files: Self::Params, ctx: TaskContext<Self>) -> usize {
        let total = files.len();
        for (i, file) in files.iter().enumerate() {
            if ctx.is_cancelled() {
                return i;
            }
            tokio::time::sleep(Duration::from_millis(80)).await;
            tracing::debug!(file, "fetched");
            ctx.publish_progress((i + 1, total));
        }
        total
    }

    fn on_pre_execute(&self) {
        println!("[surface] download starting");
    }

    fn on_ui_ready(&self) {
        println!("[surface] download visible");
    }

    fn on_ui_pause(&self) {
        println!("[surface] download hidden");
    }

    fn on_progress_update(&self, (done, total): (usize, usize)) {
        println!("[surface] {done}/{total}");
    }

    fn on_post_execute(&self, fetched: &usize) {
        println!("[surface] downloaded {fetched} files");
    }
}

fn surface_registry(surface: &Arc<SurfaceThread>) -> Arc<Registry> {
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    Registry::builder(surface.clone())
        .with_config(Config {
            daemon_timeout: Duration::from_millis(100),
            ..Config::default()
        })
        .with_subscribers(subs)
        .build()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let surface = SurfaceThread::spawn("surface")?;
    let store = HandOff::new();

    // --- first surface instance ---
    let first = surface_registry(&surface);
    first.set_attached(true);

    let download = Task::new(&first, "download", Download);
    download.execute(vec!["a.txt", "b.txt", "c.txt", "d.txt"])?;

    let clock = Daemon::new(
        &first,
        "clock",
        "tick",
        WorkerFn::new(|label: Arc<&'static str>, ctx: DaemonContext| async move {
            let n = ctx.iteration();
            ctx.run_on_surface("clock", move || println!("[surface] {label} #{n}"));
        }),
    );
    clock.start()?;

    tokio::time::sleep(Duration::from_millis(150)).await;

    // --- teardown: callbacks start queueing, the clock pauses ---
    first.set_attached(false);
    let moved = store.park("main", &first);
    println!("parked {moved} entries");
    drop(first);

    tokio::time::sleep(Duration::from_millis(300)).await;

    // --- recreated surface instance ---
    let second = surface_registry(&surface);
    let restored = store.restore("main", &second)?;
    println!("restored {restored} entries");
    second.set_attached(true);

    let fetched = download.get().await?;
    download.closed().await;
    println!("result: {fetched}");

    tokio::time::sleep(Duration::from_millis(250)).await;
    clock.stop();
    clock.stopped().await;
    surface.flush().await;
    Ok(())
}
