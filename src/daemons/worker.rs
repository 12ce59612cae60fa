//! # Worker abstraction and function-backed worker.
//!
//! A [`Worker`] is the unit of work a [`Daemon`](crate::Daemon) repeats.
//! [`WorkerFn`] wraps a closure `F: Fn(Arc<P>, DaemonContext) -> Fut`,
//! producing a fresh future per tick.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use attachvisor::{DaemonContext, WorkerFn};
//!
//! let w = WorkerFn::new(|url: Arc<String>, ctx: DaemonContext| async move {
//!     println!("tick {} polling {url}", ctx.iteration());
//! });
//! # let _ = w;
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::daemons::DaemonContext;

/// # Periodic unit of work.
///
/// `tick` runs on the runtime, one call at a time. A stop request never
/// interrupts a tick; it takes effect once the tick returns.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Parameters shared by every tick.
    type Params: Send + Sync + 'static;

    /// One iteration.
    async fn tick(&self, params: Arc<Self::Params>, ctx: DaemonContext);

    /// Runs on the surface thread once the loop has exited.
    ///
    /// Deferred until the next attach when the surface is detached.
    fn on_stopped(&self) {}
}

/// Function-backed worker.
pub struct WorkerFn<P, F> {
    f: F,
    _params: PhantomData<fn(Arc<P>)>,
}

impl<P, F> WorkerFn<P, F> {
    /// Wraps `f`.
    pub fn new<Fut>(f: F) -> Self
    where
        F: Fn(Arc<P>, DaemonContext) -> Fut,
    {
        Self {
            f,
            _params: PhantomData,
        }
    }
}

#[async_trait]
impl<P, F, Fut> Worker for WorkerFn<P, F>
where
    P: Send + Sync + 'static,
    F: Fn(Arc<P>, DaemonContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    type Params = P;

    async fn tick(&self, params: Arc<P>, ctx: DaemonContext) {
        (self.f)(params, ctx).await
    }
}
