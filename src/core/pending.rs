//! # Pending callback queue.
//!
//! Ordered collection of named surface jobs deferred while the surface was
//! detached (or while an earlier deferral was still waiting).
//!
//! ## Rules
//! - Replay order is first-insertion order.
//! - Last write wins per name: re-queuing a name replaces its job **in place**,
//!   so the name keeps its original position.
//! - Capacity counts distinct names; `None` = unbounded. A new name arriving
//!   at a full queue is rejected and handed back to the caller.

use std::sync::Arc;

use crate::surface::SurfaceJob;
use crate::tasks::DeliveryMode;

/// One deferred callback.
pub(crate) struct Pending {
    pub name: Arc<str>,
    pub mode: DeliveryMode,
    pub job: SurfaceJob,
}

/// Result of [`PendingQueue::push`].
pub(crate) enum Push {
    /// The name was not queued before.
    Inserted,
    /// The name was queued; its job (and mode) were replaced.
    Replaced,
    /// The queue is full; the job is handed back.
    Full(SurfaceJob),
}

pub(crate) struct PendingQueue {
    entries: Vec<Pending>,
    limit: Option<usize>,
}

impl PendingQueue {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            entries: Vec::new(),
            limit,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|p| &*p.name == name)
    }

    pub fn push(&mut self, name: Arc<str>, mode: DeliveryMode, job: SurfaceJob) -> Push {
        if let Some(slot) = self.entries.iter_mut().find(|p| p.name == name) {
            slot.mode = mode;
            slot.job = job;
            return Push::Replaced;
        }
        if self.limit.is_some_and(|limit| self.entries.len() >= limit) {
            return Push::Full(job);
        }
        self.entries.push(Pending { name, mode, job });
        Push::Inserted
    }

    /// Takes every queued entry in replay order, leaving the queue empty.
    pub fn take(&mut self) -> Vec<Pending> {
        std::mem::take(&mut self.entries)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|p| p.name.to_string()).collect()
    }
}
