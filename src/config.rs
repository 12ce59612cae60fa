//! # Registry-wide configuration.
//!
//! Provides [`Config`] centralized settings shared by a [`Registry`](crate::Registry)
//! and every task and daemon bound to it.
//!
//! ## Sentinel values
//! - `pending_capacity = 0` → unbounded pending queues
//! - `bus_capacity` is clamped to a minimum of 1

use std::time::Duration;

/// Configuration for a registry and the entries bound to it.
///
/// ## Field semantics
/// - `pending_capacity`: Max distinct callback names deferred per entry (`0` = unbounded)
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `daemon_timeout`: Default sleep between two daemon iterations
/// - `daemon_delay`: Default one-time sleep before a daemon's first iteration
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of each pending callback queue.
    ///
    /// Replacing an already queued name always succeeds (last write wins).
    /// A new name arriving at a full queue is dropped and reported as
    /// `CallbackDropped` with reason `queue_full`.
    pub pending_capacity: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Default inter-iteration sleep used by [`Daemon::start`](crate::Daemon::start).
    pub daemon_timeout: Duration,

    /// Default start delay used by [`Daemon::start`](crate::Daemon::start).
    pub daemon_delay: Duration,
}

impl Config {
    /// Returns the pending queue limit as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → at most `n` distinct names queued per entry
    #[inline]
    pub fn pending_limit(&self) -> Option<usize> {
        if self.pending_capacity == 0 {
            None
        } else {
            Some(self.pending_capacity)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `pending_capacity = 64`
    /// - `bus_capacity = 1024`
    /// - `daemon_timeout = 1s`
    /// - `daemon_delay = 0s`
    fn default() -> Self {
        Self {
            pending_capacity: 64,
            bus_capacity: 1024,
            daemon_timeout: Duration::from_secs(1),
            daemon_delay: Duration::ZERO,
        }
    }
}
