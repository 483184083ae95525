// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Correlator metrics.
//!
//! Tracks admission, retry, resolution, and drop counts.
//!
//! # Thread Safety
//!
//! All methods use atomic operations (Relaxed ordering) for lock-free
//! updates; counters are incremented from the event loop and read from
//! anywhere.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for one requester instance.
#[derive(Debug, Default)]
pub struct RequesterMetrics {
    /// Requests admitted (a new handler was created).
    admitted: AtomicU64,

    /// Requests suppressed because their key was already in flight.
    duplicates: AtomicU64,

    /// Forwards on the outgoing-request port (first sends + retries).
    forwards: AtomicU64,

    /// Requests resolved by a matching reply.
    resolved: AtomicU64,

    /// Requests dropped after the retry budget was spent.
    exhausted: AtomicU64,

    /// Replies matched to an in-flight handler.
    replies_matched: AtomicU64,

    /// Replies with no in-flight handler (late, unknown, or duplicate).
    replies_orphaned: AtomicU64,

    /// Retry wake-ups that found no live handler to act on.
    stale_wakeups: AtomicU64,
}

impl RequesterMetrics {
    /// Create a zeroed metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn increment_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_duplicates(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_forwards(&self) {
        self.forwards.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_resolved(&self) {
        self.resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_replies_matched(&self) {
        self.replies_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_replies_orphaned(&self) {
        self.replies_orphaned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_stale_wakeups(&self) {
        self.stale_wakeups.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> RequesterStats {
        RequesterStats {
            admitted: self.admitted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            forwards: self.forwards.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            replies_matched: self.replies_matched.load(Ordering::Relaxed),
            replies_orphaned: self.replies_orphaned.load(Ordering::Relaxed),
            stale_wakeups: self.stale_wakeups.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`RequesterMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequesterStats {
    /// Requests admitted (handler created).
    pub admitted: u64,
    /// Requests suppressed as duplicates of an in-flight key.
    pub duplicates: u64,
    /// Outgoing-request emissions, retries included.
    pub forwards: u64,
    /// Requests resolved by a matching reply.
    pub resolved: u64,
    /// Requests dropped after retry exhaustion.
    pub exhausted: u64,
    /// Replies matched to an in-flight handler.
    pub replies_matched: u64,
    /// Replies routed to the dropped-reply port.
    pub replies_orphaned: u64,
    /// Retry wake-ups with no live handler.
    pub stale_wakeups: u64,
}

impl RequesterStats {
    /// Handlers still awaiting a reply at snapshot time.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.admitted.saturating_sub(self.resolved + self.exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = RequesterMetrics::new();
        metrics.increment_admitted();
        metrics.increment_admitted();
        metrics.increment_forwards();
        metrics.increment_resolved();

        let stats = metrics.snapshot();
        assert_eq!(stats.admitted, 2);
        assert_eq!(stats.forwards, 1);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.in_flight(), 1);
    }

    #[test]
    fn in_flight_never_underflows() {
        let stats = RequesterStats {
            admitted: 1,
            resolved: 1,
            exhausted: 1,
            ..Default::default()
        };
        assert_eq!(stats.in_flight(), 0);
    }
}
