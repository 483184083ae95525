// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Delayed-callback scheduler collaborator.
//!
//! The correlator never sleeps: every "wait for the retry timeout"
//! becomes a registration with a [`DelayedSender`], which later posts
//! the message back into the requester's own event stream.
//!
//! # Delivery contract
//!
//! `send_after(target, message, delay)` is one-shot and **at least**
//! `delay` late: the message is never delivered early, may be delivered
//! arbitrarily late, and may be dropped entirely (for example when the
//! receiving loop has already shut down). Consumers must treat a missing
//! delivery as a retry that simply never fires, not as an error.

use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc;

/// Scheduler collaborator: deliver `message` to `target` after `delay`.
pub trait DelayedSender<M: Send + 'static>: Send + Sync {
    /// Schedule a one-shot delivery. Must not block the caller.
    fn send_after(&self, target: mpsc::Sender<M>, message: M, delay: Duration);
}

/// Default scheduler backed by the Tokio timer.
///
/// Each `send_after` spawns a detached task that sleeps for `delay` and
/// then sends the message. If the target channel is full the send waits
/// (still never early); if the receiver is gone the delivery is dropped.
///
/// Requires a Tokio runtime context.
#[derive(Debug, Default)]
pub struct TokioDelayedSender;

impl TokioDelayedSender {
    /// Create a new scheduler handle.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Process-shared default instance, built lazily on first use.
    ///
    /// Call sites that do not care about scheduler identity should use
    /// this instead of constructing their own.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<TokioDelayedSender>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(TokioDelayedSender::new())).clone()
    }
}

impl<M: Send + 'static> DelayedSender<M> for TokioDelayedSender {
    fn send_after(&self, target: mpsc::Sender<M>, message: M, delay: Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver may have shut down; dropping the delivery is allowed.
            let _ = target.send(message).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn delivers_no_earlier_than_delay() {
        let (tx, mut rx) = mpsc::channel(1);
        let sched = TokioDelayedSender::new();

        let start = Instant::now();
        sched.send_after(tx, 42u32, Duration::from_millis(20));

        assert_eq!(rx.recv().await, Some(42));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn dropped_receiver_is_tolerated() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let sched = TokioDelayedSender::new();
        sched.send_after(tx, 1u32, Duration::from_millis(1));

        // Nothing to assert beyond "no panic"; give the task a beat to run.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[test]
    fn shared_returns_same_instance() {
        let a = TokioDelayedSender::shared();
        let b = TokioDelayedSender::shared();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
