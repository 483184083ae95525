// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fan-out output ports.
//!
//! An [`Outlet`] is one outbound port of the correlator: a broadcast
//! point with zero or more subscribers, each owning a dedicated bounded
//! channel. Emission is non-blocking; a subscriber whose buffer is full
//! misses that message (lossy per-subscriber), and subscribers whose
//! receiver has been dropped are pruned on the next emission.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Fan-out output port.
///
/// Cloning an `Outlet` yields another handle to the same subscriber set.
///
/// # Delivery semantics
///
/// `emit` broadcasts to every subscriber with a non-blocking send. If a
/// subscriber's channel is full, the message is dropped **for that
/// subscriber only** and a debug line is logged. Subscribers that want
/// no drops should choose a capacity matching their consumption rate.
pub struct Outlet<T> {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<T>>>>,
}

impl<T> Clone for Outlet<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<T> Default for Outlet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Outlet<T> {
    /// Create an outlet with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribe to this outlet.
    ///
    /// Returns a dedicated receiver with buffer capacity `cap`
    /// (minimum 1). Dropping the receiver unsubscribes lazily: the
    /// dead sender is pruned on a later emission.
    pub fn subscribe(&self, cap: usize) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel(cap.max(1));
        self.subscribers.lock().push(tx);
        rx
    }

    /// Number of live subscribers (including ones not yet pruned).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<T: Clone> Outlet<T> {
    /// Broadcast `message` to all subscribers.
    ///
    /// Non-blocking. Returns the number of subscribers that received
    /// the message.
    pub fn emit(&self, message: T) -> usize {
        let mut subs = self.subscribers.lock();
        let mut delivered = 0usize;

        subs.retain(|tx| match tx.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::debug!("outlet: subscriber buffer full, message dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let outlet = Outlet::new();
        let mut a = outlet.subscribe(4);
        let mut b = outlet.subscribe(4);

        assert_eq!(outlet.emit(7u32), 2);

        assert_eq!(a.recv().await, Some(7));
        assert_eq!(b.recv().await, Some(7));
    }

    #[tokio::test]
    async fn full_subscriber_is_lossy_not_blocking() {
        let outlet = Outlet::new();
        let mut rx = outlet.subscribe(1);

        assert_eq!(outlet.emit(1u32), 1);
        // Buffer full: the second emission is dropped for this subscriber.
        assert_eq!(outlet.emit(2u32), 0);

        assert_eq!(rx.recv().await, Some(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_subscriber_is_pruned() {
        let outlet = Outlet::new();
        let rx = outlet.subscribe(4);
        assert_eq!(outlet.subscriber_count(), 1);

        drop(rx);
        assert_eq!(outlet.emit(1u32), 0);
        assert_eq!(outlet.subscriber_count(), 0);
    }

    #[test]
    fn zero_subscribers_is_fine() {
        let outlet: Outlet<u32> = Outlet::new();
        assert_eq!(outlet.emit(1), 0);
    }
}
