// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The requester: correlation orchestrator.
//!
//! A [`Requester`] turns a fire-and-forget message substrate into a
//! request/reply abstraction: it forwards each admitted request, re-sends
//! it on a timeout until a correlated reply arrives or the retry budget
//! is spent, and reports every outcome as data on a dedicated port.
//!
//! # Ports
//!
//! | Port | Direction | Carries |
//! |------|-----------|---------|
//! | `request_sender` / `submit_request` | in | requests from callers |
//! | `reply_sender` / `submit_reply` | in | replies from responders |
//! | `subscribe_requests` | out | requests to forward to responders |
//! | `subscribe_results` | out | composed (request, reply) results |
//! | `subscribe_dropped_requests` | out | duplicates and exhausted requests |
//! | `subscribe_dropped_replies` | out | replies with no in-flight match |
//!
//! # Processing model
//!
//! All inbound events (requests, replies, retry wake-ups) are drained
//! by a single Tokio task, one at a time. That task owns the
//! correlation table and all handler state, so events for the same key
//! are totally ordered and no locking is needed around the state
//! machine. A reply racing a retry wake-up is settled by whichever
//! reaches the event stream first; the loser finds a finished handler
//! and does nothing.
//!
//! # Example
//!
//! ```rust,no_run
//! use reqrep::Requester;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), reqrep::Error> {
//! let requester = Requester::builder()
//!     .key_of_request(|req: &String| req.clone())
//!     .key_of_reply(|rep: &(String, String)| rep.0.clone())
//!     .compose(|req: String, rep: (String, String)| (req, rep.1))
//!     .timeout(Duration::from_millis(100))
//!     .tries(3)
//!     .build()?;
//!
//! let mut outgoing = requester.subscribe_requests(16);
//! let mut results = requester.subscribe_results(16);
//!
//! requester.submit_request("ping".to_string()).await?;
//! let forwarded = outgoing.recv().await; // deliver to a responder...
//! requester.submit_reply(("ping".to_string(), "pong".to_string())).await?;
//! let result = results.recv().await;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::handler::{Handler, Step};
use crate::metrics::{RequesterMetrics, RequesterStats};
use crate::port::Outlet;
use crate::sched::{DelayedSender, TokioDelayedSender};
use crate::table::CorrelationTable;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Default capacity of the inbound event channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

type KeyFn<T, K> = Box<dyn Fn(&T) -> K + Send>;
type ComposeFn<I, R, O> = Box<dyn Fn(I, R) -> O + Send>;

/// Opaque token carried by a scheduled retry wake-up.
///
/// Identifies the handler the wake-up was armed for: the correlation key
/// plus the handler generation. A wake-up whose generation no longer
/// matches the table entry is stale and has no effect, even if the key
/// has since been reused by a newer request.
#[derive(Debug, Clone)]
pub struct RetryToken<K> {
    key: K,
    generation: u64,
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builder for configuring and starting a [`Requester`].
pub struct RequesterBuilder<I, R, O, K> {
    key_of_request: Option<KeyFn<I, K>>,
    key_of_reply: Option<KeyFn<R, K>>,
    compose: Option<ComposeFn<I, R, O>>,
    timeout: Option<Duration>,
    tries: Option<u32>,
    delayed_sender: Option<Arc<dyn DelayedSender<RetryToken<K>>>>,
    channel_capacity: usize,
}

impl<I, R, O, K> Default for RequesterBuilder<I, R, O, K>
where
    I: Clone + Send + 'static,
    R: Clone + Send + 'static,
    O: Clone + Send + 'static,
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, R, O, K> RequesterBuilder<I, R, O, K>
where
    I: Clone + Send + 'static,
    R: Clone + Send + 'static,
    O: Clone + Send + 'static,
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    /// Create an empty builder. Prefer [`Requester::builder`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            key_of_request: None,
            key_of_reply: None,
            compose: None,
            timeout: None,
            tries: None,
            delayed_sender: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Set the function extracting the correlation key from a request.
    pub fn key_of_request<F>(mut self, f: F) -> Self
    where
        F: Fn(&I) -> K + Send + 'static,
    {
        self.key_of_request = Some(Box::new(f));
        self
    }

    /// Set the function extracting the correlation key from a reply.
    pub fn key_of_reply<F>(mut self, f: F) -> Self
    where
        F: Fn(&R) -> K + Send + 'static,
    {
        self.key_of_reply = Some(Box::new(f));
        self
    }

    /// Set the composer combining a request with its matched reply.
    pub fn compose<F>(mut self, f: F) -> Self
    where
        F: Fn(I, R) -> O + Send + 'static,
    {
        self.compose = Some(Box::new(f));
        self
    }

    /// Set the wait between sends. Must be greater than zero.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the maximum number of forwards per request (the first send
    /// counts as try #1). Must be at least 1.
    pub fn tries(mut self, tries: u32) -> Self {
        self.tries = Some(tries);
        self
    }

    /// Use a custom retry scheduler instead of the process-shared
    /// [`TokioDelayedSender`].
    pub fn delayed_sender(mut self, sender: Arc<dyn DelayedSender<RetryToken<K>>>) -> Self {
        self.delayed_sender = Some(sender);
        self
    }

    /// Set the inbound channel capacity (default
    /// [`DEFAULT_CHANNEL_CAPACITY`], minimum 1).
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Validate the configuration and start the event loop.
    ///
    /// Must be called from within a Tokio runtime: the loop runs as a
    /// spawned task owned by the returned handle.
    pub fn build(self) -> Result<Requester<I, R, O, K>> {
        let key_of_request = self.key_of_request.ok_or(Error::MissingRequestKeyFn)?;
        let key_of_reply = self.key_of_reply.ok_or(Error::MissingReplyKeyFn)?;
        let compose = self.compose.ok_or(Error::MissingComposer)?;
        let timeout = self.timeout.ok_or(Error::ZeroTimeout)?;
        if timeout.is_zero() {
            return Err(Error::ZeroTimeout);
        }
        let tries = self.tries.ok_or(Error::ZeroTries)?;
        if tries == 0 {
            return Err(Error::ZeroTries);
        }
        let sched: Arc<dyn DelayedSender<RetryToken<K>>> = match self.delayed_sender {
            Some(sender) => sender,
            None => TokioDelayedSender::shared(),
        };

        let (request_tx, request_rx) = mpsc::channel(self.channel_capacity);
        let (reply_tx, reply_rx) = mpsc::channel(self.channel_capacity);
        let (retry_tx, retry_rx) = mpsc::channel(self.channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let request_out = Outlet::new();
        let result_out = Outlet::new();
        let dropped_request_out = Outlet::new();
        let dropped_reply_out = Outlet::new();
        let metrics = Arc::new(RequesterMetrics::new());

        let event_loop = EventLoop {
            key_of_request,
            key_of_reply,
            compose,
            timeout,
            tries,
            sched,
            retry_tx,
            table: CorrelationTable::new(),
            next_generation: 0,
            request_out: request_out.clone(),
            result_out: result_out.clone(),
            dropped_request_out: dropped_request_out.clone(),
            dropped_reply_out: dropped_reply_out.clone(),
            metrics: metrics.clone(),
        };
        tokio::spawn(event_loop.run(request_rx, reply_rx, retry_rx, shutdown_rx));

        log::debug!(
            "requester started (timeout={:?}, tries={})",
            timeout,
            tries
        );

        Ok(Requester {
            request_tx,
            reply_tx,
            request_out,
            result_out,
            dropped_request_out,
            dropped_reply_out,
            metrics,
            shutdown_tx,
            _key: PhantomData,
        })
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// Handle to a running correlator.
///
/// The handle is the only owner of the event loop: dropping it (or
/// calling [`shutdown`](Self::shutdown)) stops the loop. In-flight
/// handlers are abandoned on shutdown without terminal emissions; their
/// count is visible in [`stats`](Self::stats) beforehand.
pub struct Requester<I, R, O, K> {
    request_tx: mpsc::Sender<I>,
    reply_tx: mpsc::Sender<R>,
    request_out: Outlet<I>,
    result_out: Outlet<O>,
    dropped_request_out: Outlet<I>,
    dropped_reply_out: Outlet<R>,
    metrics: Arc<RequesterMetrics>,
    shutdown_tx: watch::Sender<bool>,
    /// The key type only appears in the event loop's state.
    _key: PhantomData<fn() -> K>,
}

impl<I, R, O, K> Requester<I, R, O, K>
where
    I: Clone + Send + 'static,
    R: Clone + Send + 'static,
    O: Clone + Send + 'static,
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    /// Create a new requester builder.
    #[must_use]
    pub fn builder() -> RequesterBuilder<I, R, O, K> {
        RequesterBuilder::new()
    }

    /// Submit a request for correlation.
    ///
    /// Waits for inbound channel space; fails only once the requester
    /// has shut down.
    pub async fn submit_request(&self, request: I) -> Result<()> {
        self.request_tx
            .send(request)
            .await
            .map_err(|_| Error::Stopped)
    }

    /// Submit a reply, presumably correlated to an earlier request.
    pub async fn submit_reply(&self, reply: R) -> Result<()> {
        self.reply_tx.send(reply).await.map_err(|_| Error::Stopped)
    }

    /// Cloneable sender for wiring the request-in port to a substrate.
    #[must_use]
    pub fn request_sender(&self) -> mpsc::Sender<I> {
        self.request_tx.clone()
    }

    /// Cloneable sender for wiring the reply-in port to a substrate.
    #[must_use]
    pub fn reply_sender(&self) -> mpsc::Sender<R> {
        self.reply_tx.clone()
    }

    /// Subscribe to outgoing requests (first sends and retries).
    pub fn subscribe_requests(&self, cap: usize) -> mpsc::Receiver<I> {
        self.request_out.subscribe(cap)
    }

    /// Subscribe to composed results.
    pub fn subscribe_results(&self, cap: usize) -> mpsc::Receiver<O> {
        self.result_out.subscribe(cap)
    }

    /// Subscribe to dropped requests (duplicate-suppressed or
    /// retry-exhausted).
    pub fn subscribe_dropped_requests(&self, cap: usize) -> mpsc::Receiver<I> {
        self.dropped_request_out.subscribe(cap)
    }

    /// Subscribe to dropped replies (no in-flight handler matched).
    pub fn subscribe_dropped_replies(&self, cap: usize) -> mpsc::Receiver<R> {
        self.dropped_reply_out.subscribe(cap)
    }

    /// Snapshot of the correlator's counters.
    #[must_use]
    pub fn stats(&self) -> RequesterStats {
        self.metrics.snapshot()
    }

    /// Stop the event loop. Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            log::debug!("requester shutting down");
        }
    }

    /// Whether the requester has not been asked to shut down.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !*self.shutdown_tx.borrow()
    }
}

impl<I, R, O, K> Drop for Requester<I, R, O, K> {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

// ============================================================================
// EVENT LOOP
// ============================================================================

struct EventLoop<I, R, O, K> {
    key_of_request: KeyFn<I, K>,
    key_of_reply: KeyFn<R, K>,
    compose: ComposeFn<I, R, O>,
    timeout: Duration,
    tries: u32,
    sched: Arc<dyn DelayedSender<RetryToken<K>>>,
    retry_tx: mpsc::Sender<RetryToken<K>>,
    table: CorrelationTable<K, I, R>,
    next_generation: u64,
    request_out: Outlet<I>,
    result_out: Outlet<O>,
    dropped_request_out: Outlet<I>,
    dropped_reply_out: Outlet<R>,
    metrics: Arc<RequesterMetrics>,
}

impl<I, R, O, K> EventLoop<I, R, O, K>
where
    I: Clone + Send + 'static,
    R: Clone + Send + 'static,
    O: Clone + Send + 'static,
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    async fn run(
        mut self,
        mut request_rx: mpsc::Receiver<I>,
        mut reply_rx: mpsc::Receiver<R>,
        mut retry_rx: mpsc::Receiver<RetryToken<K>>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                Some(request) = request_rx.recv() => self.on_request(request),
                Some(reply) = reply_rx.recv() => self.on_reply(reply),
                Some(token) = retry_rx.recv() => self.on_wakeup(token),
                else => break,
            }
        }

        if self.table.len() > 0 {
            log::debug!(
                "requester stopped with {} handler(s) in flight",
                self.table.len()
            );
        }
    }

    /// A request arrived on the request-in port.
    fn on_request(&mut self, request: I) {
        let key = (self.key_of_request)(&request);
        self.next_generation += 1;
        let handler = Handler::new(key.clone(), self.next_generation, request);

        match self.table.try_insert(handler) {
            Ok(()) => {
                self.metrics.increment_admitted();
                log::debug!("request admitted: key={:?}", key);
                self.drive(&key);
            }
            Err(duplicate) => {
                // Admission control: the key is already being serviced.
                self.metrics.increment_duplicates();
                log::debug!("request suppressed, key already in flight: {:?}", key);
                let (request, _) = duplicate.into_parts();
                self.dropped_request_out.emit(request);
            }
        }
    }

    /// A reply arrived on the reply-in port.
    fn on_reply(&mut self, reply: R) {
        let key = (self.key_of_reply)(&reply);
        let accepted = match self.table.get_mut(&key) {
            Some(handler) => handler.accept_reply(reply),
            None => Err(reply),
        };
        match accepted {
            Ok(()) => {
                self.metrics.increment_replies_matched();
                self.drive(&key);
            }
            Err(reply) => self.orphan_reply(&key, reply),
        }
    }

    /// A scheduled retry wake-up fired.
    fn on_wakeup(&mut self, token: RetryToken<K>) {
        let RetryToken { key, generation } = token;
        if self.table.get_for_wakeup(&key, generation).is_some() {
            self.drive(&key);
        } else {
            // Firing after resolution is the normal fate of the last
            // scheduled wake-up of every resolved request.
            self.metrics.increment_stale_wakeups();
            log::trace!("stale retry wake-up: key={:?}", key);
        }
    }

    /// Run the handler's decision procedure and perform what it asks.
    fn drive(&mut self, key: &K) {
        let step = match self.table.get_mut(key) {
            Some(handler) => handler.step(self.tries),
            None => return,
        };

        match step {
            Step::Forward(attempt) => {
                let (request, generation) = match self.table.get_mut(key) {
                    Some(handler) => (handler.request().clone(), handler.generation()),
                    None => return,
                };
                self.metrics.increment_forwards();
                if attempt > 1 {
                    log::debug!("retrying key={:?} ({}/{})", key, attempt, self.tries);
                }
                self.request_out.emit(request);
                self.sched.send_after(
                    self.retry_tx.clone(),
                    RetryToken {
                        key: key.clone(),
                        generation,
                    },
                    self.timeout,
                );
            }
            Step::Resolve => {
                if let Some(handler) = self.table.remove(key) {
                    let (request, reply) = handler.into_parts();
                    match reply {
                        Some(reply) => {
                            let result = (self.compose)(request, reply);
                            self.metrics.increment_resolved();
                            log::debug!("resolved key={:?}", key);
                            self.result_out.emit(result);
                        }
                        None => {
                            log::error!("handler for key={:?} resolved without a reply", key)
                        }
                    }
                }
            }
            Step::Exhaust => {
                if let Some(handler) = self.table.remove(key) {
                    let (request, _) = handler.into_parts();
                    self.metrics.increment_exhausted();
                    log::debug!(
                        "retry budget spent after {} tries, dropping key={:?}",
                        self.tries,
                        key
                    );
                    self.dropped_request_out.emit(request);
                }
            }
            Step::Idle => {}
        }
    }

    fn orphan_reply(&mut self, key: &K, reply: R) {
        self.metrics.increment_replies_orphaned();
        log::debug!("orphan reply: key={:?}", key);
        self.dropped_reply_out.emit(reply);
    }
}
