// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # reqrep - Request/Reply correlation for asynchronous message pipelines
//!
//! Turns a fire-and-forget messaging substrate into a reliable
//! request/reply abstraction with automatic retries, timeout-driven
//! give-up, and duplicate suppression. Retries N times, then gives up and
//! reports the failure as data -- it never guarantees a reply arrives.
//!
//! ## Quick Start
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
//! // Wire the ports to your pipeline, then feed it.
//! let mut outgoing = requester.subscribe_requests(16);
//! let mut results = requester.subscribe_results(16);
//! requester.submit_request("ping".to_string()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!  request in --->+-----------------------------------+---> request out
//!                 |             Requester             |      (forwards,
//!                 |                                   |       retries)
//!                 |  correlation table: key -> state  |
//!                 |  machine (sent count, reply slot, |---> result out
//!  reply in ----->|  terminal flag)                   |
//!                 |                                   |---> dropped requests
//!                 |        retry wake-ups             |---> dropped replies
//!                 +-------------^---------------------+
//!                               |
//!                     DelayedSender (timer)
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Requester`] | Handle to a running correlator; owns the event loop |
//! | [`RequesterBuilder`] | Fluent configuration (key functions, composer, timeout, tries) |
//! | [`Outlet`] | Fan-out output port with zero or more subscribers |
//! | [`DelayedSender`] | Scheduler collaborator delivering one-shot delayed messages |
//! | [`RequesterStats`] | Snapshot of admission/retry/resolution counters |
//!
//! ## Outcome reporting
//!
//! Duplicate admission, orphan replies, and retry exhaustion are ordinary
//! messages on dedicated ports, never errors: consumers that need
//! failure visibility subscribe to the dropped-request port alongside the
//! result port.

/// Error types for building and feeding a requester.
pub mod error;
/// Fan-out output ports.
pub mod port;
/// The requester orchestrator, its builder, and the retry token.
pub mod requester;
/// Delayed-callback scheduler collaborator.
pub mod sched;

mod handler;
mod table;

/// Correlator metrics (atomic counters and snapshots).
pub mod metrics;

pub use error::{Error, Result};
pub use metrics::{RequesterMetrics, RequesterStats};
pub use port::Outlet;
pub use requester::{Requester, RequesterBuilder, RetryToken, DEFAULT_CHANNEL_CAPACITY};
pub use sched::{DelayedSender, TokioDelayedSender};
