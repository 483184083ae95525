// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the correlator.

use std::fmt;

/// Result type for correlator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when building or feeding a requester
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Builder was not given a request key function
    MissingRequestKeyFn,

    /// Builder was not given a reply key function
    MissingReplyKeyFn,

    /// Builder was not given a composer function
    MissingComposer,

    /// `tries` must be at least 1 (the first send counts as try #1)
    ZeroTries,

    /// `timeout` must be greater than zero
    ZeroTimeout,

    /// The event loop has shut down; the message was not accepted
    Stopped,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequestKeyFn => write!(f, "no request key function configured"),
            Self::MissingReplyKeyFn => write!(f, "no reply key function configured"),
            Self::MissingComposer => write!(f, "no composer function configured"),
            Self::ZeroTries => write!(f, "tries must be >= 1"),
            Self::ZeroTimeout => write!(f, "timeout must be greater than zero"),
            Self::Stopped => write!(f, "requester has shut down"),
        }
    }
}

impl std::error::Error for Error {}
