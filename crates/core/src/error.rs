// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error types and the fatal-condition helper.

use thiserror::Error;

/// Errors shared across crates that don't otherwise have their own error
/// enum (namespace/hash parsing, committee lookups surfaced as core errors).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("committee error: {0}")]
    Committee(#[from] crate::committee::CommitteeError),
    #[error("crypto error: {0}")]
    Crypto(#[from] crate::crypto::CryptoError),
}

/// Terminate the process after logging a descriptive diagnostic.
///
/// Used for conditions the spec classifies as programmer errors — an
/// illegal state transition, or an unrecoverable initialization failure —
/// where propagating a `Result` would let the caller paper over a broken
/// invariant. Never used for anything a remote peer can trigger.
pub fn fatal(message: &str) -> ! {
    tracing::error!(reason = message, "fatal condition, terminating");
    std::process::exit(1)
}
