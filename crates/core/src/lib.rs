// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! executor-core: shared primitives for the executor committee node.
//!
//! Types and invariants here are deliberately minimal and have no knowledge
//! of the sandbox, the wire protocol, or the event loop — they are the
//! vocabulary every other crate in the workspace builds on.

pub mod batch;
pub mod committee;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod header;
pub mod macros;
pub mod namespace;
pub mod round;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use batch::RawBatch;
pub use committee::{Committee, CommitteeError, CommitteeKind, EpochSnapshot, Role};
pub use crypto::{verify, CryptoError, IdentitySigner, PublicKey, Signature, Signer};
pub use error::{fatal, CoreError};
pub use hash::Hash;
pub use header::BlockHeader;
pub use namespace::Namespace;
pub use round::RoundContext;
