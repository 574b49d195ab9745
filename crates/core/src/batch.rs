// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw (unexecuted) transaction batches.

use crate::hash::Hash;
use serde::{Deserialize, Serialize};

/// An ordered sequence of opaque transaction blobs, identified by its I/O
/// root hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBatch(pub Vec<Vec<u8>>);

impl RawBatch {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Content-addressed root of the batch, computed as the hash of the
    /// concatenated per-transaction hashes in order.
    pub fn io_root(&self) -> Hash {
        let mut buf = Vec::with_capacity(self.0.len() * 32);
        for tx in &self.0 {
            buf.extend_from_slice(Hash::digest(tx).as_bytes());
        }
        Hash::digest(&buf)
    }
}
