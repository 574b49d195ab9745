// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime block headers.

use crate::hash::Hash;
use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};

/// A single round's block header on a runtime's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub namespace: Namespace,
    pub round: u64,
    pub io_root: Hash,
    pub state_root: Hash,
    pub previous_hash: Hash,
    pub encoded_hash: Hash,
    /// Block timestamp; excluded from `mostly_equal`.
    pub timestamp: u64,
    /// Consensus-layer receipts accumulated for this header; excluded from
    /// `mostly_equal`.
    pub receipts_hash: Hash,
}

impl BlockHeader {
    /// Two headers are "mostly equal" if they match on every field except
    /// timestamp and receipts (§3).
    pub fn mostly_equal(&self, other: &BlockHeader) -> bool {
        self.namespace == other.namespace
            && self.round == other.round
            && self.io_root == other.io_root
            && self.state_root == other.state_root
            && self.previous_hash == other.previous_hash
            && self.encoded_hash == other.encoded_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(round: u64) -> BlockHeader {
        BlockHeader {
            namespace: Namespace::zero(),
            round,
            io_root: Hash::digest(b"io"),
            state_root: Hash::digest(b"state"),
            previous_hash: Hash::digest(b"prev"),
            encoded_hash: Hash::digest(b"encoded"),
            timestamp: 1,
            receipts_hash: Hash::zero(),
        }
    }

    #[test]
    fn mostly_equal_ignores_timestamp_and_receipts() {
        let mut a = header(5);
        let mut b = header(5);
        b.timestamp = 999;
        b.receipts_hash = Hash::digest(b"other-receipts");
        assert!(a.mostly_equal(&b));
        a.io_root = Hash::digest(b"different");
        assert!(!a.mostly_equal(&b));
    }
}
