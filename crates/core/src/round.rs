// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-round cancellation context.
//!
//! Each round owns a cancellation token derived from the node-wide token
//! (§5). `HandleNewBlock` cancels the prior round's token before creating a
//! new one; `abort_batch` cancels only the processing sub-token.

use tokio_util::sync::CancellationToken;

/// Cancellation scope for a single round of batch processing.
#[derive(Clone)]
pub struct RoundContext {
    round_token: CancellationToken,
    processing_token: CancellationToken,
}

impl RoundContext {
    /// Derive a new round context from the node-wide token, cancelling
    /// `previous` if one is given (the prior round's work is now stale).
    pub fn new(node_token: &CancellationToken, previous: Option<&RoundContext>) -> Self {
        if let Some(prev) = previous {
            prev.cancel_round();
        }
        let round_token = node_token.child_token();
        let processing_token = round_token.child_token();
        Self { round_token, processing_token }
    }

    /// Cancel everything derived from this round, including any in-flight
    /// processing sub-token.
    pub fn cancel_round(&self) {
        self.round_token.cancel();
    }

    /// Cancel only the processing sub-token, leaving the round token (and
    /// hence any future processing attempt within the same round) alive.
    pub fn cancel_processing(&self) {
        self.processing_token.cancel();
    }

    pub fn processing_token(&self) -> CancellationToken {
        self.processing_token.clone()
    }

    pub fn is_round_cancelled(&self) -> bool {
        self.round_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_round_cancels_previous() {
        let node_token = CancellationToken::new();
        let first = RoundContext::new(&node_token, None);
        assert!(!first.is_round_cancelled());
        let second = RoundContext::new(&node_token, Some(&first));
        assert!(first.is_round_cancelled());
        assert!(!second.is_round_cancelled());
    }

    #[test]
    fn cancel_processing_does_not_cancel_round() {
        let node_token = CancellationToken::new();
        let round = RoundContext::new(&node_token, None);
        round.cancel_processing();
        assert!(round.processing_token().is_cancelled());
        assert!(!round.is_round_cancelled());
    }
}
