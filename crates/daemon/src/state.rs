// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The executor state machine's states and its transition table (§4.5).
//!
//! `NodeState` carries the payload each state needs; `NodeStateCell` is the
//! only way to move between them, so the adjacency table in
//! `is_legal_transition` can never be bypassed by a direct field write.

use executor_core::{BlockHeader, Hash, PublicKey, RawBatch, Signature};
use executor_core::round::RoundContext;
use std::time::Instant;

/// An `ExecutionDiscrepancyDetected` event for this committee, recorded by a
/// backup worker while it waits in `WaitingForBatch` or `WaitingForEvent`.
#[derive(Debug, Clone)]
pub struct DiscrepancyEvent {
    pub committee_id: Hash,
}

/// Everything a held dispatch needs to resume processing once its
/// prerequisite (a matching block, or a discrepancy event) arrives.
#[derive(Debug, Clone)]
pub struct DispatchPayload {
    pub io_root: Hash,
    pub batch: RawBatch,
    pub header: BlockHeader,
    pub txn_sched_sig: Signature,
    pub input_storage_sigs: Vec<(PublicKey, Signature)>,
}

/// The per-round executor state (§3 "Node state", §4.5).
#[derive(Debug, Clone)]
pub enum NodeState {
    NotReady,
    WaitingForBatch {
        pending_event: Option<DiscrepancyEvent>,
    },
    WaitingForBlock {
        payload: DispatchPayload,
    },
    WaitingForEvent {
        payload: DispatchPayload,
    },
    ProcessingBatch {
        payload: DispatchPayload,
        started_at: Instant,
        round: RoundContext,
    },
    WaitingForFinalize {
        started_at: Instant,
    },
}

impl NodeState {
    pub fn name(&self) -> &'static str {
        match self {
            NodeState::NotReady => "NotReady",
            NodeState::WaitingForBatch { .. } => "WaitingForBatch",
            NodeState::WaitingForBlock { .. } => "WaitingForBlock",
            NodeState::WaitingForEvent { .. } => "WaitingForEvent",
            NodeState::ProcessingBatch { .. } => "ProcessingBatch",
            NodeState::WaitingForFinalize { .. } => "WaitingForFinalize",
        }
    }
}

/// `(from, to)` pairs present in the §4.5 transition table. Anything else is
/// a programmer error.
pub(crate) fn is_legal_transition(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        ("NotReady", "WaitingForBatch")
            | ("WaitingForBatch", "NotReady")
            | ("WaitingForBatch", "WaitingForBlock")
            | ("WaitingForBatch", "WaitingForEvent")
            | ("WaitingForBatch", "ProcessingBatch")
            | ("WaitingForBlock", "WaitingForBatch")
            | ("WaitingForBlock", "ProcessingBatch")
            | ("WaitingForEvent", "WaitingForBatch")
            | ("WaitingForEvent", "ProcessingBatch")
            | ("ProcessingBatch", "WaitingForFinalize")
            | ("WaitingForFinalize", "WaitingForBatch")
            | ("WaitingForFinalize", "NotReady")
    )
}

/// The only way to move a node between states. Holds the current state and
/// enforces the transition table on every write.
#[derive(Debug)]
pub struct NodeStateCell {
    current: NodeState,
}

impl Default for NodeStateCell {
    fn default() -> Self {
        Self { current: NodeState::NotReady }
    }
}

impl NodeStateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> &NodeState {
        &self.current
    }

    /// Move to `next`, terminating the process if the transition isn't in
    /// the table (§4.5 "Any other transition is a programmer error").
    pub fn set(&mut self, next: NodeState) {
        let from = self.current.name();
        let to = next.name();
        if !is_legal_transition(from, to) {
            executor_core::fatal(&format!("illegal executor state transition: {from} -> {to}"));
        }
        tracing::debug!(from, to, "executor state transition");
        self.current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> DispatchPayload {
        DispatchPayload {
            io_root: Hash::zero(),
            batch: RawBatch::default(),
            header: BlockHeader {
                namespace: executor_core::Namespace::zero(),
                round: 1,
                io_root: Hash::zero(),
                state_root: Hash::zero(),
                previous_hash: Hash::zero(),
                encoded_hash: Hash::zero(),
                timestamp: 0,
                receipts_hash: Hash::zero(),
            },
            txn_sched_sig: Signature([0u8; 64]),
            input_storage_sigs: vec![],
        }
    }

    #[test]
    fn allows_every_table_transition() {
        let mut cell = NodeStateCell::new();
        cell.set(NodeState::WaitingForBatch { pending_event: None });
        cell.set(NodeState::WaitingForBlock { payload: payload() });
        cell.set(NodeState::WaitingForBatch { pending_event: None });
        cell.set(NodeState::WaitingForEvent { payload: payload() });
        let node_token = tokio_util::sync::CancellationToken::new();
        cell.set(NodeState::ProcessingBatch {
            payload: payload(),
            started_at: Instant::now(),
            round: RoundContext::new(&node_token, None),
        });
        cell.set(NodeState::WaitingForFinalize { started_at: Instant::now() });
        cell.set(NodeState::NotReady);
    }

    #[test]
    fn name_reflects_variant_regardless_of_payload() {
        let cell = NodeStateCell::new();
        assert_eq!(cell.get().name(), "NotReady");
    }
}
