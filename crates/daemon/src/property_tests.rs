// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests for the §8 testable invariants: the state machine only
//! takes table transitions, at most one `ProcessingBatch` is ever active at
//! a time, and the observed block round only moves forward.

use crate::node::Node;
use crate::state::{is_legal_transition, DispatchPayload, NodeState, NodeStateCell};
use executor_core::round::RoundContext;
use executor_core::test_support::{fresh_signer, snapshot_for};
use executor_core::{BlockHeader, Hash, Namespace, RawBatch, Role, Signature, Signer};
use proptest::prelude::*;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

fn payload() -> DispatchPayload {
    DispatchPayload {
        io_root: Hash::zero(),
        batch: RawBatch::default(),
        header: BlockHeader {
            namespace: Namespace::zero(),
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

/// Build the state variant named `name`, with placeholder payloads. Only
/// ever called with a name this module's own adjacency table produced, so
/// it never needs to handle an unrecognized one.
fn state_for(name: &str) -> NodeState {
    match name {
        "NotReady" => NodeState::NotReady,
        "WaitingForBatch" => NodeState::WaitingForBatch { pending_event: None },
        "WaitingForBlock" => NodeState::WaitingForBlock { payload: payload() },
        "WaitingForEvent" => NodeState::WaitingForEvent { payload: payload() },
        "ProcessingBatch" => {
            let node_token = CancellationToken::new();
            NodeState::ProcessingBatch {
                payload: payload(),
                started_at: Instant::now(),
                round: RoundContext::new(&node_token, None),
            }
        }
        "WaitingForFinalize" => NodeState::WaitingForFinalize { started_at: Instant::now() },
        other => unreachable!("no such state: {other}"),
    }
}

/// A reference model of the §4.5 table, maintained independently of
/// `is_legal_transition` so a proptest run catches the two drifting apart.
fn legal_successors(name: &str) -> &'static [&'static str] {
    match name {
        "NotReady" => &["WaitingForBatch"],
        "WaitingForBatch" => {
            &["NotReady", "WaitingForBlock", "WaitingForEvent", "ProcessingBatch"]
        }
        "WaitingForBlock" => &["WaitingForBatch", "ProcessingBatch"],
        "WaitingForEvent" => &["WaitingForBatch", "ProcessingBatch"],
        "ProcessingBatch" => &["WaitingForFinalize"],
        "WaitingForFinalize" => &["WaitingForBatch", "NotReady"],
        other => unreachable!("no such state: {other}"),
    }
}

const ALL_STATE_NAMES: [&str; 6] = [
    "NotReady",
    "WaitingForBatch",
    "WaitingForBlock",
    "WaitingForEvent",
    "ProcessingBatch",
    "WaitingForFinalize",
];

fn all_transition_pairs() -> Vec<(&'static str, &'static str, bool)> {
    let mut pairs = Vec::with_capacity(ALL_STATE_NAMES.len() * ALL_STATE_NAMES.len());
    for from in ALL_STATE_NAMES {
        for to in ALL_STATE_NAMES {
            let expected = legal_successors(from).contains(&to);
            pairs.push((from, to, expected));
        }
    }
    pairs
}

proptest! {
    /// `is_legal_transition` agrees with the §4.5 table over every ordered
    /// pair of states, not just the ones exercised by `allows_every_table_transition`.
    #[test]
    fn transition_table_matches_reference_model(
        (from, to, expected) in proptest::sample::select(all_transition_pairs())
    ) {
        prop_assert_eq!(is_legal_transition(from, to), expected);
    }

    /// Walking only ever-legal transitions never lands the cell on
    /// `ProcessingBatch` twice in a row, i.e. a new batch can't start
    /// processing without first leaving the previous one via
    /// `WaitingForFinalize` — at most one `ProcessingBatch` is live at a time.
    #[test]
    fn at_most_one_processing_batch_at_a_time(choices in prop::collection::vec(0u8..4, 1..24)) {
        let mut cell = NodeStateCell::new();
        let mut from = cell.get().name();
        for choice in choices {
            let successors = legal_successors(from);
            let to = successors[choice as usize % successors.len()];
            prop_assert!(!(from == "ProcessingBatch" && to == "ProcessingBatch"));
            cell.set(state_for(to));
            prop_assert_eq!(cell.get().name(), to);
            from = to;
        }
    }

    /// `current_block`'s round only moves forward as blocks arrive in
    /// non-decreasing round order (the order the consensus layer guarantees).
    #[test]
    fn current_block_round_is_monotonic(deltas in prop::collection::vec(0u64..4, 1..16)) {
        let namespace = Namespace::zero();
        let signer = fresh_signer();
        let mut node = Node::new(namespace, "property-test".to_string(), 1);
        let snapshot = snapshot_for(signer.public_key(), Role::Worker, signer.public_key(), vec![]);
        node.handle_epoch_transition(snapshot);

        let mut round = 0u64;
        let mut last_seen = 0u64;
        for delta in deltas {
            round += delta;
            let block = BlockHeader {
                namespace,
                round,
                io_root: Hash::digest(&round.to_le_bytes()),
                state_root: Hash::zero(),
                previous_hash: Hash::zero(),
                encoded_hash: Hash::zero(),
                timestamp: 0,
                receipts_hash: Hash::zero(),
            };
            node.handle_new_block(block);
            let observed = node.current_block().expect("block was just set").round;
            prop_assert!(observed >= last_seen);
            last_seen = observed;
        }
    }
}
