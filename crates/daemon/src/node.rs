// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Node` struct: everything the `CrossNode` mutex guards (§4.5, §5).
//! Every method here assumes the caller already holds the lock — none of
//! them suspend, so that invariant is easy to keep.

use crate::admission::AdmittedDispatch;
use crate::error::AdmissionError;
use crate::state::{DiscrepancyEvent, DispatchPayload, NodeState, NodeStateCell};
use executor_core::round::RoundContext;
use executor_core::{BlockHeader, EpochSnapshot, Namespace};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A round's worth of work handed to the outer event loop once the state
/// machine decides to start processing a batch.
pub struct BatchWorkOrder {
    pub payload: DispatchPayload,
    pub round: RoundContext,
}

/// Outcome of admission step 8, told to the caller so it can log or meter
/// appropriately; `Started` additionally carries the work order for the
/// event loop to spawn a batch task with.
pub enum AdmissionOutcome {
    Started(BatchWorkOrder),
    Deferred,
    Ignored,
}

pub struct Node {
    pub runtime_namespace: Namespace,
    pub runtime_label: String,
    pub min_write_replication: usize,
    state: NodeStateCell,
    snapshot: Option<EpochSnapshot>,
    current_block: Option<BlockHeader>,
    round: Option<RoundContext>,
    node_token: CancellationToken,
}

impl Node {
    pub fn new(runtime_namespace: Namespace, runtime_label: String, min_write_replication: usize) -> Self {
        Self {
            runtime_namespace,
            runtime_label,
            min_write_replication,
            state: NodeStateCell::new(),
            snapshot: None,
            current_block: None,
            round: None,
            node_token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> &NodeState {
        self.state.get()
    }

    pub fn snapshot(&self) -> Option<&EpochSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn current_block(&self) -> Option<&BlockHeader> {
        self.current_block.as_ref()
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.node_token.clone()
    }

    /// `HandleEpochTransition(epoch)` (§4.5).
    pub fn handle_epoch_transition(&mut self, snapshot: EpochSnapshot) {
        let is_member = snapshot.is_executor_member();
        self.snapshot = Some(snapshot);
        if is_member {
            if matches!(self.state.get(), NodeState::NotReady) {
                self.state.set(NodeState::WaitingForBatch { pending_event: None });
            }
        } else {
            self.retire_to_not_ready();
        }
    }

    /// Drive the state machine down to `NotReady` from wherever it
    /// currently sits, taking whatever legal intermediate step the §4.5
    /// table requires and cancelling any in-flight round along the way.
    /// `NodeStateCell::set` has no notion of "already there" or "several
    /// hops away" — it only accepts single edges from the table — so a
    /// direct `set(NotReady)` from e.g. `ProcessingBatch` would be an
    /// illegal transition and fatal the process.
    fn retire_to_not_ready(&mut self) {
        match self.state.get() {
            NodeState::NotReady => {}
            NodeState::ProcessingBatch { round, .. } => {
                round.cancel_processing();
                self.state.set(NodeState::WaitingForFinalize { started_at: Instant::now() });
                self.state.set(NodeState::NotReady);
            }
            NodeState::WaitingForBlock { .. } | NodeState::WaitingForEvent { .. } => {
                self.state.set(NodeState::WaitingForBatch { pending_event: None });
                self.state.set(NodeState::NotReady);
            }
            NodeState::WaitingForBatch { .. } | NodeState::WaitingForFinalize { .. } => {
                self.state.set(NodeState::NotReady);
            }
        }
    }

    /// `HandleNewBlockEarly(block)`: abort any in-flight batch before the
    /// block otherwise advances state.
    pub fn handle_new_block_early(&mut self) {
        if let NodeState::ProcessingBatch { round, .. } = self.state.get() {
            round.cancel_processing();
        }
    }

    /// `HandleNewBlock(block)` (§4.5). Returns a work order if the new block
    /// lets a held dispatch start processing.
    pub fn handle_new_block(&mut self, block: BlockHeader) -> Option<BatchWorkOrder> {
        let previous_round = self.round.take();
        let new_round = RoundContext::new(&self.node_token, previous_round.as_ref());
        self.round = Some(new_round.clone());

        let order = match self.state.get() {
            NodeState::WaitingForBlock { payload } if payload.header.mostly_equal(&block) => {
                let payload = payload.clone();
                self.start_processing(payload, new_round.clone())
            }
            NodeState::WaitingForBlock { payload } if block.round >= payload.header.round => {
                self.state.set(NodeState::WaitingForBatch { pending_event: None });
                None
            }
            NodeState::WaitingForEvent { .. } => {
                self.state.set(NodeState::WaitingForBatch { pending_event: None });
                None
            }
            NodeState::WaitingForFinalize { .. } => {
                self.state.set(NodeState::WaitingForBatch { pending_event: None });
                None
            }
            _ => None,
        };

        self.current_block = Some(block);
        order
    }

    /// `HandleNewEvent(ev)` (§4.5), restricted to `ExecutionDiscrepancyDetected`.
    pub fn handle_discrepancy_event(&mut self, event: DiscrepancyEvent) -> Option<BatchWorkOrder> {
        let snapshot = self.snapshot.as_ref()?;
        if !snapshot.is_executor_backup_worker() {
            return None;
        }
        if event.committee_id != snapshot.executor_committee_id() {
            return None;
        }

        match self.state.get() {
            NodeState::WaitingForBatch { .. } => {
                self.state.set(NodeState::WaitingForBatch { pending_event: Some(event) });
                None
            }
            NodeState::WaitingForEvent { payload } => {
                let payload = payload.clone();
                let round = self.round.clone().unwrap_or_else(|| RoundContext::new(&self.node_token, None));
                self.round = Some(round.clone());
                self.start_processing(payload, round)
            }
            _ => {
                tracing::debug!(
                    runtime = %self.runtime_label,
                    state = self.state.get().name(),
                    "discrepancy event ignored in current state"
                );
                None
            }
        }
    }

    /// Admission pipeline step 8 (§4.6): enter the state machine under the
    /// lock with an already-validated dispatch.
    pub fn admit_into_state_machine(
        &mut self,
        admitted: AdmittedDispatch,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        let snapshot = self.snapshot.as_ref().ok_or(AdmissionError::IncorrectRole)?;
        if !matches!(self.state.get(), NodeState::WaitingForBatch { .. }) {
            return Err(AdmissionError::IncorrectState);
        }
        if !snapshot.is_executor_member() {
            return Err(AdmissionError::IncorrectRole);
        }
        if admitted.committee_id != snapshot.executor_committee_id() {
            return Ok(AdmissionOutcome::Ignored);
        }

        let pending_event = match self.state.get() {
            NodeState::WaitingForBatch { pending_event } => pending_event.clone(),
            _ => None,
        };

        let payload = DispatchPayload {
            io_root: admitted.io_root,
            batch: admitted.batch,
            header: admitted.header.clone(),
            txn_sched_sig: admitted.txn_sched_sig,
            input_storage_sigs: admitted.input_storage_sigs,
        };

        let current_round = self.current_block.as_ref().map(|b| b.round);

        if let Some(current) = self.current_block.as_ref() {
            if current.mostly_equal(&payload.header) {
                let round =
                    self.round.clone().unwrap_or_else(|| RoundContext::new(&self.node_token, None));
                self.round = Some(round.clone());
                if snapshot.is_executor_backup_worker() && pending_event.is_none() {
                    self.state.set(NodeState::WaitingForEvent { payload });
                    return Ok(AdmissionOutcome::Deferred);
                }
                return Ok(AdmissionOutcome::Started(self.start_processing(payload, round)));
            }
            if current_round.unwrap_or(0) >= payload.header.round {
                return Err(AdmissionError::IncompatibleHeader);
            }
        }

        self.state.set(NodeState::WaitingForBlock { payload });
        Ok(AdmissionOutcome::Deferred)
    }

    fn start_processing(&mut self, payload: DispatchPayload, round: RoundContext) -> BatchWorkOrder {
        self.state.set(NodeState::ProcessingBatch {
            payload: payload.clone(),
            started_at: Instant::now(),
            round: round.clone(),
        });
        BatchWorkOrder { payload, round }
    }

    /// `abort_batch(err)` (§4.7 failures, §4.5 `HandleNewEvent`/`HandleNewBlockEarly`).
    /// Cancels the processing sub-token and always lands in `WaitingForFinalize`.
    // TODO: re-dispatch payload.batch to the transaction scheduler instead of
    // dropping it silently; needs a scheduler-facing client this node doesn't
    // have yet.
    pub fn abort_batch(&mut self) {
        if let NodeState::ProcessingBatch { round, .. } = self.state.get() {
            round.cancel_processing();
        }
        self.state.set(NodeState::WaitingForFinalize { started_at: Instant::now() });
    }

    /// Called once the commitment pipeline finishes successfully (§4.7 step 9).
    pub fn finish_processing(&mut self) {
        self.state.set(NodeState::WaitingForFinalize { started_at: Instant::now() });
    }
}

impl AdmissionOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, AdmissionOutcome::Started(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::AdmittedDispatch;
    use executor_core::test_support::{fresh_signer, snapshot_for};
    use executor_core::{Hash, RawBatch, Role, Signature, Signer};

    fn header(namespace: Namespace, round: u64, io_root: Hash) -> BlockHeader {
        BlockHeader {
            namespace,
            round,
            io_root,
            state_root: Hash::zero(),
            previous_hash: Hash::zero(),
            encoded_hash: Hash::zero(),
            timestamp: 0,
            receipts_hash: Hash::zero(),
        }
    }

    fn admitted(header: BlockHeader, committee_id: Hash) -> AdmittedDispatch {
        AdmittedDispatch {
            committee_id,
            io_root: header.io_root,
            header,
            batch: RawBatch(vec![b"tx".to_vec()]),
            txn_sched_sig: Signature([0u8; 64]),
            input_storage_sigs: vec![],
        }
    }

    #[test]
    fn worker_dispatch_at_current_round_starts_processing_immediately() {
        let namespace = Namespace::zero();
        let node_signer = fresh_signer();
        let mut node = Node::new(namespace, "test".to_string(), 1);

        let snapshot = snapshot_for(node_signer.public_key(), Role::Worker, node_signer.public_key(), vec![]);
        let committee_id = snapshot.executor_committee_id();
        node.handle_epoch_transition(snapshot);

        let current = header(namespace, 1, Hash::digest(b"io"));
        node.handle_new_block(current.clone());

        let outcome = node
            .admit_into_state_machine(admitted(current, committee_id))
            .expect("admission must succeed");
        assert!(outcome.is_started());
        assert_eq!(node.state().name(), "ProcessingBatch");
    }

    #[test]
    fn dispatch_ahead_of_local_block_waits() {
        let namespace = Namespace::zero();
        let node_signer = fresh_signer();
        let mut node = Node::new(namespace, "test".to_string(), 1);

        let snapshot = snapshot_for(node_signer.public_key(), Role::Worker, node_signer.public_key(), vec![]);
        let committee_id = snapshot.executor_committee_id();
        node.handle_epoch_transition(snapshot);

        let current = header(namespace, 1, Hash::digest(b"io-1"));
        node.handle_new_block(current);

        let ahead = header(namespace, 2, Hash::digest(b"io-2"));
        let outcome =
            node.admit_into_state_machine(admitted(ahead.clone(), committee_id)).expect("ok");
        assert!(!outcome.is_started());
        assert_eq!(node.state().name(), "WaitingForBlock");

        let work = node.handle_new_block(ahead);
        assert!(work.is_some());
        assert_eq!(node.state().name(), "ProcessingBatch");
    }

    #[test]
    fn epoch_transition_out_of_committee_while_processing_does_not_fatal() {
        let namespace = Namespace::zero();
        let node_signer = fresh_signer();
        let mut node = Node::new(namespace, "test".to_string(), 1);

        let snapshot = snapshot_for(node_signer.public_key(), Role::Worker, node_signer.public_key(), vec![]);
        let committee_id = snapshot.executor_committee_id();
        node.handle_epoch_transition(snapshot);

        let current = header(namespace, 1, Hash::digest(b"io"));
        node.handle_new_block(current.clone());
        let outcome = node
            .admit_into_state_machine(admitted(current, committee_id))
            .expect("admission must succeed");
        assert!(outcome.is_started());
        assert_eq!(node.state().name(), "ProcessingBatch");

        let retired = snapshot_for(
            node_signer.public_key(),
            Role::NonMember,
            node_signer.public_key(),
            vec![],
        );
        node.handle_epoch_transition(retired);
        assert_eq!(node.state().name(), "NotReady");
    }

    #[test]
    fn foreign_committee_id_is_ignored() {
        let namespace = Namespace::zero();
        let node_signer = fresh_signer();
        let mut node = Node::new(namespace, "test".to_string(), 1);
        let snapshot = snapshot_for(node_signer.public_key(), Role::Worker, node_signer.public_key(), vec![]);
        node.handle_epoch_transition(snapshot);

        let current = header(namespace, 1, Hash::digest(b"io"));
        node.handle_new_block(current.clone());

        let outcome = node
            .admit_into_state_machine(admitted(current, Hash::digest(b"someone-elses-committee")))
            .expect("ok");
        assert!(matches!(outcome, AdmissionOutcome::Ignored));
        assert_eq!(node.state().name(), "WaitingForBatch");
    }
}
