// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commitment pipeline, steps 1–9 (§4.7). Invoked once the runtime returns a
//! `ComputedBatch` for the in-flight `ProcessingBatch` round. Steps 1–6
//! (`run_pipeline`) are pure verification and signing; step 7 (publish) is a
//! caller-supplied `MergePublisher`; step 8 (fault detector) is spawned by
//! `spawn_fault_detector`; step 9 (state transition) is the caller's job,
//! since it needs the `CrossNode` lock this module has no access to.

use crate::error::PipelineError;
use crate::metrics::Metrics;
use crate::storage_client::{ApplyBatchRequest, StorageClient};
use async_trait::async_trait;
use executor_core::round::RoundContext;
use executor_core::{BlockHeader, CommitteeKind, EpochSnapshot, Hash, PublicKey, Signature, Signer};
use executor_wire::{ApplyOp, ComputedBatch, ExecutorCommitment};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Downstream merge committee, modeled as a narrow trait per §9's "cyclic
/// references are broken by passing the merge node as an explicit
/// dependency" note — this node never holds a back-reference to it.
#[async_trait]
pub trait MergePublisher: Send + Sync {
    async fn publish(&self, commitment: ExecutorCommitment) -> Result<(), PipelineError>;

    /// Deliver directly to an in-process merge node (§4.7 step 9), bypassing
    /// gossip. The default falls back to `publish`; a deployment where the
    /// merge node is collocated in the same process overrides this to hand
    /// the commitment over without a network round trip.
    async fn publish_local(&self, commitment: ExecutorCommitment) -> Result<(), PipelineError> {
        self.publish(commitment).await
    }
}

pub struct CommitContext {
    pub storage: Arc<dyn StorageClient>,
    pub signer: Arc<dyn Signer>,
    pub metrics: Arc<Metrics>,
    pub runtime_label: String,
}

/// Everything the pipeline needs beyond what the runtime itself returned.
pub struct CommitInput {
    pub committee_id: Hash,
    /// The last finalized header; `last.round + 1` is the round being committed.
    pub last: BlockHeader,
    /// The I/O root the dispatch was admitted against.
    pub io_root: Hash,
    pub batch: ComputedBatch,
    pub txn_sched_sig: Signature,
    pub input_storage_sigs: Vec<(PublicKey, Signature)>,
    pub snapshot: EpochSnapshot,
}

/// Run steps 1–6: build apply ops, submit to storage, verify the returned
/// receipts, and sign the executor commitment.
pub async fn run_pipeline(ctx: &CommitContext, input: CommitInput) -> Result<ExecutorCommitment, PipelineError> {
    let CommitInput { committee_id, last, io_root, batch, txn_sched_sig, input_storage_sigs, snapshot } = input;

    // Step 2: the two apply ops, I/O root first then state root — order
    // matters, since the receipt bundle below is verified against this order.
    let io_op = ApplyOp {
        src_round: last.round + 1,
        src_root: io_root,
        dst_root: batch.header.io_root,
        write_log: batch.io_write_log.clone(),
    };
    let state_op = ApplyOp {
        src_round: last.round,
        src_root: last.state_root,
        dst_root: batch.header.state_root,
        write_log: batch.state_write_log.clone(),
    };

    // Step 3: submit to storage, timing the round trip.
    let started = Instant::now();
    let receipts = ctx
        .storage
        .apply_batch(ApplyBatchRequest { namespace: last.namespace, dst_round: last.round + 1, ops: vec![io_op, state_op] })
        .await
        .map_err(|e| PipelineError::StorageFailed(e.to_string()))?;
    ctx.metrics
        .storage_commit_latency
        .with_label_values(&[ctx.runtime_label.as_str()])
        .observe(started.elapsed().as_secs_f64());

    // Steps 4-5: verify each receipt body and signer.
    let expected_roots = vec![batch.header.io_root, batch.header.state_root];
    let storage_committee = snapshot.committee(CommitteeKind::Storage);
    let mut storage_signatures = Vec::with_capacity(receipts.len());
    for receipt in &receipts {
        let body = receipt
            .verify()
            .map_err(|e| PipelineError::StorageFailed(format!("receipt verification failed: {e}")))?;
        if body.namespace != last.namespace || body.round != last.round + 1 || body.roots != expected_roots {
            return Err(PipelineError::StorageFailed("receipt body does not match proposed roots".into()));
        }
        if !storage_committee.is_member(&receipt.signer) {
            return Err(PipelineError::StorageFailed("receipt signer is not a storage-committee member".into()));
        }
        storage_signatures.push((receipt.signer, receipt.signature));
    }

    // Step 6: sign the full commitment with the node identity.
    let commitment = ExecutorCommitment::sign(
        committee_id,
        batch.header.clone(),
        batch.rak_signature,
        txn_sched_sig,
        io_root,
        input_storage_sigs,
        storage_signatures,
        ctx.signer.as_ref(),
    )
    .map_err(|e| PipelineError::Signing(e.to_string()))?;

    ctx.metrics
        .batch_size
        .with_label_values(&[ctx.runtime_label.as_str()])
        .observe(batch.io_write_log.len() as f64);

    Ok(commitment)
}

/// Step 8: install a watchdog that independently resubmits the commitment if
/// no merge finalization is observed within `timeout`. Cancelled along with
/// the round (§9 Open Question resolution: wall-clock, not epoch-relative).
pub fn spawn_fault_detector(
    publisher: Arc<dyn MergePublisher>,
    commitment: ExecutorCommitment,
    round: RoundContext,
    timeout: Duration,
    runtime_label: String,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    runtime = %runtime_label,
                    "no merge commitment observed within the fault-detector threshold, resubmitting"
                );
                if let Err(e) = publisher.publish(commitment).await {
                    tracing::error!(runtime = %runtime_label, error = %e, "fault-detector resubmission failed");
                }
            }
            () = round.processing_token().cancelled() => {}
        }
    });
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    /// Records every commitment published, gossip and local delivery
    /// tracked separately; never fails.
    #[derive(Default)]
    pub struct FakeMergePublisher {
        published: Mutex<Vec<ExecutorCommitment>>,
        published_locally: Mutex<Vec<ExecutorCommitment>>,
    }

    impl FakeMergePublisher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn published_count(&self) -> usize {
            self.published.lock().len()
        }

        pub fn published_locally_count(&self) -> usize {
            self.published_locally.lock().len()
        }
    }

    #[async_trait]
    impl MergePublisher for FakeMergePublisher {
        async fn publish(&self, commitment: ExecutorCommitment) -> Result<(), PipelineError> {
            self.published.lock().push(commitment);
            Ok(())
        }

        async fn publish_local(&self, commitment: ExecutorCommitment) -> Result<(), PipelineError> {
            self.published_locally.lock().push(commitment);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_client::fake::FakeStorageClient;
    use executor_core::test_support::{fresh_signer, snapshot_for};
    use executor_core::{Hash, Namespace, Role};
    use executor_wire::ReceiptBody;

    fn header(namespace: Namespace, round: u64) -> BlockHeader {
        BlockHeader {
            namespace,
            round,
            io_root: Hash::digest(b"io"),
            state_root: Hash::digest(b"state"),
            previous_hash: Hash::zero(),
            encoded_hash: Hash::digest(b"encoded"),
            timestamp: 0,
            receipts_hash: Hash::zero(),
        }
    }

    #[tokio::test]
    async fn happy_path_produces_a_self_consistent_commitment() {
        let namespace = Namespace::zero();
        let node_signer = fresh_signer();
        let storage_signer = fresh_signer();

        let last = header(namespace, 0);
        let computed = ComputedBatch {
            header: header(namespace, 1),
            io_write_log: vec![(b"k".to_vec(), b"v".to_vec())],
            state_write_log: vec![],
            rak_signature: Signature([9u8; 64]),
        };

        let snapshot = snapshot_for(
            node_signer.public_key(),
            Role::Worker,
            node_signer.public_key(),
            vec![storage_signer.public_key()],
        );

        let storage = Arc::new(FakeStorageClient::new(Box::new(storage_signer)));
        let metrics = Arc::new(Metrics::new().expect("metrics construction must succeed"));
        let ctx = CommitContext {
            storage: storage.clone(),
            signer: Arc::new(node_signer),
            metrics,
            runtime_label: "test-runtime".to_string(),
        };

        let input = CommitInput {
            committee_id: Hash::digest(b"committee"),
            last,
            io_root: Hash::digest(b"dispatch-io"),
            batch: computed,
            txn_sched_sig: Signature([1u8; 64]),
            input_storage_sigs: vec![],
            snapshot,
        };

        let commitment = run_pipeline(&ctx, input).await.expect("pipeline must succeed");
        assert_eq!(storage.applied_requests(), 1);
        assert_eq!(commitment.storage_signatures.len(), 1);
        let _ = ReceiptBody::VERSION;
    }
}
