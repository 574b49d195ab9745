// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The outer per-node event loop (§5): a single task that selects over
//! inbound dispatches, new blocks, discrepancy events, epoch transitions,
//! and runtime lifecycle events, driving the `Node` state machine under the
//! `CrossNode` lock and spawning short-lived batch tasks.
//!
//! This module owns nothing the `Node` itself doesn't already own except the
//! collaborators spec.md §6 names as external interfaces (storage, the
//! merge publisher, the epoch source) and the `Metrics` registry.

use crate::admission;
use crate::commitment::{self, CommitContext, CommitInput, MergePublisher};
use crate::epoch_source::EpochSource;
use crate::error::PipelineError;
use crate::metrics::Metrics;
use crate::node::{AdmissionOutcome, BatchWorkOrder, Node};
use crate::state::{DiscrepancyEvent, NodeState};
use crate::storage_client::StorageClient;
use executor_core::{BlockHeader, Signer};
use executor_process::SandboxProvisioner;
use executor_wire::{RuntimeExecuteTxBatchRequest, SignedDispatch};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Inbound channels the event loop selects over. Each is fed by collaborators
/// out of scope for this node (P2P demux, the consensus/registry backend).
pub struct Inbound {
    pub dispatches: mpsc::Receiver<SignedDispatch>,
    pub blocks: mpsc::Receiver<BlockHeader>,
    pub events: mpsc::Receiver<DiscrepancyEvent>,
    pub epoch_source: Box<dyn EpochSource>,
}

/// Result of a batch task's call into the sandboxed runtime, handed back to
/// the event loop over `done_tx`.
struct BatchOutcome {
    order: BatchWorkOrder,
    result: Result<executor_wire::ComputedBatch, PipelineError>,
}

/// Everything one executor committee node needs beyond the state machine
/// itself: its sandbox, its storage/merge collaborators, and its metrics.
pub struct CommitteeNode {
    node: Mutex<Node>,
    sandbox: Arc<SandboxProvisioner>,
    storage: Arc<dyn StorageClient>,
    merge: Arc<dyn MergePublisher>,
    signer: Arc<dyn Signer>,
    metrics: Arc<Metrics>,
    runtime_label: String,
    fault_detector_timeout: Duration,
}

impl CommitteeNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node: Node,
        sandbox: Arc<SandboxProvisioner>,
        storage: Arc<dyn StorageClient>,
        merge: Arc<dyn MergePublisher>,
        signer: Arc<dyn Signer>,
        metrics: Arc<Metrics>,
        runtime_label: String,
        fault_detector_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            node: Mutex::new(node),
            sandbox,
            storage,
            merge,
            signer,
            metrics,
            runtime_label,
            fault_detector_timeout,
        })
    }

    /// The node-wide cancellation token; cancelling it stops `run`.
    pub fn stop_token(&self) -> tokio_util::sync::CancellationToken {
        self.node.lock().stop_token()
    }

    /// Run the outer event loop until the node's stop token fires.
    pub async fn run(self: Arc<Self>, mut inbound: Inbound) {
        let stop = self.node.lock().stop_token();
        let mut runtime_events = self.sandbox.subscribe();
        let (done_tx, mut done_rx) = mpsc::channel::<BatchOutcome>(1);

        loop {
            tokio::select! {
                () = stop.cancelled() => {
                    tracing::info!(runtime = %self.runtime_label, "event loop stopping");
                    break;
                }
                maybe_dispatch = inbound.dispatches.recv() => {
                    let Some(signed) = maybe_dispatch else { break };
                    self.handle_dispatch(signed, done_tx.clone()).await;
                }
                maybe_block = inbound.blocks.recv() => {
                    let Some(block) = maybe_block else { break };
                    self.handle_new_block(block, done_tx.clone());
                }
                maybe_event = inbound.events.recv() => {
                    let Some(event) = maybe_event else { break };
                    self.handle_discrepancy(event, done_tx.clone());
                }
                snapshot = inbound.epoch_source.next_epoch() => {
                    self.node.lock().handle_epoch_transition(snapshot);
                }
                runtime_event = runtime_events.recv() => {
                    if let Ok(event) = runtime_event {
                        tracing::debug!(runtime = %self.runtime_label, ?event, "runtime lifecycle event");
                    }
                }
                Some(outcome) = done_rx.recv() => {
                    self.handle_batch_outcome(outcome).await;
                }
            }
        }
    }

    /// `HandlePeerMessage(msg)` restricted to `SignedTxnSchedulerBatchDispatch`
    /// (§4.5), driving the admission pipeline (§4.6).
    async fn handle_dispatch(self: &Arc<Self>, signed: SignedDispatch, done_tx: mpsc::Sender<BatchOutcome>) {
        let (snapshot, namespace, min_write_replication) = {
            let node = self.node.lock();
            (node.snapshot().cloned(), node.runtime_namespace, node.min_write_replication)
        };
        let Some(snapshot) = snapshot else {
            tracing::debug!(runtime = %self.runtime_label, "dispatch ignored before any epoch transition");
            return;
        };

        let started = Instant::now();
        let admitted = admission::admit(&signed, &snapshot, namespace, min_write_replication, &self.storage).await;
        self.metrics
            .batch_read_time
            .with_label_values(&[self.runtime_label.as_str()])
            .observe(started.elapsed().as_secs_f64());

        let admitted = match admitted {
            Ok(admitted) => admitted,
            Err(e) => {
                tracing::warn!(runtime = %self.runtime_label, error = %e, "dispatch failed admission");
                return;
            }
        };

        let outcome = {
            let mut node = self.node.lock();
            node.admit_into_state_machine(admitted)
        };
        match outcome {
            Ok(AdmissionOutcome::Started(order)) => self.spawn_batch_task(order, done_tx),
            Ok(AdmissionOutcome::Deferred) | Ok(AdmissionOutcome::Ignored) => {}
            Err(e) => tracing::error!(runtime = %self.runtime_label, error = %e, "admission rejected dispatch"),
        }
    }

    /// `HandleNewBlockEarly` then `HandleNewBlock` (§4.5): abort any in-flight
    /// batch before advancing, then let the state machine decide whether a
    /// held dispatch can now start processing.
    fn handle_new_block(self: &Arc<Self>, block: BlockHeader, done_tx: mpsc::Sender<BatchOutcome>) {
        let mut node = self.node.lock();
        self.record_finalize_latency(&node);
        node.handle_new_block_early();
        let order = node.handle_new_block(block);
        drop(node);
        if let Some(order) = order {
            self.spawn_batch_task(order, done_tx);
        }
    }

    /// `HandleNewEvent(ExecutionDiscrepancyDetected)` (§4.5).
    fn handle_discrepancy(self: &Arc<Self>, event: DiscrepancyEvent, done_tx: mpsc::Sender<BatchOutcome>) {
        self.metrics
            .execution_discrepancy_detected_count
            .with_label_values(&[self.runtime_label.as_str()])
            .inc();
        let mut node = self.node.lock();
        let order = node.handle_discrepancy_event(event);
        drop(node);
        if let Some(order) = order {
            self.spawn_batch_task(order, done_tx);
        }
    }

    /// Records the `WaitingForFinalize -> WaitingForBatch` latency (§4.5
    /// `HandleNewBlock`'s note on `WaitingForEvent`/`WaitingForFinalize`)
    /// before the caller drives the transition away from it.
    fn record_finalize_latency(&self, node: &Node) {
        if let NodeState::WaitingForFinalize { started_at } = node.state() {
            self.metrics
                .batch_processing_time
                .with_label_values(&[self.runtime_label.as_str()])
                .observe(started_at.elapsed().as_secs_f64());
        }
    }

    /// Spawn a short-lived task that calls the sandboxed runtime for one
    /// round's batch, cancellable via the round's processing token.
    fn spawn_batch_task(self: &Arc<Self>, order: BatchWorkOrder, done_tx: mpsc::Sender<BatchOutcome>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let request = RuntimeExecuteTxBatchRequest {
                io_root: order.payload.io_root,
                inputs: order.payload.batch.clone(),
                block: order.payload.header.clone(),
            };
            let started = Instant::now();
            let result = tokio::select! {
                result = this.sandbox.execute_batch(request) => {
                    result.map_err(|e| PipelineError::Runtime(e.to_string()))
                }
                () = order.round.processing_token().cancelled() => {
                    Err(PipelineError::Runtime("batch processing cancelled".into()))
                }
            };
            this.metrics
                .batch_runtime_processing_time
                .with_label_values(&[this.runtime_label.as_str()])
                .observe(started.elapsed().as_secs_f64());
            let _ = done_tx.send(BatchOutcome { order, result }).await;
        });
    }

    /// Commitment pipeline (§4.7), driven once a batch task reports back.
    /// Any failure calls `abort_batch`; success publishes and finalizes.
    async fn handle_batch_outcome(self: &Arc<Self>, outcome: BatchOutcome) {
        let BatchOutcome { order, result } = outcome;

        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(runtime = %self.runtime_label, error = %e, "runtime batch execution failed");
                self.abort(&e);
                return;
            }
        };

        let snapshot = match self.node.lock().snapshot().cloned() {
            Some(snapshot) => snapshot,
            None => {
                self.abort(&PipelineError::Runtime("epoch snapshot missing at commit time".into()));
                return;
            }
        };

        let committee_id = snapshot.executor_committee_id();
        let input = CommitInput {
            committee_id,
            last: order.payload.header.clone(),
            io_root: order.payload.io_root,
            batch,
            txn_sched_sig: order.payload.txn_sched_sig,
            input_storage_sigs: order.payload.input_storage_sigs.clone(),
            snapshot: snapshot.clone(),
        };

        let ctx = CommitContext {
            storage: Arc::clone(&self.storage),
            signer: Arc::clone(&self.signer),
            metrics: Arc::clone(&self.metrics),
            runtime_label: self.runtime_label.clone(),
        };

        match commitment::run_pipeline(&ctx, input).await {
            Ok(commitment) => {
                // Step 9: a merge-committee member delivers to its local merge
                // node directly instead of waiting on gossip to loop back.
                let publish_result = if snapshot.is_merge_member() {
                    self.merge.publish_local(commitment.clone()).await
                } else {
                    self.merge.publish(commitment.clone()).await
                };
                if let Err(e) = publish_result {
                    tracing::error!(runtime = %self.runtime_label, error = %e, "failed to publish commitment");
                }
                commitment::spawn_fault_detector(
                    Arc::clone(&self.merge),
                    commitment,
                    order.round.clone(),
                    self.fault_detector_timeout,
                    self.runtime_label.clone(),
                );
                self.node.lock().finish_processing();
            }
            Err(e) => {
                tracing::warn!(runtime = %self.runtime_label, error = %e, "commitment pipeline failed");
                self.abort(&e);
            }
        }
    }

    fn abort(&self, _err: &PipelineError) {
        self.node.lock().abort_batch();
        self.metrics.aborted_batch_count.with_label_values(&[self.runtime_label.as_str()]).inc();
    }
}
