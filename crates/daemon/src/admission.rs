// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch admission pipeline, steps 1–7 (§4.6). Step 8 (state-machine entry
//! under the `CrossNode` lock) lives on `Node` in `node.rs`, since it needs
//! mutable access to current state and block that this module deliberately
//! has no access to.

use crate::error::AdmissionError;
use crate::storage_client::{InputBatchRoot, StorageClient};
use executor_core::{BlockHeader, CommitteeKind, EpochSnapshot, Namespace, PublicKey, RawBatch, Signature};
use executor_wire::{ReceiptBody, SignedDispatch};
use std::sync::Arc;

/// A dispatch that has passed every admission check and is ready to be
/// handed to the state machine (step 8).
pub struct AdmittedDispatch {
    pub committee_id: executor_core::Hash,
    pub io_root: executor_core::Hash,
    pub header: BlockHeader,
    pub batch: RawBatch,
    pub txn_sched_sig: Signature,
    pub input_storage_sigs: Vec<(PublicKey, Signature)>,
}

/// Run steps 1–7 of the admission pipeline against a freshly received
/// signed dispatch envelope.
pub async fn admit(
    signed: &SignedDispatch,
    snapshot: &EpochSnapshot,
    runtime_namespace: Namespace,
    min_write_replication: usize,
    storage: &Arc<dyn StorageClient>,
) -> Result<AdmittedDispatch, AdmissionError> {
    // Step 1: authorize dispatcher.
    let committee = snapshot.committee(CommitteeKind::TransactionScheduler);
    if !committee.is_member(&signed.dispatcher) {
        return Err(AdmissionError::MsgFromNonTxnScheduler);
    }

    // Step 2: open the signed envelope.
    let body = signed
        .verify_dispatcher_signature()
        .map_err(|e| AdmissionError::MalformedEnvelope(e.to_string()))?;

    // Step 3: namespace check.
    if body.header.namespace != runtime_namespace {
        return Err(AdmissionError::IncompatibleHeader);
    }

    // Step 4: storage committee membership for every storage signature. The
    // signatures themselves are over the step-6 receipt body, not the
    // dispatch envelope, so only membership is checked here.
    snapshot.verify_committee_membership(CommitteeKind::Storage, &signed.storage_signatures)?;

    // Step 5: replication floor.
    if signed.storage_signatures.len() < min_write_replication {
        return Err(AdmissionError::ReplicationFloor {
            have: signed.storage_signatures.len(),
            need: min_write_replication,
        });
    }

    // Step 6: receipt signature, many-to-one against the same canonical body.
    let receipt_body = ReceiptBody::new(body.header.namespace, body.header.round + 1, vec![body.io_root]);
    let receipt_bytes = {
        let mut buf = Vec::new();
        ciborium::into_writer(&receipt_body, &mut buf)
            .map_err(|e| AdmissionError::MalformedEnvelope(e.to_string()))?;
        buf
    };
    snapshot.verify_committee_signatures(CommitteeKind::Storage, &receipt_bytes, &signed.storage_signatures)?;

    // Step 7: fetch inputs.
    let root =
        InputBatchRoot { namespace: body.header.namespace, version: body.header.round + 1, hash: body.io_root };
    let batch = storage
        .get_input_batch(root)
        .await
        .map_err(|e| AdmissionError::StorageFailed(e.to_string()))?;
    if batch.is_empty() {
        return Err(AdmissionError::StorageFailed("input batch is empty".into()));
    }

    Ok(AdmittedDispatch {
        committee_id: body.committee_id,
        io_root: body.io_root,
        header: body.header.clone(),
        batch,
        txn_sched_sig: signed.signature,
        input_storage_sigs: signed.storage_signatures.clone(),
    })
}
