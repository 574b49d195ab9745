// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage apply-ops, receipts, and the two commitment types the node signs
//! and publishes (§3, §4.7, §6).

use executor_core::{verify, BlockHeader, CryptoError, Hash, Namespace, PublicKey, Signature, Signer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommitmentError {
    #[error("failed to encode commitment body for signing: {0}")]
    Encode(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// A single root update to apply to a storage node, keyed by its source
/// round and root so a storage node can reject an out-of-order apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOp {
    pub src_round: u64,
    pub src_root: Hash,
    pub dst_root: Hash,
    pub write_log: Vec<(Vec<u8>, Vec<u8>)>,
}

/// The body a storage node signs when it attests to a batch of apply ops,
/// in the fixed order the pipeline constructs them: I/O root then state
/// root (§4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptBody {
    pub version: u16,
    pub namespace: Namespace,
    pub round: u64,
    pub roots: Vec<Hash>,
}

impl ReceiptBody {
    pub const VERSION: u16 = 1;

    pub fn new(namespace: Namespace, round: u64, roots: Vec<Hash>) -> Self {
        Self { version: Self::VERSION, namespace, round, roots }
    }

    fn canonical_bytes(&self) -> Result<Vec<u8>, CommitmentError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CommitmentError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

/// A storage node's signed attestation that it applied an `ApplyOp` and now
/// holds the resulting root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub body: ReceiptBody,
    pub signer: PublicKey,
    pub signature: Signature,
}

impl Receipt {
    /// Verify the embedded signature covers `body` under its canonical
    /// encoding, returning the body on success.
    pub fn verify(&self) -> Result<&ReceiptBody, CommitmentError> {
        let message = self.body.canonical_bytes()?;
        verify(&self.signer, &message, &self.signature)?;
        Ok(&self.body)
    }
}

/// The body a transaction-scheduler dispatches to the committee: a batch
/// dispatch for a given round, signed by the dispatcher (§3 "Signed
/// dispatch"). Carries the full header it was dispatched against so the
/// state machine can compare it to the node's current block (§4.6 step 8),
/// and the executor committee it is addressed to so a node can tell a
/// dispatch meant for a different committee apart from its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxnSchedulerBatchDispatch {
    pub committee_id: Hash,
    pub namespace: Namespace,
    pub io_root: Hash,
    pub header: BlockHeader,
    pub timeout_at: u64,
}

impl TxnSchedulerBatchDispatch {
    fn canonical_bytes(&self) -> Result<Vec<u8>, CommitmentError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CommitmentError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

/// A dispatcher-signed envelope around a scheduler batch dispatch, as
/// received over the consensus layer (§4.6 step 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedDispatch {
    pub body: TxnSchedulerBatchDispatch,
    pub dispatcher: PublicKey,
    pub signature: Signature,
    /// Storage-node receipts proving the batch's inputs are durable,
    /// collected by the scheduler before dispatch.
    pub storage_signatures: Vec<(PublicKey, Signature)>,
}

impl SignedDispatch {
    pub fn verify_dispatcher_signature(&self) -> Result<&TxnSchedulerBatchDispatch, CommitmentError> {
        let message = self.body.canonical_bytes()?;
        verify(&self.dispatcher, &message, &self.signature)?;
        Ok(&self.body)
    }
}

/// The runtime's output for an executed batch: the write logs the runtime
/// produced plus the header it proposes and its own (RAK) signature over
/// that header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedBatch {
    pub header: BlockHeader,
    pub io_write_log: Vec<(Vec<u8>, Vec<u8>)>,
    pub state_write_log: Vec<(Vec<u8>, Vec<u8>)>,
    pub rak_signature: Signature,
}

/// The commitment an executor worker signs and publishes to the merge
/// committee once storage has durably applied a computed batch (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorCommitment {
    pub committee_id: Hash,
    pub header: BlockHeader,
    pub rak_signature: Signature,
    pub txn_scheduler_signature: Signature,
    pub input_root: Hash,
    pub input_storage_signatures: Vec<(PublicKey, Signature)>,
    pub storage_signatures: Vec<(PublicKey, Signature)>,
    pub node: PublicKey,
    pub signature: Signature,
}

impl ExecutorCommitment {
    /// Build and sign a commitment over the fields that determine its
    /// identity; `signer` is the node's own identity key.
    pub fn sign(
        committee_id: Hash,
        header: BlockHeader,
        rak_signature: Signature,
        txn_scheduler_signature: Signature,
        input_root: Hash,
        input_storage_signatures: Vec<(PublicKey, Signature)>,
        storage_signatures: Vec<(PublicKey, Signature)>,
        signer: &dyn Signer,
    ) -> Result<Self, CommitmentError> {
        #[derive(Serialize)]
        struct Signed<'a> {
            committee_id: &'a Hash,
            header: &'a BlockHeader,
            rak_signature: &'a Signature,
            txn_scheduler_signature: &'a Signature,
            input_root: &'a Hash,
            input_storage_signatures: &'a [(PublicKey, Signature)],
        }
        let signed = Signed {
            committee_id: &committee_id,
            header: &header,
            rak_signature: &rak_signature,
            txn_scheduler_signature: &txn_scheduler_signature,
            input_root: &input_root,
            input_storage_signatures: &input_storage_signatures,
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&signed, &mut buf).map_err(|e| CommitmentError::Encode(e.to_string()))?;
        let signature = signer.sign(&buf);

        Ok(Self {
            committee_id,
            header,
            rak_signature,
            txn_scheduler_signature,
            input_root,
            input_storage_signatures,
            storage_signatures,
            node: signer.public_key(),
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use executor_core::IdentitySigner;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn signer() -> IdentitySigner {
        IdentitySigner::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    #[test]
    fn receipt_round_trips_through_verify() {
        let storage_node = signer();
        let body = ReceiptBody::new(Namespace::zero(), 1, vec![Hash::digest(b"root")]);
        let message = body.canonical_bytes().expect("encode must succeed");
        let signature = storage_node.sign(&message);
        let receipt = Receipt { body: body.clone(), signer: storage_node.public_key(), signature };
        assert_eq!(receipt.verify().expect("signature must verify"), &body);
    }

    #[test]
    fn receipt_rejects_tampered_body() {
        let storage_node = signer();
        let body = ReceiptBody::new(Namespace::zero(), 1, vec![Hash::digest(b"root")]);
        let message = body.canonical_bytes().expect("encode must succeed");
        let signature = storage_node.sign(&message);
        let mut tampered = body;
        tampered.round = 2;
        let receipt = Receipt { body: tampered, signer: storage_node.public_key(), signature };
        assert!(receipt.verify().is_err());
    }

    #[test]
    fn executor_commitment_signature_is_self_consistent() {
        let node = signer();
        let header = BlockHeader {
            namespace: Namespace::zero(),
            round: 1,
            io_root: Hash::digest(b"io"),
            state_root: Hash::digest(b"state"),
            previous_hash: Hash::zero(),
            encoded_hash: Hash::digest(b"encoded"),
            timestamp: 0,
            receipts_hash: Hash::zero(),
        };
        let commitment = ExecutorCommitment::sign(
            Hash::digest(b"committee"),
            header,
            Signature([1u8; 64]),
            Signature([2u8; 64]),
            Hash::digest(b"input"),
            vec![],
            vec![],
            &node,
        )
        .expect("signing must succeed");
        assert_eq!(commitment.node, node.public_key());
    }
}
