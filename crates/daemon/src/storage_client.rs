// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The storage backend contract (§6). Out of scope per spec.md §1; modeled
//! as a trait so production code depends on an interface, not a concrete
//! LevelDB-backed implementation.

use async_trait::async_trait;
use executor_core::{Hash, Namespace, RawBatch};
use executor_wire::{ApplyOp, Receipt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage apply_batch failed: {0}")]
    Apply(String),
    #[error("storage get_input_batch failed: {0}")]
    GetInputBatch(String),
}

/// A request to apply a batch of root updates for one destination round.
pub struct ApplyBatchRequest {
    pub namespace: Namespace,
    pub dst_round: u64,
    pub ops: Vec<ApplyOp>,
}

/// A request to fetch a raw batch by its content root.
pub struct InputBatchRoot {
    pub namespace: Namespace,
    pub version: u64,
    pub hash: Hash,
}

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn apply_batch(&self, request: ApplyBatchRequest) -> Result<Vec<Receipt>, StorageError>;
    async fn get_input_batch(&self, root: InputBatchRoot) -> Result<RawBatch, StorageError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// An in-memory storage fake: `get_input_batch` serves from a map
    /// pre-populated by the test; `apply_batch` records calls and returns a
    /// receipt for each op signed by a caller-supplied signer.
    pub struct FakeStorageClient {
        inputs: Mutex<HashMap<Hash, RawBatch>>,
        signer: Box<dyn executor_core::Signer>,
        applied: Mutex<Vec<ApplyBatchRequest>>,
    }

    impl FakeStorageClient {
        pub fn new(signer: Box<dyn executor_core::Signer>) -> Self {
            Self { inputs: Mutex::new(HashMap::new()), signer, applied: Mutex::new(Vec::new()) }
        }

        pub fn insert_input(&self, hash: Hash, batch: RawBatch) {
            self.inputs.lock().insert(hash, batch);
        }

        pub fn applied_requests(&self) -> usize {
            self.applied.lock().len()
        }
    }

    #[async_trait]
    impl StorageClient for FakeStorageClient {
        async fn apply_batch(&self, request: ApplyBatchRequest) -> Result<Vec<Receipt>, StorageError> {
            let roots = request.ops.iter().map(|op| op.dst_root).collect();
            let body = executor_wire::ReceiptBody::new(request.namespace, request.dst_round, roots);
            let mut buf = Vec::new();
            ciborium::into_writer(&body, &mut buf).map_err(|e| StorageError::Apply(e.to_string()))?;
            let signature = self.signer.sign(&buf);
            let receipt = Receipt { body, signer: self.signer.public_key(), signature };
            self.applied.lock().push(request);
            Ok(vec![receipt])
        }

        async fn get_input_batch(&self, root: InputBatchRoot) -> Result<RawBatch, StorageError> {
            self.inputs
                .lock()
                .get(&root.hash)
                .cloned()
                .ok_or_else(|| StorageError::GetInputBatch("no such input root".into()))
        }
    }
}
