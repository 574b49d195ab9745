// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime RPC request/response bodies (§6).

use crate::commitment::ComputedBatch;
use executor_core::{BlockHeader, Hash, RawBatch};
use serde::{Deserialize, Serialize};

/// Information the host passes to the runtime during the initial handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitHostRequest {
    pub bundle_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitHostResponse {
    pub version: String,
}

/// Request to execute a transaction batch inside the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeExecuteTxBatchRequest {
    pub io_root: Hash,
    pub inputs: RawBatch,
    pub block: BlockHeader,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeExecuteTxBatchResponse {
    pub batch: ComputedBatch,
}

/// Interrupt a batch currently executing inside the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeAbortRequest {
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeAbortResponse {
    pub ok: bool,
}

/// Every request/response body the runtime protocol carries, tagged so a
/// single correlation map can demultiplex any of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Body {
    InitHostRequest(InitHostRequest),
    InitHostResponse(InitHostResponse),
    ExecuteTxBatchRequest(RuntimeExecuteTxBatchRequest),
    ExecuteTxBatchResponse(RuntimeExecuteTxBatchResponse),
    AbortRequest(RuntimeAbortRequest),
    AbortResponse(RuntimeAbortResponse),
    /// Carries a runtime-side error back to the caller instead of a response body.
    Error(String),
}

/// The envelope written on the wire: a correlation id plus one tagged body.
/// Requests and responses share the same envelope type; the reader task
/// matches a response envelope's `id` back to the caller that sent the
/// request with that id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: u64,
    pub body: Body,
}
