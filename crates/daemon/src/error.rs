// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the admission and commitment pipelines (§7).

use executor_core::{CommitteeError, CoreError, CryptoError};
use thiserror::Error;

/// Errors from the batch admission pipeline (§4.6 steps 1–8). Each variant
/// is logged at `warn` and dropped by the caller; none of these are fatal.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("dispatch signature is not from a current transaction-scheduler committee member")]
    MsgFromNonTxnScheduler,
    #[error("failed to open the signed dispatch envelope: {0}")]
    MalformedEnvelope(String),
    #[error("header namespace does not match this runtime")]
    IncompatibleHeader,
    #[error("storage receipt failure: {0}")]
    InvalidReceipt(#[from] CommitteeError),
    #[error("storage replication floor not met: have {have}, need {need}")]
    ReplicationFloor { have: usize, need: usize },
    #[error("receipt signature verification failed: {0}")]
    ReceiptVerification(#[from] CryptoError),
    #[error("failed to fetch batch inputs from storage: {0}")]
    StorageFailed(String),
    #[error("node is not in a state that accepts a new dispatch")]
    IncorrectState,
    #[error("node is not an executor committee member")]
    IncorrectRole,
}

impl From<CoreError> for AdmissionError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Committee(c) => AdmissionError::InvalidReceipt(c),
            CoreError::Crypto(c) => AdmissionError::ReceiptVerification(c),
        }
    }
}

/// Errors from the commitment pipeline (§4.7). `StorageFailed` aborts the
/// batch; the round finalizes naturally on the next block.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("runtime call failed: {0}")]
    Runtime(String),
    #[error("failed to apply write logs to storage: {0}")]
    StorageFailed(String),
    #[error("storage receipt verification failed: {0}")]
    ReceiptVerification(#[from] CryptoError),
    #[error("commitment signing failed: {0}")]
    Signing(String),
}
