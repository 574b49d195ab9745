// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! executor-wire: the runtime wire protocol (§4.2, §6) — frame codec,
//! correlation, and the message/commitment types carried over it.

pub mod commitment;
pub mod connection;
pub mod framing;
pub mod messages;

pub use commitment::{
    ApplyOp, ComputedBatch, ExecutorCommitment, Receipt, ReceiptBody, SignedDispatch,
    TxnSchedulerBatchDispatch,
};
pub use connection::{ConnectionError, FramedConnection};
pub use messages::{
    Body, Frame, InitHostRequest, InitHostResponse, RuntimeAbortRequest, RuntimeAbortResponse,
    RuntimeExecuteTxBatchRequest, RuntimeExecuteTxBatchResponse,
};
