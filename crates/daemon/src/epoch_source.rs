// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The consensus/registry backend contract (§6): out of scope per
//! spec.md §1. Production code receives `EpochSnapshot`s over a channel;
//! this trait exists so tests can drive epoch transitions deterministically.

use async_trait::async_trait;
use executor_core::EpochSnapshot;

#[async_trait]
pub trait EpochSource: Send + Sync {
    /// Block until the next epoch transition and return its snapshot.
    async fn next_epoch(&mut self) -> EpochSnapshot;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use tokio::sync::mpsc;

    /// Drives epoch transitions from a channel a test holds the sender to.
    pub struct ChannelEpochSource {
        rx: mpsc::Receiver<EpochSnapshot>,
    }

    impl ChannelEpochSource {
        pub fn new() -> (mpsc::Sender<EpochSnapshot>, Self) {
            let (tx, rx) = mpsc::channel(4);
            (tx, Self { rx })
        }
    }

    #[async_trait]
    impl EpochSource for ChannelEpochSource {
        async fn next_epoch(&mut self) -> EpochSnapshot {
            match self.rx.recv().await {
                Some(snapshot) => snapshot,
                None => std::future::pending().await,
            }
        }
    }
}
