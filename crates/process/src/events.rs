// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pub/sub events emitted by the sandbox provisioner (§6).

use tokio::sync::broadcast;

/// A lifecycle event for one sandboxed runtime, published to every
/// subscriber. Slow subscribers may lose events once the channel's finite
/// buffer fills (§5 backpressure).
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    Started { version: String, capability_tee: Option<String> },
    Updated { capability_tee: Option<String> },
    FailedToStart { err: String },
    Stopped,
}

/// Thin wrapper around a broadcast channel so callers don't need to know
/// the channel capacity used for runtime events.
#[derive(Clone)]
pub struct RuntimeEventBus {
    sender: broadcast::Sender<RuntimeEvent>,
}

impl RuntimeEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; a `SendError` just means there are no current
    /// subscribers, which is not itself a failure.
    pub fn publish(&self, event: RuntimeEvent) {
        let _ = self.sender.send(event);
    }
}
