// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! executor-process: the sandbox provisioner (§4.3) — spawning, supervising,
//! and restarting the sandboxed runtime process that backs one committee
//! node's runtime slot.

pub mod backoff;
pub mod events;
pub mod host;
pub mod sandbox;
pub mod supervisor;

pub use backoff::Backoff;
pub use events::{RuntimeEvent, RuntimeEventBus};
pub use host::{HostError, ProcessHost};
pub use sandbox::{SandboxConfig, SandboxMode};
pub use supervisor::{
    ControlRequest, HostInitResult, HostInitializer, NoopHostInitializer, SandboxProvisioner,
    SupervisorError,
};
