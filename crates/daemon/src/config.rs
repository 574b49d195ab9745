// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node configuration, loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("EXECUTOR_IDENTITY_KEY must point to an existing 32-byte seed file")]
    MissingIdentityKey,
    #[error("EXECUTOR_RUNTIME_BINARY must point to the runtime bundle's entrypoint")]
    MissingRuntimeBinary,
}

/// Node-wide configuration. Loaded once at startup; the fault-detector
/// threshold and sandbox mode are the only fields read after that (both are
/// plain `Copy` values, so no locking is needed to read them).
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the node's ed25519 identity seed.
    pub identity_key_path: PathBuf,
    /// Path to the sandboxed runtime's entrypoint binary.
    pub runtime_binary: PathBuf,
    /// Bundle version the runtime must report during the wire handshake.
    pub bundle_version: String,
    /// Whether the runtime process runs inside a `bwrap` namespace.
    pub sandboxed: bool,
    /// Wall-clock deadline after which a `ProcessingBatch` with no
    /// discrepancy resolution triggers the fault detector (§4.7, §9).
    pub fault_detector_timeout: Duration,
    /// Capacity of the bounded control channel into the sandboxed runtime
    /// (§5 backpressure).
    pub control_channel_capacity: usize,
}

impl Config {
    /// Load configuration for this node from its environment.
    ///
    /// Mirrors the `EXECUTOR_` / `XDG`-style environment variable
    /// convention used throughout this workspace's daemon configuration.
    pub fn load() -> Result<Self, ConfigError> {
        let identity_key_path = std::env::var("EXECUTOR_IDENTITY_KEY")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingIdentityKey)?;
        let runtime_binary = std::env::var("EXECUTOR_RUNTIME_BINARY")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingRuntimeBinary)?;
        let bundle_version =
            std::env::var("EXECUTOR_BUNDLE_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
        let sandboxed = std::env::var("EXECUTOR_UNSANDBOXED").is_err();
        let fault_detector_timeout = std::env::var("EXECUTOR_FAULT_DETECTOR_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(10));
        let control_channel_capacity = 16;

        Ok(Self {
            identity_key_path,
            runtime_binary,
            bundle_version,
            sandboxed,
            fault_detector_timeout,
            control_channel_capacity,
        })
    }
}
