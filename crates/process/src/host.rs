// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandboxed runtime process lifecycle: spawn, kill, wait.

use crate::sandbox::{SandboxConfig, SandboxMode};
use std::collections::HashMap;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to spawn runtime process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to kill runtime process: {0}")]
    Kill(#[source] std::io::Error),
    #[error("failed to wait on runtime process: {0}")]
    Wait(#[source] std::io::Error),
}

/// An owned handle to one spawned runtime process. `stdout`/`stderr` are
/// piped and forwarded into `tracing` line by line (§6).
pub struct ProcessHost {
    child: Child,
    runtime_label: String,
}

impl ProcessHost {
    /// Spawn the runtime according to `config`, wiring `worker_host` into
    /// its environment as `OASIS_WORKER_HOST`.
    pub fn spawn(
        config: &SandboxConfig,
        runtime_label: String,
        extra_env: &HashMap<String, String>,
    ) -> Result<Self, HostError> {
        if config.mode == SandboxMode::Unsandboxed {
            tracing::warn!(runtime = %runtime_label, sandboxed = false, "running runtime unsandboxed");
        }
        let launch = config.launch();

        let mut command = Command::new(&launch.program);
        command
            .args(&launch.args)
            .env("OASIS_WORKER_HOST", &launch.worker_host)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in extra_env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(HostError::Spawn)?;
        spawn_log_forwarder(child.stdout.take(), runtime_label.clone(), false);
        spawn_log_forwarder(child.stderr.take(), runtime_label.clone(), true);

        Ok(Self { child, runtime_label })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn runtime_label(&self) -> &str {
        &self.runtime_label
    }

    /// Send SIGKILL (via tokio's platform kill) and reap the process.
    pub async fn kill(&mut self) -> Result<(), HostError> {
        if self.child.id().is_some() {
            self.child.kill().await.map_err(HostError::Kill)?;
        }
        Ok(())
    }

    /// Wait for the process to exit on its own, returning the exit code if
    /// the OS reports one.
    pub async fn wait(&mut self) -> Result<Option<i32>, HostError> {
        let status = self.child.wait().await.map_err(HostError::Wait)?;
        Ok(status.code())
    }
}

fn spawn_log_forwarder<R>(pipe: Option<R>, runtime_label: String, is_stderr: bool)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let Some(pipe) = pipe else { return };
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if is_stderr {
                        tracing::warn!(runtime = %runtime_label, "{}", line);
                    } else {
                        tracing::info!(runtime = %runtime_label, "{}", line);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(runtime = %runtime_label, error = %e, "error reading runtime output");
                    break;
                }
            }
        }
    });
}
