// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The sandbox provisioner's supervisor loop (§4.3).
//!
//! One `SandboxProvisioner` owns exactly one runtime process across its
//! entire respawn history. `run` is the supervisor task body; everything
//! else is the public handle callers use to control it and read its
//! read-mostly state.

use crate::backoff::Backoff;
use crate::events::{RuntimeEvent, RuntimeEventBus};
use crate::host::{HostError, ProcessHost};
use crate::sandbox::SandboxConfig;
use async_trait::async_trait;
use executor_wire::{
    Body, ComputedBatch, ConnectionError, FramedConnection, RuntimeAbortRequest, RuntimeAbortResponse,
    RuntimeExecuteTxBatchRequest, RuntimeExecuteTxBatchResponse,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio_util::sync::CancellationToken;

type RuntimeConnection = FramedConnection<tokio::io::WriteHalf<UnixStream>>;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("runtime process error: {0}")]
    Host(#[from] HostError),
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("timed out waiting for the runtime to connect")]
    AcceptTimeout,
    #[error("runtime terminated while waiting for it to connect")]
    TerminatedBeforeConnect,
    #[error("runtime bundle version mismatch: wanted {wanted}, got {got}")]
    VersionMismatch { wanted: String, got: String },
    #[error("host initializer failed: {0}")]
    HostInit(String),
    #[error("failed to bind provisioning socket: {0}")]
    Bind(#[source] std::io::Error),
    #[error("failed to create provisioning directory: {0}")]
    TempDir(#[source] std::io::Error),
    #[error("no runtime process is currently connected")]
    NotConnected,
    #[error("runtime response did not match the expected body type")]
    UnexpectedBody,
}

/// The result of the user-supplied attestation/initialization step (§4.3
/// step 6), reported back to the supervisor as a `Started` event.
#[derive(Debug, Clone)]
pub struct HostInitResult {
    pub version: String,
    pub capability_tee: Option<String>,
}

/// User-supplied hook invoked once per successful start, after the wire
/// handshake completes and before the process is committed as ready.
/// Typically performs remote attestation.
#[async_trait]
pub trait HostInitializer: Send + Sync {
    async fn initialize(
        &self,
        connection: &RuntimeConnection,
        timeout: Duration,
    ) -> Result<HostInitResult, SupervisorError>;
}

/// A no-op initializer for runtimes that skip attestation; used in tests
/// and by callers that don't need the extended-init step.
pub struct NoopHostInitializer {
    pub version: String,
}

#[async_trait]
impl HostInitializer for NoopHostInitializer {
    async fn initialize(
        &self,
        _connection: &RuntimeConnection,
        _timeout: Duration,
    ) -> Result<HostInitResult, SupervisorError> {
        Ok(HostInitResult { version: self.version.clone(), capability_tee: None })
    }
}

/// Requests the outer node issues to the running supervisor loop.
pub enum ControlRequest {
    Abort { force: bool, respond: oneshot::Sender<Result<(), SupervisorError>> },
}

struct ActiveRuntime {
    connection: Arc<RuntimeConnection>,
    version: String,
    capability_tee: Option<String>,
}

/// Read-mostly state shared with accessors that must not block the
/// supervisor loop (`GetActiveVersion`, `GetCapabilityTEE`).
#[derive(Default)]
struct SandboxState {
    active: Option<ActiveRuntime>,
}

/// Handle to a running supervisor task: submits control requests and reads
/// read-mostly sandbox state without taking the `CrossNode` lock.
pub struct SandboxProvisioner {
    state: Arc<RwLock<SandboxState>>,
    control_tx: mpsc::Sender<ControlRequest>,
    events: RuntimeEventBus,
    stop: CancellationToken,
}

impl SandboxProvisioner {
    pub fn get_active_version(&self) -> Option<String> {
        self.state.read().active.as_ref().map(|a| a.version.clone())
    }

    pub fn get_capability_tee(&self) -> Option<String> {
        self.state.read().active.as_ref().and_then(|a| a.capability_tee.clone())
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RuntimeEvent> {
        self.events.subscribe()
    }

    /// Invoke `RuntimeExecuteTxBatchRequest` against the currently active
    /// runtime connection, if any. Callers drive cancellation themselves
    /// (§5: a round's processing token), since this call may suspend for the
    /// full runtime-processing time.
    pub async fn execute_batch(
        &self,
        request: RuntimeExecuteTxBatchRequest,
    ) -> Result<ComputedBatch, SupervisorError> {
        let connection = self
            .state
            .read()
            .active
            .as_ref()
            .map(|a| Arc::clone(&a.connection))
            .ok_or(SupervisorError::NotConnected)?;
        let response = connection.call(Body::ExecuteTxBatchRequest(request)).await?;
        match response {
            Body::ExecuteTxBatchResponse(RuntimeExecuteTxBatchResponse { batch }) => Ok(batch),
            Body::Error(message) => Err(SupervisorError::HostInit(message)),
            _ => Err(SupervisorError::UnexpectedBody),
        }
    }

    /// Send an `abort(force)` control request (§4.3 step 5).
    pub async fn abort(&self, force: bool) -> Result<(), SupervisorError> {
        let (respond, rx) = oneshot::channel();
        self.control_tx
            .send(ControlRequest::Abort { force, respond })
            .await
            .map_err(|_| SupervisorError::Connection(ConnectionError::Closed))?;
        rx.await.map_err(|_| SupervisorError::Connection(ConnectionError::Closed))?
    }

    /// Stop the supervisor task, killing its process (§4.3 step 6).
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Spawn the supervisor task and return the caller-facing handle.
    pub fn start(
        config: SandboxConfig,
        runtime_label: String,
        bundle_version: String,
        host_initializer: Arc<dyn HostInitializer>,
    ) -> Self {
        let state = Arc::new(RwLock::new(SandboxState::default()));
        let (control_tx, control_rx) = mpsc::channel(16);
        let events = RuntimeEventBus::new(16);
        let stop = CancellationToken::new();

        let loop_state = Arc::clone(&state);
        let loop_events = events.clone();
        let loop_stop = stop.clone();
        tokio::spawn(run(
            config,
            runtime_label,
            bundle_version,
            host_initializer,
            loop_state,
            control_rx,
            loop_events,
            loop_stop,
        ));

        Self { state, control_tx, events, stop }
    }
}

async fn run(
    config: SandboxConfig,
    runtime_label: String,
    bundle_version: String,
    host_initializer: Arc<dyn HostInitializer>,
    state: Arc<RwLock<SandboxState>>,
    mut control_rx: mpsc::Receiver<ControlRequest>,
    events: RuntimeEventBus,
    stop: CancellationToken,
) {
    let backoff_start = Duration::from_secs(1);
    let backoff_max = Duration::from_secs(30);
    let reset_after = Duration::from_secs(15 * 60);
    let mut backoff = Backoff::new(backoff_start, backoff_max);

    // Synthetic first tick: fires immediately so the first start attempt
    // doesn't wait on the backoff ticker (§4.3 step 1).
    let first_tick = Arc::new(Notify::new());
    first_tick.notify_one();

    let mut process: Option<ProcessHost> = None;

    loop {
        let mut host = match process.take() {
            Some(host) => host,
            None => {
                first_tick.notified().await;
                match start_process(&config, &runtime_label, &bundle_version, host_initializer.as_ref()).await
                {
                    Ok((host, active)) => {
                        state.write().active = Some(active.clone());
                        events.publish(RuntimeEvent::Started {
                            version: active.version,
                            capability_tee: active.capability_tee,
                        });
                        backoff.reset();
                        host
                    }
                    Err(e) => {
                        tracing::warn!(runtime = %runtime_label, error = %e, "failed to start runtime");
                        events.publish(RuntimeEvent::FailedToStart { err: e.to_string() });
                        let delay = backoff.next_delay();
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = stop.cancelled() => return,
                        }
                        first_tick.notify_one();
                        continue;
                    }
                }
            }
        };

        tokio::select! {
            _ = stop.cancelled() => {
                let _ = host.kill().await;
                let _ = host.wait().await;
                state.write().active = None;
                events.publish(RuntimeEvent::Stopped);
                return;
            }
            _ = tokio::time::sleep(reset_after) => {
                backoff.reset();
                process = Some(host);
            }
            exit = host.wait() => {
                log_exit(&runtime_label, exit);
                state.write().active = None;
                events.publish(RuntimeEvent::Stopped);
                first_tick.notify_one();
            }
            Some(request) = control_rx.recv() => {
                match request {
                    ControlRequest::Abort { force, respond } => {
                        let connection = state.read().active.as_ref().map(|a| Arc::clone(&a.connection));
                        let outcome = handle_abort(&mut host, connection, force).await;
                        let should_clear = matches!(outcome, Ok(true)) || outcome.is_err();
                        let _ = respond.send(outcome.map(|_| ()));
                        if should_clear {
                            state.write().active = None;
                            events.publish(RuntimeEvent::Stopped);
                            first_tick.notify_one();
                        } else {
                            process = Some(host);
                        }
                    }
                }
            }
        }
    }
}

impl Clone for ActiveRuntime {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            version: self.version.clone(),
            capability_tee: self.capability_tee.clone(),
        }
    }
}

async fn handle_abort(
    host: &mut ProcessHost,
    connection: Option<Arc<RuntimeConnection>>,
    force: bool,
) -> Result<bool, SupervisorError> {
    if !force {
        if let Some(connection) = connection {
            let reply = tokio::time::timeout(
                Duration::from_secs(1),
                connection.call(Body::AbortRequest(RuntimeAbortRequest { force })),
            )
            .await;
            if let Ok(Ok(Body::AbortResponse(RuntimeAbortResponse { ok: true }))) = reply {
                return Ok(false);
            }
        }
    }
    let _ = host.kill().await;
    let _ = host.wait().await;
    Ok(true)
}

fn log_exit(runtime_label: &str, exit: Result<Option<i32>, HostError>) {
    match exit {
        Ok(code) => tracing::warn!(runtime = %runtime_label, exit_code = ?code, "runtime process exited"),
        Err(e) => tracing::error!(runtime = %runtime_label, error = %e, "failed to wait on runtime process"),
    }
}

/// Start-process procedure (§4.3 "Start-process procedure", steps 1–8).
async fn start_process(
    config: &SandboxConfig,
    runtime_label: &str,
    bundle_version: &str,
    host_initializer: &dyn HostInitializer,
) -> Result<(ProcessHost, ActiveRuntime), SupervisorError> {
    let temp_dir = tempfile_dir()?;
    let socket_path = temp_dir.path().join("host.sock");
    let listener = UnixListener::bind(&socket_path).map_err(SupervisorError::Bind)?;

    let mut launch_config = config.clone();
    launch_config.host_socket_path = socket_path.clone();

    let mut host = ProcessHost::spawn(&launch_config, runtime_label.to_string(), &HashMap::new())?;

    let accept_result = tokio::select! {
        accepted = tokio::time::timeout(Duration::from_secs(5), listener.accept()) => {
            match accepted {
                Ok(Ok((stream, _))) => Ok(stream),
                Ok(Err(e)) => Err(SupervisorError::Bind(e)),
                Err(_) => Err(SupervisorError::AcceptTimeout),
            }
        }
        exit = host.wait() => {
            let _ = exit;
            Err(SupervisorError::TerminatedBeforeConnect)
        }
    };

    let stream = match accept_result {
        Ok(stream) => stream,
        Err(e) => {
            let _ = host.kill().await;
            let _ = host.wait().await;
            return Err(e);
        }
    };

    match finish_start(stream, bundle_version, host_initializer).await {
        Ok(active) => Ok((host, active)),
        Err(e) => {
            let _ = host.kill().await;
            let _ = host.wait().await;
            Err(e)
        }
    }
}

async fn finish_start(
    stream: UnixStream,
    bundle_version: &str,
    host_initializer: &dyn HostInitializer,
) -> Result<ActiveRuntime, SupervisorError> {
    let (connection, runtime_version) =
        FramedConnection::connect(stream, bundle_version.to_string()).await?;
    if runtime_version != bundle_version {
        return Err(SupervisorError::VersionMismatch {
            wanted: bundle_version.to_string(),
            got: runtime_version,
        });
    }

    let connection = Arc::new(connection);
    let init = host_initializer.initialize(&connection, Duration::from_secs(120)).await?;

    Ok(ActiveRuntime { connection, version: init.version, capability_tee: init.capability_tee })
}

fn tempfile_dir() -> Result<tempfile::TempDir, SupervisorError> {
    tempfile::tempdir().map_err(SupervisorError::TempDir)
}
