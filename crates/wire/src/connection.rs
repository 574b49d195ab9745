// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The framed request/response connection to a sandboxed runtime process
//! (§4.2).
//!
//! One reader task owns the socket's read half and fans incoming response
//! frames out to the caller that is waiting on the matching correlation id.
//! Callers never read the socket directly; `call` is safe to invoke
//! concurrently from multiple tasks.

use crate::framing::{read_frame, write_frame, FramingError};
use crate::messages::{Body, Frame, InitHostRequest, InitHostResponse};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    #[error("runtime returned an error: {0}")]
    Runtime(String),
    #[error("runtime response did not match the expected body type")]
    UnexpectedBody,
    #[error("connection is closed")]
    Closed,
    #[error("timed out waiting for the runtime")]
    Timeout,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Body, ConnectionError>>>>>;

/// A framed connection to one sandboxed runtime process.
pub struct FramedConnection<W> {
    writer: AsyncMutex<W>,
    next_id: AtomicU64,
    pending: PendingMap,
    reader_task: JoinHandle<()>,
}

impl<S> FramedConnection<WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Split `stream` into read/write halves, spawn the reader task, and
    /// perform the `InitHost` handshake with a one second timeout. Returns
    /// the connection together with the runtime's reported version, so the
    /// caller can apply its own version-match policy without a second
    /// round-trip.
    pub async fn connect(stream: S, bundle_version: String) -> Result<(Self, String), ConnectionError> {
        let (read_half, write_half) = tokio::io::split(stream);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader_task = spawn_reader(read_half, Arc::clone(&pending));

        let connection = Self {
            writer: AsyncMutex::new(write_half),
            next_id: AtomicU64::new(1),
            pending,
            reader_task,
        };

        let response = tokio::time::timeout(
            Duration::from_secs(1),
            connection.call(Body::InitHostRequest(InitHostRequest { bundle_version })),
        )
        .await
        .map_err(|_| ConnectionError::Timeout)??;

        match response {
            Body::InitHostResponse(InitHostResponse { version }) => Ok((connection, version)),
            Body::Error(message) => Err(ConnectionError::Runtime(message)),
            _ => Err(ConnectionError::UnexpectedBody),
        }
    }
}

impl<W> FramedConnection<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Send `body` and await the matching response, demultiplexed by the
    /// reader task on this connection's correlation id.
    pub async fn call(&self, body: Body) -> Result<Body, ConnectionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let frame = Frame { id, body };
        let write_result = {
            let mut writer = self.writer.lock().await;
            write_frame(&mut *writer, &frame).await
        };
        if let Err(e) = write_result {
            self.pending.lock().remove(&id);
            return Err(e.into());
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Closed),
        }
    }

    /// Abort the reader task and drop the write half. Any calls still
    /// waiting on a response are failed with `ConnectionError::Closed`.
    pub async fn close(self) {
        self.reader_task.abort();
        fail_all_pending(&self.pending);
    }
}

fn spawn_reader<R>(mut reader: ReadHalf<R>, pending: PendingMap) -> JoinHandle<()>
where
    R: AsyncRead + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let frame: Result<Frame, FramingError> = read_frame(&mut reader).await;
            match frame {
                Ok(Frame { id, body }) => {
                    let sender = pending.lock().remove(&id);
                    if let Some(sender) = sender {
                        let result = match body {
                            Body::Error(message) => Err(ConnectionError::Runtime(message)),
                            other => Ok(other),
                        };
                        let _ = sender.send(result);
                    }
                }
                Err(FramingError::ConnectionClosed) => {
                    tracing::info!("runtime connection closed by peer");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "runtime connection read failed");
                    break;
                }
            }
        }
        fail_all_pending(&pending);
    })
}

fn fail_all_pending(pending: &PendingMap) {
    let mut map = pending.lock();
    for (_, sender) in map.drain() {
        let _ = sender.send(Err(ConnectionError::Closed));
    }
}

impl<W> Drop for FramedConnection<W> {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{RuntimeAbortRequest, RuntimeAbortResponse};

    /// Spawn a fake runtime on the far end of `server`: answers the
    /// handshake, then echoes back an `AbortResponse` for every
    /// `AbortRequest` it receives.
    fn spawn_fake_runtime(mut server: tokio::io::DuplexStream) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let frame: Result<Frame, FramingError> = read_frame(&mut server).await;
                let Ok(Frame { id, body }) = frame else { break };
                let response_body = match body {
                    Body::InitHostRequest(_) => {
                        Body::InitHostResponse(InitHostResponse { version: "1.0.0".into() })
                    }
                    Body::AbortRequest(_) => Body::AbortResponse(RuntimeAbortResponse { ok: true }),
                    _ => Body::Error("unexpected request".into()),
                };
                if write_frame(&mut server, &Frame { id, body: response_body }).await.is_err() {
                    break;
                }
            }
        })
    }

    #[tokio::test]
    async fn connect_performs_handshake_then_calls_succeed() {
        let (client, server) = tokio::io::duplex(8192);
        let _runtime = spawn_fake_runtime(server);

        let (connection, version) = FramedConnection::connect(client, "bundle-v1".into())
            .await
            .expect("handshake must succeed");
        assert_eq!(version, "1.0.0");

        let response = connection
            .call(Body::AbortRequest(RuntimeAbortRequest { force: false }))
            .await
            .expect("call must succeed");
        assert!(matches!(response, Body::AbortResponse(RuntimeAbortResponse { ok: true })));
    }

    #[tokio::test]
    async fn concurrent_calls_are_demultiplexed_independently() {
        let (client, server) = tokio::io::duplex(8192);
        let _runtime = spawn_fake_runtime(server);

        let (connection, _version) = FramedConnection::connect(client, "bundle-v1".into())
            .await
            .expect("handshake must succeed");
        let connection = Arc::new(connection);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let connection = Arc::clone(&connection);
            handles.push(tokio::spawn(async move {
                connection
                    .call(Body::AbortRequest(RuntimeAbortRequest { force: false }))
                    .await
            }));
        }
        for handle in handles {
            let response = handle.await.expect("task must not panic").expect("call must succeed");
            assert!(matches!(response, Body::AbortResponse(RuntimeAbortResponse { ok: true })));
        }
    }

    #[tokio::test]
    async fn calls_fail_once_runtime_hangs_up() {
        let (client, server) = tokio::io::duplex(8192);
        let runtime = spawn_fake_runtime(server);

        let (connection, _version) = FramedConnection::connect(client, "bundle-v1".into())
            .await
            .expect("handshake must succeed");

        runtime.abort();
        // Give the reader task a chance to observe the closed peer.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = connection.call(Body::AbortRequest(RuntimeAbortRequest { force: false })).await;
        assert!(matches!(result, Err(ConnectionError::Closed) | Err(ConnectionError::Framing(_))));
    }
}
