// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format: 4-byte length prefix (big-endian) + CBOR payload.
//!
//! Mirrors the length-prefix framing idiom used elsewhere in this workspace
//! for IPC (4-byte length prefix + JSON), swapping the payload codec for
//! CBOR to match the runtime's on-wire format.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Frames larger than this are rejected outright — a well-behaved runtime
/// never sends a single request/response this large; this is a backstop
/// against a malformed length prefix driving an unbounded allocation.
pub const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("frame of {0} bytes exceeds the {1} byte limit")]
    TooLarge(u32, u32),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cbor encode error: {0}")]
    Encode(String),
    #[error("cbor decode error: {0}")]
    Decode(String),
}

/// Encode `value` as a length-prefixed CBOR frame and write it to `writer`.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), FramingError>
where
    W: tokio::io::AsyncWrite + Unpin,
    T: Serialize,
{
    let mut payload = Vec::new();
    ciborium::into_writer(value, &mut payload).map_err(|e| FramingError::Encode(e.to_string()))?;
    let len: u32 = payload
        .len()
        .try_into()
        .map_err(|_| FramingError::TooLarge(u32::MAX, MAX_FRAME_BYTES))?;
    if len > MAX_FRAME_BYTES {
        return Err(FramingError::TooLarge(len, MAX_FRAME_BYTES));
    }
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed CBOR frame from `reader`.
///
/// Returns `Err(ConnectionClosed)` on a clean EOF at the length-prefix
/// boundary (the caller's reader task treats this as "runtime hung up").
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, FramingError>
where
    R: tokio::io::AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FramingError::ConnectionClosed)
        }
        Err(e) => return Err(FramingError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(FramingError::TooLarge(len, MAX_FRAME_BYTES));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    ciborium::from_reader(payload.as_slice()).map_err(|e| FramingError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Example {
        id: u64,
        text: String,
    }

    #[tokio::test]
    async fn round_trips_through_a_duplex_stream() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let value = Example { id: 7, text: "hello".into() };
        write_frame(&mut client, &value).await.expect("write must succeed");
        let decoded: Example = read_frame(&mut server).await.expect("read must succeed");
        assert_eq!(decoded, value);
    }

    #[tokio::test]
    async fn read_on_closed_stream_reports_connection_closed() {
        let (client, mut server) = tokio::io::duplex(4096);
        drop(client);
        let result: Result<Example, _> = read_frame(&mut server).await;
        assert!(matches!(result, Err(FramingError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected_before_allocating() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client.write_all(&(MAX_FRAME_BYTES + 1).to_be_bytes()).await.expect("write prefix");
        let result: Result<Example, _> = read_frame(&mut server).await;
        assert!(matches!(result, Err(FramingError::TooLarge(_, _))));
    }
}
