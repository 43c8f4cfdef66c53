//! Length-delimited message framing.
//!
//! Wire format: 4-byte big-endian length prefix followed by payload. Every
//! protocol message fits in a few dozen bytes, so the cap is small and an
//! oversized prefix is treated as a broken peer.

use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame payload size in bytes.
pub const MAX_FRAME_SIZE: usize = 1024;

/// Length of the frame header.
pub const HEADER_LEN: usize = 4;

/// Read one frame from an async reader.
///
/// Not cancel-safe: dropping the future mid-frame loses the bytes already
/// consumed. Drive it from a dedicated task when selecting over it.
///
/// # Errors
///
/// - `UnexpectedEof` if the stream ends inside a frame (or before one)
/// - `InvalidData` if the prefix exceeds [`MAX_FRAME_SIZE`]
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Bytes> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let len = u32::from_be_bytes(header) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes (max {})", len, MAX_FRAME_SIZE),
        ));
    }

    let mut payload = BytesMut::zeroed(len);
    reader.read_exact(&mut payload).await?;
    Ok(payload.freeze())
}

/// Write one frame and flush.
///
/// Header and payload go out in a single write so a concurrent reader never
/// observes a header without its payload buffered behind it.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame too large: {} bytes (max {})", payload.len(), MAX_FRAME_SIZE),
        ));
    }

    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);

    writer.write_all(&frame).await?;
    writer.flush().await
}
