//! Length-prefixed stream framing and little-endian field codecs
//!
//! Every message on a connection is `[u32 LE length][payload]`. Payloads are
//! either a JSON control message or a fixed-size block of `f64` fields.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::game::constants::net::MAX_MESSAGE_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Message too large: {0} bytes (max {1})")]
    MessageTooLarge(usize, usize),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn closed_on_eof(e: io::Error) -> FramingError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        FramingError::ConnectionClosed
    } else {
        FramingError::Io(e)
    }
}

/// Read one framed message
pub async fn read_message<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<u8>, FramingError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.map_err(closed_on_eof)?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(len, MAX_MESSAGE_SIZE));
    }

    let mut buf = vec![0u8; len];
    if len > 0 {
        stream.read_exact(&mut buf).await.map_err(closed_on_eof)?;
    }
    Ok(buf)
}

/// Write one framed message and flush
pub async fn write_message<W: AsyncWrite + Unpin>(
    stream: &mut W,
    data: &[u8],
) -> Result<(), FramingError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(data.len(), MAX_MESSAGE_SIZE));
    }

    stream.write_all(&(data.len() as u32).to_le_bytes()).await?;
    stream.write_all(data).await?;
    stream.flush().await?;

    Ok(())
}

/// Fixed-size payload writer
pub struct FrameBuilder<const N: usize> {
    buffer: [u8; N],
    position: usize,
}

impl<const N: usize> FrameBuilder<N> {
    pub fn new() -> Self {
        Self {
            buffer: [0u8; N],
            position: 0,
        }
    }

    /// Append an `f64` (little-endian). Writes past the end are ignored.
    pub fn write_f64(mut self, value: f64) -> Self {
        let end = self.position + 8;
        if end <= N {
            self.buffer[self.position..end].copy_from_slice(&value.to_le_bytes());
            self.position = end;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    pub fn build(self) -> [u8; N] {
        self.buffer
    }
}

impl<const N: usize> Default for FrameBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor over a received payload
pub struct FrameReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn read(&mut self, n: usize) -> Option<&'a [u8]> {
        let slice = self.data.get(self.position..self.position + n)?;
        self.position += n;
        Some(slice)
    }

    /// Read an `f64` (little-endian)
    pub fn read_f64(&mut self) -> Option<f64> {
        let bytes: [u8; 8] = self.read(8)?.try_into().ok()?;
        Some(f64::from_le_bytes(bytes))
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}
