//! Line framing for inbound connections
//!
//! Buffers bytes from a socket and splits them on `\n`. A partially
//! received payload stays buffered until the next read; growth beyond
//! the per-connection cap is a protocol violation that disconnects the
//! peer rather than blocking or truncating.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::FramingError;

/// Hard cap on buffered bytes awaiting a line terminator
pub const MAX_LINE_BUFFER: usize = 4096;

const READ_CHUNK: usize = 2048;

/// Buffered reader yielding newline-delimited payloads
pub struct LineReader<R> {
    reader: R,
    buffer: Vec<u8>,
    limit: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap a reader with the default buffer cap
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, MAX_LINE_BUFFER)
    }

    /// Wrap a reader with an explicit buffer cap
    pub fn with_limit(reader: R, limit: usize) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            limit,
        }
    }

    /// Read the next payload, without its terminator
    ///
    /// Returns `Ok(None)` on orderly EOF. A trailing payload with no
    /// terminator is discarded: the peer closed mid-frame. A `\r`
    /// before the terminator is stripped. Invalid UTF-8 is replaced
    /// rather than rejected here; the JSON decode downstream will
    /// classify the payload.
    pub async fn next_line(&mut self) -> Result<Option<String>, FramingError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            if self.buffer.len() >= self.limit {
                return Err(FramingError::BufferOverflow { limit: self.limit });
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                return Ok(None);
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}
