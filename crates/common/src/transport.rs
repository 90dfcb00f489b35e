//! Line-delimited JSON framing over a pair of byte streams.
//!
//! One JSON document per line; blank lines are skipped. The peer's stdout is
//! reserved for the RPC stream: anything an engine wants to log goes to
//! stderr, or it corrupts the protocol.

use serde::{de::DeserializeOwned, Serialize};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on a single framed message.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Reads newline-delimited JSON messages.
pub struct FramedReader<R> {
    inner: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> FramedReader<R> {
    pub fn new(reader: R) -> Self {
        Self { inner: BufReader::new(reader), line: String::new() }
    }

    /// Reads the next message, skipping blank lines. `None` on EOF.
    pub async fn read<T: DeserializeOwned>(&mut self) -> io::Result<Option<T>> {
        loop {
            self.line.clear();
            let n = self.inner.read_line(&mut self.line).await?;
            if n == 0 {
                return Ok(None);
            }
            if n > MAX_MESSAGE_SIZE {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("message of {n} bytes exceeds limit"),
                ));
            }
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err));
        }
    }
}

/// Writes newline-delimited JSON messages, flushing after each one.
pub struct FramedWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FramedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { inner: writer }
    }

    pub async fn write<T: Serialize>(&mut self, message: &T) -> io::Result<()> {
        let mut buf = serde_json::to_vec(message)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        buf.push(b'\n');
        self.inner.write_all(&buf).await?;
        self.inner.flush().await
    }

    /// Consumes the writer, closing the underlying stream.
    pub async fn shutdown(mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}
