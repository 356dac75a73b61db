//! Literal-aware response framing.
//!
//! A response is one CRLF-terminated line, unless the line ends in a
//! literal header `{n}`, in which case `n` raw bytes and another line
//! follow. [`FramedStream::read_response`] returns the whole response so
//! the parser never sees a partial literal.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

const READ_CHUNK: usize = 8192;

/// Longest response line accepted, literals excluded.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest literal accepted.
pub const MAX_LITERAL_SIZE: usize = 64 * 1024 * 1024;

/// Buffered reader/writer over an IMAP transport.
pub struct FramedStream<S> {
    stream: S,
    buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Reads one complete response, including embedded literals.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let line_end = self.fill_line().await?;
            let line = self.buffer.split_to(line_end);
            response.extend_from_slice(&line);

            let Some(size) = literal_length(&line) else {
                return Ok(response);
            };
            if size > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal of {size} bytes exceeds limit of {MAX_LITERAL_SIZE}"
                )));
            }
            self.fill_exact(size).await?;
            response.extend_from_slice(&self.buffer[..size]);
            self.buffer.advance(size);
        }
    }

    /// Buffers input until it holds a full line; returns its length
    /// including the CRLF.
    async fn fill_line(&mut self) -> Result<usize> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = find_crlf(&self.buffer[scanned..]) {
                return Ok(scanned + pos + 2);
            }
            // Keep a trailing CR so a split CRLF is still found.
            scanned = self.buffer.len().saturating_sub(1);
            if self.buffer.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol(format!(
                    "response line exceeds {MAX_LINE_LENGTH} bytes"
                )));
            }
            self.read_more().await?;
        }
    }

    async fn fill_exact(&mut self, size: usize) -> Result<()> {
        while self.buffer.len() < size {
            self.read_more().await?;
        }
        Ok(())
    }

    async fn read_more(&mut self) -> Result<()> {
        self.buffer.reserve(READ_CHUNK);
        if self.stream.read_buf(&mut self.buffer).await? == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )));
        }
        Ok(())
    }

    /// Writes and flushes raw bytes.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// True if the server sent bytes that have not been consumed yet.
    #[must_use]
    pub fn has_buffered_input(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Returns the inner stream. Buffered input is discarded.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Size of the literal announced at the end of `line`, if any.
///
/// Accepts `{n}\r\n` and the non-synchronizing `{n+}\r\n`.
fn literal_length(line: &[u8]) -> Option<usize> {
    let body = line.strip_suffix(b"\r\n")?.strip_suffix(b"}")?;
    let body = body.strip_suffix(b"+").unwrap_or(body);
    let open = body.iter().rposition(|&b| b == b'{')?;
    let digits = &body[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
