//! Peekable buffered reader.
//!
//! [`PeekReader`] wraps the accepted socket's read half and is the single
//! source of truth for unread bytes: the dialect dispatcher peeks through
//! it without consuming, and whichever handler wins — binary, HTTP, or the
//! fallback splice — keeps reading from the same wrapper, so no byte
//! examined during discrimination is ever lost.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use tokio::io::{self, AsyncRead, AsyncReadExt, ReadBuf};

const INITIAL_CAPACITY: usize = 4 * 1024;

/// A buffered reader supporting non-destructive peeks.
pub struct PeekReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> PeekReader<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Peek up to `n` bytes without consuming them.
    ///
    /// Blocks until `n` bytes are buffered or the stream ends; at EOF the
    /// returned slice is whatever remains, possibly empty.
    pub async fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        while self.buf.len() < n {
            if self.buffer_more().await? == 0 {
                break;
            }
        }
        Ok(&self.buf[..n.min(self.buf.len())])
    }

    /// Discard `n` buffered bytes. Must not exceed what a prior peek
    /// returned.
    pub fn consume(&mut self, n: usize) {
        let _ = self.buf.split_to(n);
    }

    /// Read one CRLF- (or bare LF-) terminated line, consuming through the
    /// newline. The terminator is stripped from the returned bytes.
    ///
    /// Fails with `InvalidData` when no newline shows up within `max`
    /// bytes, and with `UnexpectedEof` when the stream ends mid-line.
    pub async fn read_line(&mut self, max: usize) -> io::Result<Vec<u8>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                if pos > max {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "header line too long",
                    ));
                }
                let mut line = self.buf.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                return Ok(line.to_vec());
            }
            if self.buf.len() >= max {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "header line too long",
                ));
            }
            if self.buffer_more().await? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended mid-line",
                ));
            }
        }
    }

    async fn buffer_more(&mut self) -> io::Result<usize> {
        (&mut self.inner).read_buf(&mut self.buf).await
    }

    #[cfg(test)]
    pub(crate) fn buffered(&self) -> &[u8] {
        &self.buf[..]
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for PeekReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.buf.is_empty() {
            let n = self.buf.len().min(out.remaining());
            let chunk = self.buf.split_to(n);
            out.put_slice(&chunk);
            Poll::Ready(Ok(()))
        } else {
            Pin::new(&mut self.inner).poll_read(cx, out)
        }
    }
}
