//! Transparent fallback splice.
//!
//! Traffic that is neither dialect of Reflex gets forwarded byte-for-byte
//! to a loopback backend so the listener looks like an ordinary web
//! server. The preloaded [`PeekReader`] guarantees that bytes examined
//! during dialect discrimination still reach the backend.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::inbound::http::write_plain_response;
use crate::inbound::peek::PeekReader;

/// Per-side idle deadline for the splice.
pub const FALLBACK_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

const COPY_BUFFER_SIZE: usize = 16 * 1024;

/// Splice the client against the configured loopback backend.
pub(crate) async fn run_fallback<R, W>(
    dest: Option<u16>,
    client_reader: PeekReader<R>,
    mut client_writer: W,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let Some(port) = dest.filter(|&p| p != 0) else {
        let _ = write_plain_response(&mut client_writer, "403 Forbidden", "forbidden").await;
        return Err(Error::config("no fallback destination configured"));
    };

    let backend = match TcpStream::connect(("127.0.0.1", port)).await {
        Ok(backend) => backend,
        Err(e) => {
            let _ = write_plain_response(&mut client_writer, "502 Bad Gateway", "bad gateway").await;
            return Err(Error::Network(e));
        }
    };

    tracing::debug!(port, "splicing non-reflex traffic to fallback backend");

    let (backend_reader, backend_writer) = tokio::io::split(backend);

    let token = CancellationToken::new();
    let (err_tx, mut err_rx) = mpsc::channel::<Result<()>>(2);

    let forward = tokio::spawn(copy_with_idle_deadline(
        client_reader,
        backend_writer,
        token.clone(),
        err_tx.clone(),
    ));
    let backward = tokio::spawn(copy_with_idle_deadline(
        backend_reader,
        client_writer,
        token.clone(),
        err_tx,
    ));

    // When one direction finishes, tear the other down and wait for it.
    let first_result = err_rx.recv().await.unwrap_or(Ok(()));
    token.cancel();
    let _ = forward.await;
    let _ = backward.await;

    first_result
}

/// One copy direction, bounded by the idle deadline on each read.
async fn copy_with_idle_deadline<R, W>(
    mut reader: R,
    mut writer: W,
    token: CancellationToken,
    err_tx: mpsc::Sender<Result<()>>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let result = loop {
        let read = tokio::select! {
            _ = token.cancelled() => break Ok(()),
            read = tokio::time::timeout(FALLBACK_IDLE_TIMEOUT, reader.read(&mut buf)) => read,
        };
        match read {
            Err(_) => {
                break Err(Error::Network(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "fallback idle deadline exceeded",
                )))
            }
            Ok(Ok(0)) => break Ok(()),
            Ok(Ok(n)) => {
                if let Err(e) = writer.write_all(&buf[..n]).await {
                    break Err(Error::Network(e));
                }
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break Ok(()),
            Ok(Err(e)) => break Err(Error::Network(e)),
        }
    };
    let _ = writer.shutdown().await;
    let _ = err_tx.send(result).await;
}
