//! Upstream dispatch seam.
//!
//! The session driver never dials sockets itself; it hands the parsed
//! destination to a [`Dispatcher`], which returns a [`Link`] of buffer
//! batches. The host environment decides what a destination means —
//! [`DirectDispatcher`] is the plain TCP implementation used by the
//! standalone server binary.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::Destination;

/// Batch size for upstream reads and channel depth for links.
const LINK_BUFFER_SIZE: usize = 16 * 1024;
const LINK_CHANNEL_DEPTH: usize = 64;

/// A bidirectional upstream link.
///
/// `reader` yields batches of bytes arriving from the destination; sending
/// on `writer` delivers bytes to it. Dropping `writer` closes the upstream
/// write side; the link as a whole goes away when both ends are dropped.
#[derive(Debug)]
pub struct Link {
    /// Batches read from the upstream destination
    pub reader: mpsc::Receiver<Bytes>,
    /// Bytes to deliver to the upstream destination
    pub writer: mpsc::Sender<Bytes>,
}

/// Opens upstream links for parsed destinations.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Open a link to `dest`.
    async fn dispatch(&self, dest: &Destination) -> Result<Link>;
}

/// Dispatcher that dials destinations directly over TCP.
pub struct DirectDispatcher;

#[async_trait]
impl Dispatcher for DirectDispatcher {
    async fn dispatch(&self, dest: &Destination) -> Result<Link> {
        let stream = TcpStream::connect(dest.to_string())
            .await
            .map_err(|e| Error::Dispatch(format!("{}: {}", dest, e)))?;
        stream.set_nodelay(true).map_err(Error::Network)?;

        let (mut read_half, mut write_half) = tokio::io::split(stream);
        let (up_tx, up_rx) = mpsc::channel::<Bytes>(LINK_CHANNEL_DEPTH);
        let (down_tx, mut down_rx) = mpsc::channel::<Bytes>(LINK_CHANNEL_DEPTH);

        // Upstream → link batches
        tokio::spawn(async move {
            let mut buf = vec![0u8; LINK_BUFFER_SIZE];
            loop {
                match read_half.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if up_tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        // Link batches → upstream; sender drop shuts the write side down
        tokio::spawn(async move {
            while let Some(chunk) = down_rx.recv().await {
                if write_half.write_all(&chunk).await.is_err() {
                    return;
                }
            }
            let _ = write_half.shutdown().await;
        });

        Ok(Link {
            reader: up_rx,
            writer: down_tx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TargetAddr;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_direct_dispatch_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Echo backend
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if stream.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let dest = Destination {
            addr: TargetAddr::Ipv4("127.0.0.1".parse().unwrap()),
            port,
        };
        let mut link = DirectDispatcher.dispatch(&dest).await.unwrap();

        link.writer
            .send(Bytes::from_static(b"ping"))
            .await
            .unwrap();
        let echoed = link.reader.recv().await.unwrap();
        assert_eq!(&echoed[..], b"ping");
    }

    #[tokio::test]
    async fn test_direct_dispatch_refused() {
        // Bind then drop to find a port that is very likely closed
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dest = Destination {
            addr: TargetAddr::Ipv4("127.0.0.1".parse().unwrap()),
            port,
        };
        let err = DirectDispatcher.dispatch(&dest).await.unwrap_err();
        assert!(matches!(err, Error::Dispatch(_)));
    }
}
