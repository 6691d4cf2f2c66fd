//! Post-handshake session driver.
//!
//! Parses the connect frame, asks the dispatcher for an upstream link, and
//! pipes bytes in both directions until either side closes. The two copy
//! halves run as independent tasks sharing one cancellation token; the
//! first failure lands in a bounded error channel, the other task is
//! cancelled and awaited before returning.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::inbound::peek::PeekReader;
use crate::protocol::{ConnectPayload, FrameType, Session};

/// Drive an established session to completion.
pub(crate) async fn run_session<R, W>(
    mut session: Session,
    mut client_reader: PeekReader<R>,
    mut client_writer: W,
    dispatcher: Arc<dyn Dispatcher>,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    // The first frame carries the connect request and nothing else may
    // precede it.
    let first = session.read_frame(&mut client_reader).await?;
    if first.frame_type != FrameType::Data {
        let _ = session
            .write_frame(&mut client_writer, FrameType::Close, b"expected connect")
            .await;
        return Err(Error::protocol("first frame is not DATA"));
    }

    let connect = match ConnectPayload::parse(&first.payload) {
        Ok(connect) => connect,
        Err(e) => {
            let _ = session
                .write_frame(&mut client_writer, FrameType::Close, b"bad connect payload")
                .await;
            return Err(e);
        }
    };

    tracing::debug!(dest = %connect.dest, "reflex session connecting upstream");

    let link = match dispatcher.dispatch(&connect.dest).await {
        Ok(link) => link,
        Err(e) => {
            let _ = session
                .write_frame(&mut client_writer, FrameType::Close, b"dispatch failed")
                .await;
            return Err(e);
        }
    };

    session
        .write_frame(&mut client_writer, FrameType::Data, b"OK")
        .await?;

    // Early bytes ride along with the connect payload and must reach the
    // upstream before anything from the frame loop.
    if !connect.initial.is_empty() {
        if link.writer.send(Bytes::from(connect.initial)).await.is_err() {
            let _ = client_writer.shutdown().await;
            return Err(Error::Dispatch(
                "upstream closed before initial payload".into(),
            ));
        }
    }

    let (mut session_reader, mut session_writer) = session.into_split();
    let mut upstream_rx = link.reader;
    let upstream_tx = link.writer;

    let token = CancellationToken::new();
    let (err_tx, mut err_rx) = mpsc::channel::<Result<()>>(2);

    // Upstream → client: each batch becomes one DATA frame.
    let downstream = {
        let token = token.clone();
        let err_tx = err_tx.clone();
        tokio::spawn(async move {
            let result = loop {
                tokio::select! {
                    _ = token.cancelled() => break Ok(()),
                    batch = upstream_rx.recv() => match batch {
                        Some(bytes) => {
                            if bytes.is_empty() {
                                continue;
                            }
                            if let Err(e) = session_writer
                                .write_frame(&mut client_writer, FrameType::Data, &bytes)
                                .await
                            {
                                break Err(e);
                            }
                        }
                        // Upstream end-of-stream is a clean finish
                        None => break Ok(()),
                    }
                }
            };
            // Best-effort close notification, then drop our half of the
            // socket.
            let _ = session_writer
                .write_frame(&mut client_writer, FrameType::Close, b"")
                .await;
            let _ = client_writer.shutdown().await;
            let _ = err_tx.send(result).await;
        })
    };

    // Client → upstream: DATA forwards, PADDING/TIMING/unknown are
    // discarded, CLOSE ends the session.
    let upstream = {
        let token = token.clone();
        let err_tx = err_tx.clone();
        tokio::spawn(async move {
            let result = loop {
                tokio::select! {
                    _ = token.cancelled() => break Ok(()),
                    frame = session_reader.read_frame(&mut client_reader) => match frame {
                        Ok(frame) => match frame.frame_type {
                            FrameType::Data => {
                                if frame.payload.is_empty() {
                                    continue;
                                }
                                if upstream_tx.send(Bytes::from(frame.payload)).await.is_err() {
                                    // Upstream went away; its pump reports
                                    // the cause if there was one
                                    break Ok(());
                                }
                            }
                            FrameType::Close => break Ok(()),
                            FrameType::Padding | FrameType::Timing | FrameType::Unknown(_) => {
                                continue
                            }
                        },
                        Err(e) if e.is_eof() => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }
            };
            // Dropping the sender closes the upstream write side
            drop(upstream_tx);
            let _ = err_tx.send(result).await;
        })
    };

    // First outcome wins; cancel and await the other half before returning.
    let first_result = err_rx.recv().await.unwrap_or(Ok(()));
    token.cancel();
    let _ = downstream.await;
    let _ = upstream.await;

    first_result
}
