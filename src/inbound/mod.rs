//! Inbound Reflex handler.
//!
//! One handler serves every accepted connection. It peeks the first bytes
//! to pick a wire dialect without consuming anything:
//!
//! 1. the magic word opens the binary handshake,
//! 2. `POST ` opens the HTTP-disguised handshake,
//! 3. everything else is spliced to the fallback backend.
//!
//! Both handshake dialects converge on one fail-closed pipeline: replay
//! check, user lookup, key agreement, HTTP-shaped response, then the
//! encrypted session driver.

mod driver;
mod fallback;
mod http;
mod peek;
mod replay;

pub use peek::PeekReader;
pub use replay::{ReplayGuard, NONCE_TTL_SECS, TIMESTAMP_WINDOW_SECS};

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::config::InboundConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::crypto::{EphemeralSecret, PublicKey, SessionKey};
use crate::protocol::{ClientHandshake, Session, REFLEX_MAGIC};

const FORBIDDEN_BODY: &str = r#"{"status":"forbidden"}"#;
const BAD_HANDSHAKE_BODY: &str = r#"{"error":"bad handshake"}"#;

/// A configured client, held in memory for the handler's lifetime.
#[derive(Debug, Clone)]
pub struct User {
    /// Canonical 36-character UUID form of the 16-byte id
    pub id: String,
    /// Opaque policy label from the configuration
    pub policy: String,
}

/// The inbound Reflex handler.
///
/// Holds the immutable user set, the optional fallback destination, and
/// the shared nonce cache. One instance serves all accepted connections.
#[derive(Debug)]
pub struct Handler {
    users: Vec<User>,
    fallback: Option<u16>,
    replay: ReplayGuard,
}

impl Handler {
    /// Build a handler from configuration, validating every client id.
    pub fn new(config: &InboundConfig) -> Result<Self> {
        let mut users = Vec::with_capacity(config.clients.len());
        for client in &config.clients {
            let id = Uuid::parse_str(&client.id)
                .map_err(|e| Error::Config(format!("invalid client id {:?}: {}", client.id, e)))?;
            users.push(User {
                id: id.to_string(),
                policy: client.policy.clone(),
            });
        }

        Ok(Self {
            users,
            fallback: config.fallback.as_ref().map(|f| f.dest),
            replay: ReplayGuard::new(),
        })
    }

    /// Process one accepted connection.
    ///
    /// Without a dispatcher the handshake still completes and the call
    /// returns after the response is written; sessions need one.
    pub async fn handle<S>(&self, stream: S, dispatcher: Option<Arc<dyn Dispatcher>>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = PeekReader::new(read_half);

        // Binary dialect: the magic word, consumed once recognized
        let head = reader.peek(4).await?;
        if head.len() == 4 && u32::from_be_bytes([head[0], head[1], head[2], head[3]]) == REFLEX_MAGIC
        {
            reader.consume(4);
            let handshake = ClientHandshake::read_binary(&mut reader).await?;
            return self
                .process_handshake(handshake, reader, write_half, dispatcher)
                .await;
        }

        // HTTP dialect: bytes stay put, the HTTP reader consumes them
        let head = reader.peek(5).await?;
        if head == b"POST " {
            return self.handle_http(reader, write_half, dispatcher).await;
        }

        // Anything else goes to the fallback backend, whether it looks
        // like a web request or not
        if matches!(reader.peek(8).await, Ok(head) if starts_with_http_method(head)) {
            tracing::debug!("plain http traffic, entering fallback");
        } else {
            tracing::debug!("unrecognized protocol, entering fallback");
        }
        fallback::run_fallback(self.fallback, reader, write_half).await
    }

    async fn handle_http<R, W>(
        &self,
        mut reader: PeekReader<R>,
        mut writer: W,
        dispatcher: Option<Arc<dyn Dispatcher>>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        match http::read_post_handshake(&mut reader).await {
            Ok(handshake) => {
                self.process_handshake(handshake, reader, writer, dispatcher)
                    .await
            }
            Err(e) => {
                let _ =
                    http::write_json_response(&mut writer, "400 Bad Request", BAD_HANDSHAKE_BODY)
                        .await;
                Err(e)
            }
        }
    }

    /// Shared handshake pipeline. The order is load-bearing and
    /// fail-closed: replay, user lookup, key agreement, response.
    async fn process_handshake<R, W>(
        &self,
        handshake: ClientHandshake,
        reader: PeekReader<R>,
        mut writer: W,
        dispatcher: Option<Arc<dyn Dispatcher>>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if let Err(e) = self
            .replay
            .validate(handshake.timestamp, handshake.nonce)
        {
            let _ = http::write_json_response(&mut writer, "403 Forbidden", FORBIDDEN_BODY).await;
            return Err(e);
        }

        let Some(user) = self.authenticate(&handshake.user_id) else {
            let _ = http::write_json_response(&mut writer, "403 Forbidden", FORBIDDEN_BODY).await;
            return Err(Error::Auth("unknown user"));
        };

        let server_secret = EphemeralSecret::random();
        let server_public = PublicKey::from(&server_secret);
        let client_public = PublicKey::from_bytes(handshake.public_key);

        let shared = server_secret.diffie_hellman(&client_public);
        if shared.is_zero() {
            let _ = http::write_json_response(&mut writer, "403 Forbidden", FORBIDDEN_BODY).await;
            return Err(Error::Auth("invalid peer key"));
        }
        let session_key = SessionKey::derive(&shared);

        tracing::debug!(
            policy = %user.policy,
            tracked_nonces = self.replay.tracked(),
            "reflex handshake accepted"
        );

        let body = format!(
            r#"{{"serverPublicKey":"{}"}}"#,
            hex::encode(server_public.as_bytes())
        );
        http::write_json_response(&mut writer, "200 OK", &body).await?;

        let Some(dispatcher) = dispatcher else {
            return Ok(());
        };

        let session = Session::new(&session_key);
        driver::run_session(session, reader, writer, dispatcher).await
    }

    /// Exact user lookup: the 16-byte id in canonical textual form must
    /// equal a configured id, case-sensitively.
    fn authenticate(&self, user_id: &[u8; 16]) -> Option<&User> {
        let canonical = Uuid::from_bytes(*user_id).to_string();
        self.users.iter().find(|u| u.id == canonical)
    }
}

fn starts_with_http_method(head: &[u8]) -> bool {
    const METHODS: [&[u8]; 7] = [
        b"GET ", b"POST ", b"HEAD ", b"PUT ", b"OPTIONS ", b"DELETE ", b"PATCH ",
    ];
    METHODS.iter().any(|m| head.starts_with(m))
}

/// Accept loop wrapping a [`Handler`].
pub struct Server {
    handler: Arc<Handler>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Server {
    /// Create a server from a handler and the host's dispatcher.
    pub fn new(handler: Handler, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            handler: Arc::new(handler),
            dispatcher,
        }
    }

    /// Accept and serve connections until the listener fails.
    pub async fn run(&self, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!("set_nodelay failed for {}: {}", peer_addr, e);
                    }

                    let handler = Arc::clone(&self.handler);
                    let dispatcher = Arc::clone(&self.dispatcher);

                    tokio::spawn(async move {
                        if let Err(e) = handler.handle(stream, Some(dispatcher)).await {
                            tracing::debug!("connection error from {}: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("accept error: {}", e);
                }
            }
        }
    }
}
