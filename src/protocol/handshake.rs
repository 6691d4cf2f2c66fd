//! Client handshake record codec.
//!
//! The same record travels in two encodings. The binary dialect (after the
//! 4-byte magic word) is:
//!
//! ```text
//! public_key : 32 bytes
//! user_id    : 16 bytes
//! policy_len : u16 big-endian
//! policy     : policy_len bytes
//! timestamp  : u64 big-endian (interpreted as i64 unix seconds)
//! nonce      : 16 bytes
//! ```
//!
//! The HTTP-POST dialect base64-wraps a flat payload with the policy moved
//! to the tail and no length prefix: the fixed 72 bytes
//! `public_key ‖ user_id ‖ timestamp ‖ nonce`, then everything after byte
//! 72 is the policy blob.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, HandshakeError, Result};

/// Length of the fixed fields in the HTTP-payload encoding.
pub const HANDSHAKE_FIXED_LEN: usize = 32 + 16 + 8 + 16;

/// The client's opening handshake record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHandshake {
    /// Client's X25519 public key
    pub public_key: [u8; 32],
    /// 16-byte user id (a UUID in canonical form on the config side)
    pub user_id: [u8; 16],
    /// Opaque policy request blob; transported, never interpreted
    pub policy: Vec<u8>,
    /// Unix seconds, bound by the replay guard's clock-skew window
    pub timestamp: i64,
    /// Anti-replay nonce
    pub nonce: [u8; 16],
}

impl ClientHandshake {
    /// Read the binary-dialect record from `reader`.
    ///
    /// The caller has already consumed the magic word. A stream ending
    /// mid-record fails with [`HandshakeError::ShortInput`].
    pub async fn read_binary<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut public_key = [0u8; 32];
        read_field(reader, &mut public_key).await?;

        let mut user_id = [0u8; 16];
        read_field(reader, &mut user_id).await?;

        let mut len = [0u8; 2];
        read_field(reader, &mut len).await?;
        let policy_len = u16::from_be_bytes(len) as usize;

        let mut policy = vec![0u8; policy_len];
        if policy_len > 0 {
            read_field(reader, &mut policy).await?;
        }

        let mut ts = [0u8; 8];
        read_field(reader, &mut ts).await?;
        let timestamp = u64::from_be_bytes(ts) as i64;

        let mut nonce = [0u8; 16];
        read_field(reader, &mut nonce).await?;

        Ok(Self {
            public_key,
            user_id,
            policy,
            timestamp,
            nonce,
        })
    }

    /// Encode the binary-dialect record (without the magic word).
    pub fn encode_binary(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HANDSHAKE_FIXED_LEN + 2 + self.policy.len());
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&self.user_id);
        out.extend_from_slice(&(self.policy.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.policy);
        out.extend_from_slice(&(self.timestamp as u64).to_be_bytes());
        out.extend_from_slice(&self.nonce);
        out
    }

    /// Decode the flat HTTP-dialect payload (the base64-decoded body bytes).
    pub fn decode_http_payload(raw: &[u8]) -> Result<Self> {
        if raw.len() < HANDSHAKE_FIXED_LEN {
            return Err(Error::Handshake(HandshakeError::ShortInput));
        }

        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(&raw[0..32]);

        let mut user_id = [0u8; 16];
        user_id.copy_from_slice(&raw[32..48]);

        let mut ts = [0u8; 8];
        ts.copy_from_slice(&raw[48..56]);
        let timestamp = u64::from_be_bytes(ts) as i64;

        let mut nonce = [0u8; 16];
        nonce.copy_from_slice(&raw[56..72]);

        Ok(Self {
            public_key,
            user_id,
            policy: raw[HANDSHAKE_FIXED_LEN..].to_vec(),
            timestamp,
            nonce,
        })
    }

    /// Encode the flat HTTP-dialect payload.
    pub fn encode_http_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HANDSHAKE_FIXED_LEN + self.policy.len());
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&self.user_id);
        out.extend_from_slice(&(self.timestamp as u64).to_be_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.policy);
        out
    }
}

/// Read an exact field, mapping a truncated stream to the short-input kind.
async fn read_field<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(Error::Handshake(HandshakeError::ShortInput))
        }
        Err(e) => Err(Error::Network(e)),
    }
}
