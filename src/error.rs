//! Error types for the Reflex protocol.

use thiserror::Error;

/// Result type alias for Reflex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving Reflex traffic.
#[derive(Error, Debug)]
pub enum Error {
    /// A handshake record could not be decoded (either dialect)
    #[error("malformed handshake: {0}")]
    Handshake(#[from] HandshakeError),

    /// Wire protocol violation after the handshake
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Authentication or anti-replay failure
    #[error("authentication failed: {0}")]
    Auth(&'static str),

    /// Cryptographic operation failed (AEAD open/seal)
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// Network I/O error on the socket or an upstream link
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// The routing dispatcher could not open the upstream link
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// Configuration error (at startup)
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a new cryptographic error
    pub fn crypto(msg: impl Into<String>) -> Self {
        Error::Crypto(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Check if this error indicates authentication failure
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    /// Check if this error is a clean end-of-stream.
    ///
    /// A peer closing its half of the connection between frames is a normal
    /// way for a session to end and is reported as success by the drivers.
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Network(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

/// Decoder failures for the client handshake record.
///
/// The binary and HTTP-POST dialects fail with distinct kinds so callers can
/// tell a truncated record from a malformed envelope.
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// Input ended before the fixed-size fields were complete
    #[error("short input")]
    ShortInput,

    /// Request line did not start with `POST `
    #[error("not a POST request")]
    NotPost,

    /// A header line exceeded the line-length bound
    #[error("header line too long")]
    HeaderTooLong,

    /// No Content-Length header was present
    #[error("missing content-length")]
    MissingContentLength,

    /// Content-Length above the permitted cap
    #[error("content-length {0} exceeds limit")]
    BodyTooLarge(usize),

    /// Request body was not the expected JSON envelope
    #[error("invalid body: {0}")]
    BadJson(#[from] serde_json::Error),

    /// The JSON envelope carried no handshake data
    #[error("missing data field")]
    MissingData,

    /// The `data` field was not valid standard base64
    #[error("invalid base64 payload: {0}")]
    BadBase64(#[from] base64::DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Auth("nonce replayed");
        assert_eq!(err.to_string(), "authentication failed: nonce replayed");

        let err = Error::Handshake(HandshakeError::MissingContentLength);
        assert_eq!(err.to_string(), "malformed handshake: missing content-length");
    }

    #[test]
    fn test_eof_detection() {
        let eof = Error::Network(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "early eof",
        ));
        assert!(eof.is_eof());

        let reset = Error::Network(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(!reset.is_eof());
        assert!(!Error::Auth("unknown user").is_eof());
    }

    #[test]
    fn test_auth_classification() {
        assert!(Error::Auth("timestamp out of window").is_auth_failure());
        assert!(!Error::protocol("bad frame").is_auth_failure());
    }
}
