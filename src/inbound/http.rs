//! HTTP-POST handshake dialect and HTTP-shaped responses.
//!
//! The disguised handshake is an ordinary-looking `POST` request whose JSON
//! body carries the handshake record base64-encoded:
//!
//! ```text
//! POST /reflex HTTP/1.1
//! Host: ...
//! Content-Length: N
//!
//! {"data":"<base64 of the flat handshake payload>"}
//! ```
//!
//! Every server reply, success or failure, is shaped like an HTTP response
//! so both dialects look like normal web traffic on the wire.

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{Error, HandshakeError, Result};
use crate::inbound::peek::PeekReader;
use crate::protocol::ClientHandshake;

/// Largest accepted Content-Length for the handshake body.
pub const MAX_BODY_LEN: usize = 4096;

/// Bound on a single request or header line.
const MAX_LINE_LEN: usize = 8192;

#[derive(Deserialize)]
struct HandshakeBody {
    #[serde(default)]
    data: String,
}

/// Read and decode an HTTP-POST handshake from the peeked stream.
///
/// Header lines without a colon are skipped; Content-Length values between
/// 0 and [`MAX_BODY_LEN`] are accepted.
pub(crate) async fn read_post_handshake<R>(reader: &mut PeekReader<R>) -> Result<ClientHandshake>
where
    R: AsyncRead + Unpin,
{
    let request_line = read_header_line(reader).await?;
    if !request_line.starts_with(b"POST ") {
        return Err(Error::Handshake(HandshakeError::NotPost));
    }

    let mut content_len: Option<usize> = None;
    loop {
        let line = read_header_line(reader).await?;
        if line.is_empty() {
            break;
        }
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        let key = String::from_utf8_lossy(&line[..colon]).trim().to_lowercase();
        let value = String::from_utf8_lossy(&line[colon + 1..]).trim().to_string();
        if key == "content-length" {
            if let Ok(n) = value.parse::<usize>() {
                content_len = Some(n);
            }
        }
    }

    let content_len = content_len.ok_or(Error::Handshake(HandshakeError::MissingContentLength))?;
    if content_len > MAX_BODY_LEN {
        return Err(Error::Handshake(HandshakeError::BodyTooLarge(content_len)));
    }

    let mut body = vec![0u8; content_len];
    match reader.read_exact(&mut body).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(Error::Handshake(HandshakeError::ShortInput))
        }
        Err(e) => return Err(Error::Network(e)),
    }

    let envelope: HandshakeBody =
        serde_json::from_slice(&body).map_err(HandshakeError::BadJson)?;
    if envelope.data.is_empty() {
        return Err(Error::Handshake(HandshakeError::MissingData));
    }

    let raw = BASE64
        .decode(envelope.data.as_bytes())
        .map_err(HandshakeError::BadBase64)?;

    ClientHandshake::decode_http_payload(&raw)
}

async fn read_header_line<R>(reader: &mut PeekReader<R>) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    match reader.read_line(MAX_LINE_LEN).await {
        Ok(line) => Ok(line),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            Err(Error::Handshake(HandshakeError::HeaderTooLong))
        }
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(Error::Handshake(HandshakeError::ShortInput))
        }
        Err(e) => Err(Error::Network(e)),
    }
}

/// Write an HTTP response with a JSON body.
pub(crate) async fn write_json_response<W>(
    writer: &mut W,
    status: &str,
    body: &str,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_response(writer, status, "application/json", body).await
}

/// Write an HTTP response with a plain-text body.
pub(crate) async fn write_plain_response<W>(
    writer: &mut W,
    status: &str,
    body: &str,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_response(writer, status, "text/plain", body).await
}

async fn write_response<W>(
    writer: &mut W,
    status: &str,
    content_type: &str,
    body: &str,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_handshake() -> ClientHandshake {
        ClientHandshake {
            public_key: [0u8; 32],
            user_id: [
                0x10, 0x32, 0x54, 0x76, 0x98, 0xBA, 0xDC, 0xFE, 0x10, 0x32, 0x54, 0x76, 0x98,
                0xBA, 0xDC, 0xFE,
            ],
            policy: vec![],
            timestamp: 1_700_000_000,
            nonce: [1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        }
    }

    fn post_request(body: &str) -> Vec<u8> {
        format!(
            "POST /reflex HTTP/1.1\r\nHost: x\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    async fn decode(request: Vec<u8>) -> Result<ClientHandshake> {
        let mut reader = PeekReader::new(Cursor::new(request));
        read_post_handshake(&mut reader).await
    }

    #[tokio::test]
    async fn test_post_handshake_ok() {
        let hs = sample_handshake();
        let body = format!(r#"{{"data":"{}"}}"#, BASE64.encode(hs.encode_http_payload()));

        let decoded = decode(post_request(&body)).await.unwrap();
        assert_eq!(decoded, hs);
    }

    #[tokio::test]
    async fn test_headers_without_colon_skipped() {
        let hs = sample_handshake();
        let body = format!(r#"{{"data":"{}"}}"#, BASE64.encode(hs.encode_http_payload()));
        let request = format!(
            "POST / HTTP/1.1\r\nthis line has no colon\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );

        let decoded = decode(request.into_bytes()).await.unwrap();
        assert_eq!(decoded, hs);
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let request = b"POST / HTTP/1.1\r\nHost: x\r\n\r\n{}".to_vec();
        let err = decode(request).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Handshake(HandshakeError::MissingContentLength)
        ));
    }

    #[tokio::test]
    async fn test_oversize_content_length() {
        let request =
            format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n", MAX_BODY_LEN + 1).into_bytes();
        let err = decode(request).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Handshake(HandshakeError::BodyTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_content_length_is_valid_header() {
        // A zero-length body passes the header checks, then fails as JSON
        let request = b"POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n".to_vec();
        let err = decode(request).await.unwrap_err();
        assert!(matches!(err, Error::Handshake(HandshakeError::BadJson(_))));
    }

    #[tokio::test]
    async fn test_bad_json_body() {
        let err = decode(post_request("not json at all")).await.unwrap_err();
        assert!(matches!(err, Error::Handshake(HandshakeError::BadJson(_))));
    }

    #[tokio::test]
    async fn test_missing_data_field() {
        let err = decode(post_request(r#"{"other":"x"}"#)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Handshake(HandshakeError::MissingData)
        ));
    }

    #[tokio::test]
    async fn test_bad_base64() {
        let err = decode(post_request(r#"{"data":"@@not-base64@@"}"#))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Handshake(HandshakeError::BadBase64(_))
        ));
    }

    #[tokio::test]
    async fn test_non_post_rejected() {
        let request = b"PUT / HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}".to_vec();
        let err = decode(request).await.unwrap_err();
        assert!(matches!(err, Error::Handshake(HandshakeError::NotPost)));
    }

    #[tokio::test]
    async fn test_response_shape() {
        let mut out = Vec::new();
        write_json_response(&mut out, "403 Forbidden", r#"{"status":"forbidden"}"#)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "HTTP/1.1 403 Forbidden\r\nContent-Type: application/json\r\nContent-Length: 22\r\n\r\n{\"status\":\"forbidden\"}"
        );
    }
}
