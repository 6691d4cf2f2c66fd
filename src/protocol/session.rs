//! Stateful AEAD record layer.
//!
//! Wire frame: `length : u16 big-endian | type : u8 | ciphertext : length
//! bytes`, where `length` covers the ciphertext including the 16-byte tag.
//! Each direction keeps an independent, strictly monotonic 64-bit frame
//! counter that becomes the AEAD nonce; an authentication failure on read
//! is fatal for the session.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::crypto::{Aead, Nonce, SessionKey, TAG_SIZE};
use crate::error::{Error, Result};

/// Upper bound on frame plaintext.
///
/// The u16 length field admits larger ciphertexts; anything beyond this is
/// rejected on both read and write to bound per-frame memory.
pub const MAX_FRAME_PLAINTEXT: usize = 16 * 1024;

/// Frame type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Application data
    Data,
    /// Cover traffic; discarded by the receiver
    Padding,
    /// Timing cover traffic; discarded by the receiver
    Timing,
    /// Session close notification
    Close,
    /// Any tag this implementation does not know; discarded mid-session
    Unknown(u8),
}

impl FrameType {
    /// Decode a wire tag.
    pub fn from_wire(tag: u8) -> Self {
        match tag {
            0x01 => FrameType::Data,
            0x02 => FrameType::Padding,
            0x03 => FrameType::Timing,
            0x04 => FrameType::Close,
            other => FrameType::Unknown(other),
        }
    }

    /// Encode to the wire tag.
    pub fn to_wire(self) -> u8 {
        match self {
            FrameType::Data => 0x01,
            FrameType::Padding => 0x02,
            FrameType::Timing => 0x03,
            FrameType::Close => 0x04,
            FrameType::Unknown(tag) => tag,
        }
    }
}

/// One decrypted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Type tag from the frame header
    pub frame_type: FrameType,
    /// Decrypted payload bytes
    pub payload: Vec<u8>,
}

/// An established Reflex session: one AEAD context plus per-direction
/// frame counters.
pub struct Session {
    aead: Aead,
    read_nonce: u64,
    write_nonce: u64,
}

impl Session {
    /// Create a session from a derived session key. Both counters start
    /// at zero.
    pub fn new(key: &SessionKey) -> Self {
        Self {
            aead: Aead::new(key),
            read_nonce: 0,
            write_nonce: 0,
        }
    }

    /// Read and decrypt the next frame.
    pub async fn read_frame<R>(&mut self, reader: &mut R) -> Result<Frame>
    where
        R: AsyncRead + Unpin,
    {
        read_frame_with(&self.aead, &mut self.read_nonce, reader).await
    }

    /// Encrypt and write one frame.
    pub async fn write_frame<W>(
        &mut self,
        writer: &mut W,
        frame_type: FrameType,
        payload: &[u8],
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        write_frame_with(&self.aead, &mut self.write_nonce, writer, frame_type, payload).await
    }

    /// Split into independently owned read and write halves.
    ///
    /// Counter state carries over, so a session that already exchanged
    /// frames keeps its nonce sequence after the split.
    pub fn into_split(self) -> (SessionReader, SessionWriter) {
        (
            SessionReader {
                aead: self.aead.clone(),
                nonce: self.read_nonce,
            },
            SessionWriter {
                aead: self.aead,
                nonce: self.write_nonce,
            },
        )
    }
}

/// Read half of a split session.
pub struct SessionReader {
    aead: Aead,
    nonce: u64,
}

impl SessionReader {
    /// Read and decrypt the next frame.
    pub async fn read_frame<R>(&mut self, reader: &mut R) -> Result<Frame>
    where
        R: AsyncRead + Unpin,
    {
        read_frame_with(&self.aead, &mut self.nonce, reader).await
    }
}

/// Write half of a split session.
pub struct SessionWriter {
    aead: Aead,
    nonce: u64,
}

impl SessionWriter {
    /// Encrypt and write one frame.
    pub async fn write_frame<W>(
        &mut self,
        writer: &mut W,
        frame_type: FrameType,
        payload: &[u8],
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        write_frame_with(&self.aead, &mut self.nonce, writer, frame_type, payload).await
    }
}

async fn read_frame_with<R>(aead: &Aead, nonce: &mut u64, reader: &mut R) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 3];
    reader.read_exact(&mut header).await?;

    let length = u16::from_be_bytes([header[0], header[1]]) as usize;
    let frame_type = FrameType::from_wire(header[2]);

    if length > MAX_FRAME_PLAINTEXT + TAG_SIZE {
        return Err(Error::protocol(format!("frame too large: {} bytes", length)));
    }

    let mut ciphertext = vec![0u8; length];
    reader.read_exact(&mut ciphertext).await?;

    let counter = Nonce::new(*nonce);
    *nonce += 1;

    let payload = aead.open(&counter, &ciphertext)?;
    Ok(Frame {
        frame_type,
        payload,
    })
}

async fn write_frame_with<W>(
    aead: &Aead,
    nonce: &mut u64,
    writer: &mut W,
    frame_type: FrameType,
    payload: &[u8],
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_PLAINTEXT {
        return Err(Error::protocol(format!(
            "frame payload too large: {} bytes",
            payload.len()
        )));
    }

    let counter = Nonce::new(*nonce);
    *nonce += 1;

    let ciphertext = aead.seal(&counter, payload)?;

    let mut record = Vec::with_capacity(3 + ciphertext.len());
    record.extend_from_slice(&(ciphertext.len() as u16).to_be_bytes());
    record.push(frame_type.to_wire());
    record.extend_from_slice(&ciphertext);

    writer.write_all(&record).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KEY_SIZE;
    use std::io::Cursor;

    fn key() -> SessionKey {
        SessionKey::from_bytes([0x11u8; KEY_SIZE])
    }

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let mut writer_session = Session::new(&key());
        let mut reader_session = Session::new(&key());

        let mut wire = Vec::new();
        writer_session
            .write_frame(&mut wire, FrameType::Data, b"hello reflex")
            .await
            .unwrap();

        let mut cursor = Cursor::new(wire);
        let frame = reader_session.read_frame(&mut cursor).await.unwrap();

        assert_eq!(frame.frame_type, FrameType::Data);
        assert_eq!(frame.payload, b"hello reflex");
    }

    #[tokio::test]
    async fn test_counters_advance_in_lockstep() {
        let mut writer_session = Session::new(&key());
        let mut reader_session = Session::new(&key());

        let mut wire = Vec::new();
        for i in 0..5u8 {
            writer_session
                .write_frame(&mut wire, FrameType::Data, &[i; 4])
                .await
                .unwrap();
        }

        let mut cursor = Cursor::new(wire);
        for i in 0..5u8 {
            let frame = reader_session.read_frame(&mut cursor).await.unwrap();
            assert_eq!(frame.payload, vec![i; 4]);
        }
    }

    #[tokio::test]
    async fn test_skipped_frame_breaks_nonce_sequence() {
        // A reader that misses a frame is desynchronized: decrypting frame 1
        // with counter 0 must fail. This is what makes per-direction nonces
        // strictly monotonic rather than content-addressed.
        let mut writer_session = Session::new(&key());

        let mut first = Vec::new();
        writer_session
            .write_frame(&mut first, FrameType::Data, b"frame zero")
            .await
            .unwrap();

        let mut second = Vec::new();
        writer_session
            .write_frame(&mut second, FrameType::Data, b"frame one")
            .await
            .unwrap();

        let mut fresh_reader = Session::new(&key());
        let mut cursor = Cursor::new(second);
        assert!(fresh_reader.read_frame(&mut cursor).await.is_err());
    }

    #[tokio::test]
    async fn test_bit_flip_fails_authentication() {
        let mut writer_session = Session::new(&key());
        let mut reader_session = Session::new(&key());

        let mut wire = Vec::new();
        writer_session
            .write_frame(&mut wire, FrameType::Data, b"sensitive")
            .await
            .unwrap();

        // Flip one bit in the ciphertext body (past the 3-byte header)
        wire[5] ^= 0x40;

        let mut cursor = Cursor::new(wire);
        let err = reader_session.read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
    }

    #[tokio::test]
    async fn test_frame_types_roundtrip() {
        let mut writer_session = Session::new(&key());
        let mut reader_session = Session::new(&key());

        let mut wire = Vec::new();
        for ty in [
            FrameType::Data,
            FrameType::Padding,
            FrameType::Timing,
            FrameType::Close,
            FrameType::Unknown(0x7F),
        ] {
            writer_session
                .write_frame(&mut wire, ty, b"x")
                .await
                .unwrap();
        }

        let mut cursor = Cursor::new(wire);
        for expect in [
            FrameType::Data,
            FrameType::Padding,
            FrameType::Timing,
            FrameType::Close,
            FrameType::Unknown(0x7F),
        ] {
            let frame = reader_session.read_frame(&mut cursor).await.unwrap();
            assert_eq!(frame.frame_type, expect);
        }
    }

    #[tokio::test]
    async fn test_oversize_write_rejected() {
        let mut session = Session::new(&key());
        let mut wire = Vec::new();
        let big = vec![0u8; MAX_FRAME_PLAINTEXT + 1];
        assert!(session
            .write_frame(&mut wire, FrameType::Data, &big)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_oversize_read_rejected() {
        // Hand-craft a header claiming a ciphertext beyond the bound
        let mut wire = Vec::new();
        let length = (MAX_FRAME_PLAINTEXT + TAG_SIZE + 1) as u16;
        wire.extend_from_slice(&length.to_be_bytes());
        wire.push(0x01);
        wire.resize(3 + length as usize, 0);

        let mut session = Session::new(&key());
        let mut cursor = Cursor::new(wire);
        let err = session.read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_split_preserves_counters() {
        let mut writer_session = Session::new(&key());
        let mut reader_session = Session::new(&key());

        let mut wire = Vec::new();
        writer_session
            .write_frame(&mut wire, FrameType::Data, b"before split")
            .await
            .unwrap();

        let mut cursor = Cursor::new(wire);
        reader_session.read_frame(&mut cursor).await.unwrap();

        // Frames after the split continue the same nonce sequences
        let (mut read_half, _) = reader_session.into_split();
        let (_, mut write_half) = writer_session.into_split();

        let mut wire = Vec::new();
        write_half
            .write_frame(&mut wire, FrameType::Data, b"after split")
            .await
            .unwrap();

        let mut cursor = Cursor::new(wire);
        let frame = read_half.read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame.payload, b"after split");
    }

    #[tokio::test]
    async fn test_truncated_frame_is_eof() {
        let mut writer_session = Session::new(&key());
        let mut wire = Vec::new();
        writer_session
            .write_frame(&mut wire, FrameType::Data, b"cut short")
            .await
            .unwrap();
        wire.truncate(wire.len() - 4);

        let mut reader_session = Session::new(&key());
        let mut cursor = Cursor::new(wire);
        let err = reader_session.read_frame(&mut cursor).await.unwrap_err();
        assert!(err.is_eof());
    }
}
