//! Authenticated encryption for session frames.
//!
//! Uses ChaCha20-Poly1305 with counter-based nonces. Each direction of a
//! session keeps its own 64-bit counter; a nonce is never reused for the
//! same direction under one key.

use chacha20poly1305::{
    aead::{Aead as AeadTrait, KeyInit},
    ChaCha20Poly1305,
};

use crate::crypto::{SessionKey, NONCE_SIZE, TAG_SIZE};
use crate::error::{Error, Result};

/// A nonce (number used once) for AEAD operations.
///
/// The high 4 bytes are zero; the low 8 bytes carry a big-endian 64-bit
/// frame counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Create a nonce from a 64-bit counter value.
    pub fn new(counter: u64) -> Self {
        let mut nonce = [0u8; NONCE_SIZE];
        nonce[4..12].copy_from_slice(&counter.to_be_bytes());
        Self(nonce)
    }

    /// Get the raw nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    /// Get the counter value encoded in this nonce.
    pub fn counter(&self) -> u64 {
        let mut ctr = [0u8; 8];
        ctr.copy_from_slice(&self.0[4..12]);
        u64::from_be_bytes(ctr)
    }
}

impl From<u64> for Nonce {
    fn from(counter: u64) -> Self {
        Self::new(counter)
    }
}

/// ChaCha20-Poly1305 cipher bound to one session key.
#[derive(Clone)]
pub struct Aead {
    cipher: ChaCha20Poly1305,
}

impl Aead {
    /// Create a new AEAD instance with the given session key.
    pub fn new(key: &SessionKey) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(key.as_bytes().into()),
        }
    }

    /// Encrypt a plaintext, returning ciphertext with the 16-byte tag appended.
    ///
    /// The nonce must be unique for this key.
    pub fn seal(&self, nonce: &Nonce, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.cipher
            .encrypt(nonce.as_bytes().into(), plaintext)
            .map_err(|_| Error::crypto("frame encryption failed"))
    }

    /// Decrypt a ciphertext produced by [`Aead::seal`].
    ///
    /// # Errors
    ///
    /// Fails when authentication fails: wrong key, wrong nonce, or a
    /// tampered ciphertext.
    pub fn open(&self, nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(Error::crypto("ciphertext shorter than tag"));
        }

        self.cipher
            .decrypt(nonce.as_bytes().into(), ciphertext)
            .map_err(|_| Error::crypto("frame authentication failed"))
    }
}
