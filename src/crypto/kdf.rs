//! Session key derivation.
//!
//! The per-session symmetric key is the SHA-256 digest of the X25519 shared
//! secret concatenated with a fixed context label. Both ends compute it
//! independently after the one-round-trip handshake.

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{SharedSecret, KEY_SIZE};

/// Context label mixed into the session key digest.
pub const SESSION_CONTEXT: &[u8] = b"reflex-session";

/// A 32-byte symmetric session key.
///
/// Automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    /// Derive the session key from an X25519 shared secret.
    ///
    /// Computes `SHA-256(shared ‖ "reflex-session")`.
    pub fn derive(shared: &SharedSecret) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(shared.as_bytes());
        hasher.update(SESSION_CONTEXT);
        Self(hasher.finalize().into())
    }

    /// Create a session key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw key bytes.
    ///
    /// # Security
    ///
    /// Handle with care, this is secret key material.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}
