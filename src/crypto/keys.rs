//! X25519 key agreement primitives.
//!
//! Type-safe wrappers around X25519 operations. Every Reflex session uses a
//! fresh server keypair, so only ephemeral secrets exist here; the dalek
//! types zeroize themselves on drop.

use rand_core::OsRng;
use x25519_dalek::{
    EphemeralSecret as DalekEphemeral, PublicKey as DalekPublic, SharedSecret as DalekShared,
};

use crate::crypto::PUBLIC_KEY_SIZE;

/// An ephemeral (single-use) X25519 secret key.
///
/// Generated fresh for each accepted handshake, giving forward secrecy.
pub struct EphemeralSecret(DalekEphemeral);

impl EphemeralSecret {
    /// Generate a new random ephemeral secret from the OS CSPRNG.
    pub fn random() -> Self {
        Self(DalekEphemeral::random_from_rng(OsRng))
    }

    /// Perform X25519 Diffie-Hellman key agreement, consuming the secret.
    pub fn diffie_hellman(self, their_public: &PublicKey) -> SharedSecret {
        SharedSecret(self.0.diffie_hellman(&their_public.0))
    }
}

impl From<&EphemeralSecret> for PublicKey {
    fn from(secret: &EphemeralSecret) -> Self {
        PublicKey(DalekPublic::from(&secret.0))
    }
}

/// An X25519 public key.
///
/// Safe to share publicly; the server's key travels hex-encoded in the
/// handshake response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(DalekPublic);

impl PublicKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(DalekPublic::from(bytes))
    }

    /// Get the raw bytes of this public key.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }

    /// Convert to raw bytes.
    pub fn to_bytes(self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// The result of an X25519 Diffie-Hellman key exchange.
pub struct SharedSecret(DalekShared);

impl SharedSecret {
    /// Get the raw shared secret bytes.
    ///
    /// # Security
    ///
    /// Feed this into the session KDF before use as a key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Whether the exchange produced the all-zero output.
    ///
    /// An all-zero shared secret means the peer supplied a low-order public
    /// key; the handshake processor treats it as an authentication failure.
    pub fn is_zero(&self) -> bool {
        self.0.as_bytes().iter().all(|&b| b == 0)
    }
}
