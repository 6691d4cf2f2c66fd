//! Cryptographic primitives for Reflex.
//!
//! This module provides:
//! - X25519 key agreement for the one-round-trip handshake
//! - SHA-256 based session key derivation
//! - ChaCha20-Poly1305 AEAD for the framed session
//! - Secure random number generation
//!
//! Secret material is zeroized on drop to prevent memory leakage.

mod aead;
mod kdf;
mod keys;
mod random;

pub use aead::{Aead, Nonce};
pub use kdf::SessionKey;
pub use keys::{EphemeralSecret, PublicKey, SharedSecret};
pub use random::SecureRandom;

/// Size of symmetric keys in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of AEAD nonce in bytes (96 bits for ChaCha20-Poly1305)
pub const NONCE_SIZE: usize = 12;

/// Size of AEAD authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of X25519 public keys in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_key_agreement_and_encryption() {
        // Client generates its keypair for the handshake
        let client_secret = EphemeralSecret::random();
        let client_public = PublicKey::from(&client_secret);

        // Server does the same on accept
        let server_secret = EphemeralSecret::random();
        let server_public = PublicKey::from(&server_secret);

        // Both sides compute the shared secret
        let client_shared = client_secret.diffie_hellman(&server_public);
        let server_shared = server_secret.diffie_hellman(&client_public);
        assert_eq!(client_shared.as_bytes(), server_shared.as_bytes());

        // Both derive the same session key
        let client_key = SessionKey::derive(&client_shared);
        let server_key = SessionKey::derive(&server_shared);
        assert_eq!(client_key.as_bytes(), server_key.as_bytes());

        // And the key actually encrypts
        let aead = Aead::new(&client_key);
        let nonce = Nonce::new(0);
        let ciphertext = aead.seal(&nonce, b"hello reflex").unwrap();

        let peer = Aead::new(&server_key);
        let plaintext = peer.open(&nonce, &ciphertext).unwrap();
        assert_eq!(plaintext, b"hello reflex");
    }
}
