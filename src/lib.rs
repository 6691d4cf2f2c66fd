//! # Reflex
//!
//! A traffic-obfuscating proxy protocol. An inbound handler discriminates
//! between three wire dialects on each accepted TCP connection, performs a
//! one-round-trip authenticated key agreement, and runs an AEAD-framed
//! session that tunnels bytes to an upstream destination.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   Accepted connection                     │
//! ├──────────────────────────────────────────────────────────┤
//! │  Dialect dispatch (peek, no bytes consumed)               │
//! │    magic ─► binary handshake ─┐                           │
//! │    POST  ─► HTTP handshake  ──┤─► replay ► auth ► X25519  │
//! │    other ─► fallback splice   │   ► session key ► driver  │
//! ├──────────────────────────────────────────────────────────┤
//! │  Session layer: [len:2][type:1][ciphertext] frames,       │
//! │  ChaCha20-Poly1305, per-direction counter nonces          │
//! ├──────────────────────────────────────────────────────────┤
//! │  Dispatch seam: host-provided upstream links              │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Goals
//!
//! 1. **Indistinguishability**: every response is HTTP-shaped, and
//!    non-protocol traffic is spliced to a real web backend
//! 2. **Forward secrecy**: fresh X25519 keypair per accepted handshake
//! 3. **Replay resistance**: timestamp window plus a TTL'd nonce cache
//! 4. **Byte conservation**: dialect detection never loses client bytes

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod inbound;
pub mod protocol;

pub use error::{Error, Result};
