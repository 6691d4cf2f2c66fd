//! The Reflex wire protocol.
//!
//! Three layers live here:
//! - [`handshake`]: the client handshake record in its binary and
//!   HTTP-payload encodings
//! - [`connect`]: the connect payload carried by the first data frame
//! - [`session`]: the length-prefixed AEAD record layer used after key
//!   agreement

pub mod connect;
pub mod handshake;
pub mod session;

pub use connect::{ConnectPayload, Destination, TargetAddr};
pub use handshake::ClientHandshake;
pub use session::{Frame, FrameType, Session, SessionReader, SessionWriter};

/// Magic word opening the binary handshake dialect, sent big-endian on the
/// wire.
pub const REFLEX_MAGIC: u32 = 0x5246_584C;
