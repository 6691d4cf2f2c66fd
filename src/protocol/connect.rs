//! Connect payload codec.
//!
//! The plaintext of the first DATA frame names the upstream destination:
//!
//! ```text
//! cmd     : 1 byte   (0x01 CONNECT)
//! atyp    : 1 byte   (0x01 IPv4 | 0x03 Domain | 0x04 IPv6)
//! addr    : 4 | (1+len) | 16 bytes
//! port    : u16 big-endian
//! opt_len : 1 byte
//! opts    : opt_len bytes
//! initial : remainder (first upstream bytes, may be empty)
//! ```

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};

/// CONNECT command byte; the only command the inbound supports.
pub const CMD_CONNECT: u8 = 0x01;

/// IPv4 address family tag.
pub const ATYP_IPV4: u8 = 0x01;
/// Domain-name address family tag.
pub const ATYP_DOMAIN: u8 = 0x03;
/// IPv6 address family tag.
pub const ATYP_IPV6: u8 = 0x04;

/// Target address of an upstream connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    /// Literal IPv4 address
    Ipv4(Ipv4Addr),
    /// Domain name, resolved by the dispatcher
    Domain(String),
    /// Literal IPv6 address
    Ipv6(Ipv6Addr),
}

/// A TCP destination parsed from a connect payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Host part
    pub addr: TargetAddr,
    /// TCP port
    pub port: u16,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.addr {
            TargetAddr::Ipv4(ip) => write!(f, "{}:{}", ip, self.port),
            TargetAddr::Domain(d) => write!(f, "{}:{}", d, self.port),
            TargetAddr::Ipv6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

/// Decoded connect request from the first data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPayload {
    /// Where the dispatcher should connect
    pub dest: Destination,
    /// Opaque per-connection options
    pub options: Vec<u8>,
    /// Bytes to deliver upstream before the frame loop starts
    pub initial: Vec<u8>,
}

impl ConnectPayload {
    /// Parse a connect payload from frame plaintext.
    pub fn parse(b: &[u8]) -> Result<Self> {
        if b.len() < 5 {
            return Err(Error::protocol("connect payload too short"));
        }
        if b[0] != CMD_CONNECT {
            return Err(Error::protocol(format!(
                "unsupported command: 0x{:02x}",
                b[0]
            )));
        }

        let atyp = b[1];
        let mut i = 2;

        let addr = match atyp {
            ATYP_IPV4 => {
                if b.len() < i + 4 + 2 + 1 {
                    return Err(Error::protocol("ipv4 payload too short"));
                }
                let addr = Ipv4Addr::new(b[i], b[i + 1], b[i + 2], b[i + 3]);
                i += 4;
                TargetAddr::Ipv4(addr)
            }
            ATYP_IPV6 => {
                if b.len() < i + 16 + 2 + 1 {
                    return Err(Error::protocol("ipv6 payload too short"));
                }
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&b[i..i + 16]);
                i += 16;
                TargetAddr::Ipv6(Ipv6Addr::from(octets))
            }
            ATYP_DOMAIN => {
                if b.len() < i + 1 + 2 + 1 {
                    return Err(Error::protocol("domain payload too short"));
                }
                let len = b[i] as usize;
                i += 1;
                if b.len() < i + len + 2 + 1 {
                    return Err(Error::protocol("domain payload too short"));
                }
                let domain = String::from_utf8_lossy(&b[i..i + len]).into_owned();
                i += len;
                TargetAddr::Domain(domain)
            }
            other => {
                return Err(Error::protocol(format!(
                    "unknown address type: 0x{:02x}",
                    other
                )))
            }
        };

        let port = u16::from_be_bytes([b[i], b[i + 1]]);
        i += 2;

        let opt_len = b[i] as usize;
        i += 1;

        if b.len() < i + opt_len {
            return Err(Error::protocol("options truncated"));
        }
        let options = b[i..i + opt_len].to_vec();
        i += opt_len;

        Ok(Self {
            dest: Destination { addr, port },
            options,
            initial: b[i..].to_vec(),
        })
    }

    /// Encode a connect payload into frame plaintext.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(22 + self.options.len() + self.initial.len());
        out.push(CMD_CONNECT);
        match &self.dest.addr {
            TargetAddr::Ipv4(ip) => {
                out.push(ATYP_IPV4);
                out.extend_from_slice(&ip.octets());
            }
            TargetAddr::Domain(d) => {
                out.push(ATYP_DOMAIN);
                out.push(d.len() as u8);
                out.extend_from_slice(d.as_bytes());
            }
            TargetAddr::Ipv6(ip) => {
                out.push(ATYP_IPV6);
                out.extend_from_slice(&ip.octets());
            }
        }
        out.extend_from_slice(&self.dest.port.to_be_bytes());
        out.push(self.options.len() as u8);
        out.extend_from_slice(&self.options);
        out.extend_from_slice(&self.initial);
        out
    }
}
