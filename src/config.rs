//! Configuration surface.
//!
//! The server binary loads a JSON file of this shape:
//!
//! ```json
//! {
//!     "listen": "0.0.0.0:8443",
//!     "inbound": {
//!         "clients": [
//!             { "id": "10325476-98ba-dcfe-1032-547698badcfe", "policy": "standard" }
//!         ],
//!         "fallback": { "dest": 8080 }
//!     },
//!     "outbound": { "address": "proxy.example.com", "port": 8443, "id": "..." }
//! }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// One permitted client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// User id; must parse as a UUID
    pub id: String,
    /// Opaque policy label
    #[serde(default)]
    pub policy: String,
}

/// Where non-Reflex traffic is forwarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// TCP port on 127.0.0.1
    pub dest: u16,
}

/// Inbound handler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundConfig {
    /// Permitted clients
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
    /// Optional fallback backend for disguise traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackConfig>,
}

/// Outbound peer configuration.
///
/// Referenced by deployments that chain through another Reflex server; the
/// inbound core only validates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundConfig {
    /// Remote server address
    pub address: String,
    /// Remote server port
    pub port: u16,
    /// Optional user id; must parse as a UUID when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl OutboundConfig {
    /// Validate the outbound entry.
    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(Error::config("outbound address cannot be empty"));
        }
        if let Some(id) = &self.id {
            Uuid::parse_str(id)
                .map_err(|e| Error::Config(format!("invalid outbound id {:?}: {}", id, e)))?;
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflexConfig {
    /// Listen address for the inbound server
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Inbound handler settings
    pub inbound: InboundConfig,
    /// Optional outbound peer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound: Option<OutboundConfig>,
}

fn default_listen() -> String {
    "0.0.0.0:8443".to_string()
}

impl ReflexConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::Config(format!("invalid config: {}", e)))
    }

    /// Validate ids and addresses without building a handler.
    pub fn validate(&self) -> Result<()> {
        for client in &self.inbound.clients {
            Uuid::parse_str(&client.id)
                .map_err(|e| Error::Config(format!("invalid client id {:?}: {}", client.id, e)))?;
        }
        if let Some(outbound) = &self.outbound {
            outbound.validate()?;
        }
        Ok(())
    }
}
