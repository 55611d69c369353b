use crate::utils::sha256_hex;
use serde::{Deserialize, Serialize};

/// A peer in the overlay network. The DHT keys peers by the SHA-256 of
/// their node id, never by the raw id itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerNode {
    node_id: String,
    ip: String,
    port: u16,
}

impl PeerNode {
    pub fn new(node_id: &str, ip: &str, port: u16) -> PeerNode {
        PeerNode {
            node_id: node_id.to_string(),
            ip: ip.to_string(),
            port,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` form used for TCP dialing.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Lowercase hex SHA-256 of the node id, the peer's key in the DHT.
    pub fn hashed_id(&self) -> String {
        sha256_hex(self.node_id.as_bytes())
    }
}
