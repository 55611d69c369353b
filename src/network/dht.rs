// Distributed hash table over the overlay peers. Lookup distance is XOR
// over the full 32-byte hashed id, compared big-endian; a truncated or
// numeric-prefix distance would lose precision past 64 bits.

use crate::network::node::PeerNode;
use crate::utils::sha256_digest;
use log::{info, warn};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs, UdpSocket};
use std::sync::RwLock;
use std::time::Duration;

/// UTF-8 literal a joining node sends to a seed to request its peer list
pub const BOOTSTRAP_REQUEST: &[u8] = b"BOOTSTRAP_REQUEST";

/// 5-byte datagram used to open NAT state toward a peer
pub const PUNCH: &[u8] = b"PUNCH";

const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(5);
const PUNCH_RETRIES: usize = 3;
const BOOTSTRAP_REPLY_CAP: u64 = 64 * 1024;

pub struct DhtRegistry {
    // Keyed by hashed node id (lowercase hex)
    peers: RwLock<HashMap<String, PeerNode>>,
    fallback_seeds: Vec<(String, u16)>,
}

impl Default for DhtRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DhtRegistry {
    pub fn new() -> DhtRegistry {
        DhtRegistry {
            peers: RwLock::new(HashMap::new()),
            fallback_seeds: Vec::new(),
        }
    }

    pub fn with_fallback_seeds(seeds: Vec<(String, u16)>) -> DhtRegistry {
        DhtRegistry {
            peers: RwLock::new(HashMap::new()),
            fallback_seeds: seeds,
        }
    }

    pub fn add_peer(&self, node: PeerNode) {
        match self.peers.write() {
            Ok(mut peers) => {
                peers.insert(node.hashed_id(), node);
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on peer table");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.peers.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn peers(&self) -> Vec<PeerNode> {
        self.peers
            .read()
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Up to `k` peers closest to `target_id` by XOR distance over the
    /// hashed ids, excluding the target itself. Equal distances break
    /// lexicographically on the hashed id.
    pub fn find_peers(&self, target_id: &str, k: usize) -> Vec<PeerNode> {
        let target = sha256_digest(target_id.as_bytes());

        let mut candidates: Vec<(Vec<u8>, String, PeerNode)> = self
            .peers()
            .into_iter()
            .filter(|node| node.node_id() != target_id)
            .map(|node| {
                let hashed = sha256_digest(node.node_id().as_bytes());
                let distance = xor_distance(&hashed, &target);
                (distance, node.hashed_id(), node)
            })
            .collect();

        candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        candidates
            .into_iter()
            .take(k)
            .map(|(_, _, node)| node)
            .collect()
    }

    /// Join the overlay through a seed node: send the bootstrap literal,
    /// ingest the JSON peer list that comes back. Every configured
    /// fallback seed is tried in turn; after the last one the failure is
    /// swallowed and the node starts with an empty table.
    pub fn bootstrap(&self, host: &str, port: u16) {
        let mut seeds = vec![(host.to_string(), port)];
        seeds.extend(self.fallback_seeds.iter().cloned());

        for (seed_host, seed_port) in seeds {
            match self.bootstrap_from(&seed_host, seed_port) {
                Ok(count) => {
                    info!("Bootstrapped {count} peers from {seed_host}:{seed_port}");
                    return;
                }
                Err(e) => {
                    warn!("Bootstrap via {seed_host}:{seed_port} failed: {e}");
                }
            }
        }
        warn!("All bootstrap seeds exhausted, starting with an empty peer table");
    }

    fn bootstrap_from(&self, host: &str, port: u16) -> std::io::Result<usize> {
        let addrs: Vec<_> = (host, port).to_socket_addrs()?.collect();
        let addr = addrs.first().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "Seed did not resolve")
        })?;

        let mut stream = TcpStream::connect_timeout(addr, BOOTSTRAP_TIMEOUT)?;
        stream.set_read_timeout(Some(BOOTSTRAP_TIMEOUT))?;
        stream.set_write_timeout(Some(BOOTSTRAP_TIMEOUT))?;
        stream.write_all(BOOTSTRAP_REQUEST)?;
        stream.shutdown(Shutdown::Write)?;

        let mut reply = Vec::new();
        stream.take(BOOTSTRAP_REPLY_CAP).read_to_end(&mut reply)?;

        let peers: Vec<PeerNode> = serde_json::from_slice(&reply).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        let count = peers.len();
        for peer in peers {
            self.add_peer(peer);
        }
        Ok(count)
    }

    /// Open NAT traversal state toward a peer with a tiny UDP datagram.
    pub fn punch_hole(&self, ip: &str, port: u16) -> bool {
        let socket = match UdpSocket::bind("0.0.0.0:0") {
            Ok(socket) => socket,
            Err(e) => {
                warn!("Failed to bind UDP socket for hole punch: {e}");
                return false;
            }
        };

        for attempt in 1..=PUNCH_RETRIES {
            match socket.send_to(PUNCH, (ip, port)) {
                Ok(_) => return true,
                Err(e) => warn!("Hole punch to {ip}:{port} attempt {attempt} failed: {e}"),
            }
        }
        false
    }
}

/// Byte-wise XOR of two 32-byte digests; big-endian comparison of the
/// result orders peers by closeness.
fn xor_distance(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::sha256_digest;

    #[test]
    fn test_add_peer_is_keyed_by_hashed_id() {
        let dht = DhtRegistry::new();
        dht.add_peer(PeerNode::new("a", "127.0.0.1", 1));
        dht.add_peer(PeerNode::new("a", "127.0.0.1", 2)); // same id, replaces
        dht.add_peer(PeerNode::new("b", "127.0.0.1", 3));
        assert_eq!(dht.len(), 2);
    }

    #[test]
    fn test_find_peers_orders_by_xor_distance() {
        let dht = DhtRegistry::new();
        for id in ["n1", "n2", "n3", "n4", "n5"] {
            dht.add_peer(PeerNode::new(id, "127.0.0.1", 6000));
        }

        let found = dht.find_peers("target", 3);
        assert_eq!(found.len(), 3);

        // Returned peers really are the closest by full-width XOR distance
        let target = sha256_digest(b"target");
        let mut all: Vec<(Vec<u8>, String)> = ["n1", "n2", "n3", "n4", "n5"]
            .iter()
            .map(|id| {
                let hashed = sha256_digest(id.as_bytes());
                (xor_distance(&hashed, &target), id.to_string())
            })
            .collect();
        all.sort();
        let expected: Vec<String> = all.into_iter().take(3).map(|(_, id)| id).collect();
        let got: Vec<String> = found.iter().map(|n| n.node_id().to_string()).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_find_peers_excludes_the_target() {
        let dht = DhtRegistry::new();
        dht.add_peer(PeerNode::new("me", "127.0.0.1", 6000));
        dht.add_peer(PeerNode::new("other", "127.0.0.1", 6001));

        let found = dht.find_peers("me", 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node_id(), "other");
    }

    #[test]
    fn test_punch_hole_reaches_a_local_socket() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let dht = DhtRegistry::new();
        assert!(dht.punch_hole("127.0.0.1", port));

        let mut buf = [0u8; 16];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], PUNCH);
    }
}
