//! Peer-to-peer networking
//!
//! Peer discovery over a DHT keyed by hashed node ids, plus the TCP
//! gossip transport that moves sealed blocks between nodes.

pub mod dht;
pub mod gossip;
pub mod node;

pub use dht::{DhtRegistry, BOOTSTRAP_REQUEST, PUNCH};
pub use gossip::{Broadcaster, GossipListener, Package};
pub use node::PeerNode;
