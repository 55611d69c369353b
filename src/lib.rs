//! # Ahmiyat - a peer-to-peer sharded ledger node
//!
//! Each node maintains one or more shards of an append-only chain of
//! cryptographically linked blocks, accepts signed value-transfer
//! transactions, mines under a hybrid proof-of-work / stake-weighted
//! admission rule, persists the chain to an embedded key-value store,
//! and gossips sealed blocks to peers discovered through a DHT.
//!
//! ## Layout
//! - `core/`: transactions, blocks, shard state, routing, mining, and the
//!   chain engine that owns every invariant
//! - `network/`: the DHT peer registry and the TCP gossip transport
//! - `storage/`: the sled block store, the pending pool, and the artifact
//!   store behind block memory fragments
//! - `api/`: the HTTP gateway (balance, status, metrics, submission)
//! - `wallet/`: secp256k1 key management for clients and the CLI
//! - `config/`: node-level settings; `cli/`: argument parsing
//!
//! ## Key design decisions
//! - Amounts are integer micro-coins everywhere inside the node, so the
//!   conservation invariants hold exactly; floats exist only at the HTTP
//!   boundary
//! - A transaction's identity is the SHA-256 fingerprint of an injective
//!   canonical encoding; the processed-fingerprint set enforces
//!   at-most-once application across mining and gossip
//! - Per-shard state sits behind its own mutex, never held across mining,
//!   network sends, or artifact uploads; cross-shard transfers take both
//!   locks in lexicographic shard-id order

pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use crate::cli::{Command, Opt};
pub use crate::config::NodeConfig;
pub use crate::core::{
    Block, BlockAnnouncer, ChainConfig, ChainEngine, MemoryFragment, MemoryMiner, ShardRouter,
    ShardState, Transaction,
};
pub use crate::error::{ChainError, Result};
pub use crate::network::{Broadcaster, DhtRegistry, GossipListener, PeerNode};
pub use crate::storage::{ArtifactStore, BlockStore, ContentAddressedStore, PendingPool};
pub use crate::wallet::Wallet;
