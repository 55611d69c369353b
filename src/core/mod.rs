//! Core ledger functionality
//!
//! The fundamental chain components: transactions, blocks, memory
//! fragments, shard state, routing, mining, and the engine that ties the
//! invariants together.

pub mod block;
pub mod engine;
pub mod memory;
pub mod mining;
pub mod router;
pub mod shard;
pub mod supply;
pub mod transaction;

pub use block::Block;
pub use engine::{BlockAnnouncer, ChainConfig, ChainEngine, UpgradeProposal};
pub use memory::MemoryFragment;
pub use mining::{MemoryMiner, MAX_MINING_ATTEMPTS};
pub use router::ShardRouter;
pub use shard::ShardState;
pub use supply::{
    coins_to_micros, micros_to_coins, RewardSchedule, GENESIS_GRANT, HALVING_INTERVAL,
    INITIAL_BLOCK_REWARD, INITIAL_DIFFICULTY, INITIAL_STAKING_REWARD, MAX_SHARDS, MAX_SUPPLY,
    MICROS_PER_COIN, TARGET_BLOCK_TIME,
};
pub use transaction::{Transaction, SYSTEM_SENDER};
