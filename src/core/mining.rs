use crate::core::Block;
use crate::error::{ChainError, Result};
use log::debug;
use rand::Rng;

/// Attempt budget for a single sealing run
pub const MAX_MINING_ATTEMPTS: u64 = 1_000_000;

/// Seals draft blocks under the hybrid admission rule: the hash must carry
/// the shard's difficulty prefix, and a non-zero declared stake weight must
/// be covered by the miner's actual stake.
pub struct MemoryMiner {
    max_attempts: u64,
}

impl Default for MemoryMiner {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMiner {
    pub fn new() -> MemoryMiner {
        MemoryMiner {
            max_attempts: MAX_MINING_ATTEMPTS,
        }
    }

    /// Mostly for tests that want a fast exhaustion path.
    pub fn with_attempt_budget(max_attempts: u64) -> MemoryMiner {
        MemoryMiner { max_attempts }
    }

    /// Run the proof search. Each attempt draws a fresh uniform byte,
    /// renders it as decimal into `memory_proof`, and recomputes the hash
    /// until the difficulty prefix holds. The stake gate is constant across
    /// the loop, so it is checked before any hashing happens.
    pub fn seal(&self, mut block: Block, miner_stake: u64) -> Result<Block> {
        if block.stake_weight() > 0 && miner_stake < block.stake_weight() {
            return Err(ChainError::StakeTooLow {
                declared: block.stake_weight(),
                held: miner_stake,
            });
        }

        let difficulty = block.difficulty();
        let mut rng = rand::thread_rng();
        for attempt in 0..self.max_attempts {
            let nonce: u8 = rng.gen();
            block.apply_proof(nonce.to_string());
            if Block::hash_meets_difficulty(block.hash(), difficulty) {
                debug!(
                    "Sealed block {} on shard {} after {} attempts: {}",
                    block.index(),
                    block.shard_id(),
                    attempt + 1,
                    block.hash()
                );
                return Ok(block);
            }
        }

        Err(ChainError::MiningExhausted(format!(
            "No conforming hash for shard {} block {} within {} attempts at difficulty {}",
            block.shard_id(),
            block.index(),
            self.max_attempts,
            difficulty
        )))
    }
}
