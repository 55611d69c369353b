use crate::core::{MemoryFragment, Transaction};
use crate::error::{ChainError, Result};
use crate::utils::{decode, encode, sha256_hex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    index: u64,
    timestamp: u64,
    transactions: Vec<Transaction>,
    memory: MemoryFragment,
    previous_hash: String,
    difficulty: u32,
    memory_proof: String,
    stake_weight: u64,
    shard_id: String,
    hash: String,
}

impl Block {
    /// Assemble an unsealed draft. The memory fragment's remote URL must
    /// already be bound; the proof and hash are stamped by the miner.
    #[allow(clippy::too_many_arguments)]
    pub fn draft(
        index: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        memory: MemoryFragment,
        previous_hash: String,
        difficulty: u32,
        stake_weight: u64,
        shard_id: String,
    ) -> Result<Block> {
        if difficulty == 0 {
            return Err(ChainError::InvalidEntity(
                "Difficulty must be at least 1".to_string(),
            ));
        }
        if shard_id.is_empty() {
            return Err(ChainError::InvalidEntity(
                "Block shard id must not be empty".to_string(),
            ));
        }
        memory.validate()?;

        Ok(Block {
            index,
            timestamp,
            transactions,
            memory,
            previous_hash,
            difficulty,
            memory_proof: String::new(),
            stake_weight,
            shard_id,
            hash: String::new(),
        })
    }

    /// The hash preimage: index, timestamp, every transaction fingerprint in
    /// block order, the artifact URL, chain link, proof nonce, declared
    /// stake, and shard id, numbers rendered as decimal ASCII.
    fn hash_preimage(&self) -> String {
        let mut preimage = String::new();
        preimage.push_str(&self.index.to_string());
        preimage.push_str(&self.timestamp.to_string());
        for tx in &self.transactions {
            preimage.push_str(&tx.fingerprint());
        }
        preimage.push_str(self.memory.remote_url());
        preimage.push_str(&self.previous_hash);
        preimage.push_str(&self.memory_proof);
        preimage.push_str(&self.stake_weight.to_string());
        preimage.push_str(&self.shard_id);
        preimage
    }

    pub fn compute_hash(&self) -> String {
        sha256_hex(self.hash_preimage().as_bytes())
    }

    /// Stamp a candidate proof nonce and refresh the hash.
    pub fn apply_proof(&mut self, memory_proof: String) {
        self.memory_proof = memory_proof;
        self.hash = self.compute_hash();
    }

    /// Whether a hash meets a difficulty: its first `difficulty` hex
    /// characters are zero.
    pub fn hash_meets_difficulty(hash: &str, difficulty: u32) -> bool {
        hash.chars().take(difficulty as usize).all(|c| c == '0')
            && hash.len() >= difficulty as usize
    }

    /// Structural self-check: the recorded hash recomputes, the difficulty
    /// prefix holds, the memory fragment is sound, and system grants appear
    /// only in a genesis block. Chain linkage and fingerprint freshness are
    /// the engine's business.
    pub fn validate_structure(&self) -> Result<()> {
        if self.hash != self.compute_hash() {
            return Err(ChainError::InvalidEntity(format!(
                "Block {} hash does not recompute",
                self.index
            )));
        }
        if !Self::hash_meets_difficulty(&self.hash, self.difficulty) {
            return Err(ChainError::InvalidEntity(format!(
                "Block {} hash misses difficulty {}",
                self.index, self.difficulty
            )));
        }
        self.memory.validate()?;
        for tx in &self.transactions {
            tx.validate()?;
            if tx.is_system() && self.index != 0 {
                return Err(ChainError::InvalidEntity(
                    "System grants are only admissible in a genesis block".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Sum of the fees carried by this block's transactions.
    pub fn total_fees(&self) -> u64 {
        self.transactions.iter().map(|tx| tx.fee()).sum()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn memory(&self) -> &MemoryFragment {
        &self.memory
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn memory_proof(&self) -> &str {
        &self.memory_proof
    }

    pub fn stake_weight(&self) -> u64 {
        self.stake_weight
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        decode::<Block>(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;

    fn draft_block(difficulty: u32) -> Block {
        let mut tx = Transaction::with_timestamp("alice", "bob", 10, 1, None, 1).unwrap();
        tx.set_shard("0");
        Block::draft(
            1,
            2,
            vec![tx],
            MemoryFragment::empty("miner"),
            "0".to_string(),
            difficulty,
            0,
            "0".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_difficulty_prefix_rule() {
        assert!(Block::hash_meets_difficulty("00ab", 2));
        assert!(!Block::hash_meets_difficulty("0ab0", 2));
        assert!(Block::hash_meets_difficulty("abc", 0));
        assert!(!Block::hash_meets_difficulty("0", 2));
    }

    #[test]
    fn test_draft_rejects_zero_difficulty() {
        let result = Block::draft(
            0,
            1,
            vec![],
            MemoryFragment::empty("miner"),
            "0".to_string(),
            0,
            0,
            "0".to_string(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_proof_changes_hash() {
        let mut block = draft_block(1);
        block.apply_proof("17".to_string());
        let first = block.hash().to_string();
        assert_eq!(first, block.compute_hash());

        block.apply_proof("42".to_string());
        assert_ne!(first, block.hash());
    }

    #[test]
    fn test_validate_structure_detects_tampering() {
        let mut block = draft_block(1);
        // Find a sealing proof by scanning the nonce space directly.
        for nonce in 0u16..=255 {
            block.apply_proof(nonce.to_string());
            if Block::hash_meets_difficulty(block.hash(), 1) {
                break;
            }
        }
        assert!(block.validate_structure().is_ok());

        let serialized = block.serialize().unwrap();
        let mut reloaded = Block::deserialize(&serialized).unwrap();
        assert_eq!(block, reloaded);

        // Mutating the proof without resealing must fail the recompute check.
        reloaded.memory_proof = "9999".to_string();
        assert!(reloaded.validate_structure().is_err());
    }

    #[test]
    fn test_system_grant_rejected_outside_genesis() {
        let grant = Transaction::system_grant("genesis", 100, "0").unwrap();
        let mut block = Block::draft(
            3,
            2,
            vec![grant],
            MemoryFragment::empty("miner"),
            "abc".to_string(),
            1,
            0,
            "0".to_string(),
        )
        .unwrap();
        for nonce in 0u16..=255 {
            block.apply_proof(nonce.to_string());
            if Block::hash_meets_difficulty(block.hash(), 1) {
                break;
            }
        }
        assert!(block.validate_structure().is_err());
    }
}
