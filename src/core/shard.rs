use crate::core::supply::micros_to_coins;
use crate::core::{Block, Transaction};
use crate::error::{ChainError, Result};
use crate::utils::sha256_hex;
use std::collections::HashMap;

/// State of a single shard: its block sequence, balance and stake tables,
/// and current difficulty. A shard is only ever mutated under its own lock,
/// owned by the chain engine.
pub struct ShardState {
    shard_id: String,
    blocks: Vec<Block>,
    balances: HashMap<String, u64>,
    stakes: HashMap<String, u64>,
    difficulty: u32,
}

impl ShardState {
    pub fn new(shard_id: &str, difficulty: u32) -> ShardState {
        ShardState {
            shard_id: shard_id.to_string(),
            blocks: Vec::new(),
            balances: HashMap::new(),
            stakes: HashMap::new(),
            difficulty,
        }
    }

    /// Hash of the current tip, or "0" for an empty shard.
    pub fn tip_hash(&self) -> String {
        self.blocks
            .last()
            .map(|b| b.hash().to_string())
            .unwrap_or_else(|| "0".to_string())
    }

    pub fn next_index(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn contains_block(&self, hash: &str) -> bool {
        self.blocks.iter().any(|b| b.hash() == hash)
    }

    pub fn append_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn balance_of(&self, address: &str) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    pub fn stake_of(&self, address: &str) -> u64 {
        self.stakes.get(address).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, address: &str, amount: u64) {
        *self.balances.entry(address.to_string()).or_insert(0) += amount;
    }

    pub fn debit(&mut self, address: &str, amount: u64) -> Result<()> {
        let balance = self.balance_of(address);
        if balance < amount {
            return Err(ChainError::InsufficientBalance {
                required: amount,
                available: balance,
            });
        }
        self.balances.insert(address.to_string(), balance - amount);
        Ok(())
    }

    /// Apply a validated transaction to the balance table. The sender pays
    /// amount plus fee; the receiver is credited the amount; fees are
    /// credited to the miner by the commit path. A script predicate gates
    /// on the sender's balance at application time.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<()> {
        if tx.is_system() {
            self.credit(tx.receiver(), tx.amount());
            return Ok(());
        }

        if let Some(threshold) = tx.script_threshold() {
            let balance = self.balance_of(tx.sender());
            if balance < threshold {
                return Err(ChainError::InvalidEntity(format!(
                    "Script predicate unmet: balance {balance} below threshold {threshold}"
                )));
            }
        }

        self.debit(tx.sender(), tx.amount() + tx.fee())?;
        self.credit(tx.receiver(), tx.amount());
        Ok(())
    }

    /// Dry-run a transaction sequence against a copy of the balance table,
    /// so block commits either apply completely or not at all.
    pub fn check_applicable(&self, txs: &[Transaction]) -> Result<()> {
        let mut balances = self.balances.clone();
        for tx in txs {
            if tx.is_system() {
                *balances.entry(tx.receiver().to_string()).or_insert(0) += tx.amount();
                continue;
            }
            let balance = balances.get(tx.sender()).copied().unwrap_or(0);
            if let Some(threshold) = tx.script_threshold() {
                if balance < threshold {
                    return Err(ChainError::InvalidEntity(format!(
                        "Script predicate unmet: balance {balance} below threshold {threshold}"
                    )));
                }
            }
            let required = tx.amount() + tx.fee();
            if balance < required {
                return Err(ChainError::InsufficientBalance {
                    required,
                    available: balance,
                });
            }
            balances.insert(tx.sender().to_string(), balance - required);
            *balances.entry(tx.receiver().to_string()).or_insert(0) += tx.amount();
        }
        Ok(())
    }

    /// Keep the transactions that would apply cleanly in sequence against
    /// the current balances, dropping the rest. Used at block construction
    /// so one underfunded sender cannot sink a whole candidate.
    pub fn filter_applicable(&self, txs: Vec<Transaction>) -> Vec<Transaction> {
        let mut balances = self.balances.clone();
        let mut kept = Vec::with_capacity(txs.len());
        for tx in txs {
            if tx.is_system() {
                *balances.entry(tx.receiver().to_string()).or_insert(0) += tx.amount();
                kept.push(tx);
                continue;
            }
            let balance = balances.get(tx.sender()).copied().unwrap_or(0);
            let required = tx.amount() + tx.fee();
            let below_script = tx.script_threshold().is_some_and(|t| balance < t);
            if balance < required || below_script {
                log::warn!(
                    "Dropping inapplicable transaction {} on shard {}",
                    tx.fingerprint(),
                    self.shard_id
                );
                continue;
            }
            balances.insert(tx.sender().to_string(), balance - required);
            *balances.entry(tx.receiver().to_string()).or_insert(0) += tx.amount();
            kept.push(tx);
        }
        kept
    }

    /// Move balance into stake, atomically with respect to this shard's
    /// lock.
    pub fn move_to_stake(&mut self, address: &str, amount: u64) -> Result<()> {
        self.debit(address, amount)?;
        *self.stakes.entry(address.to_string()).or_insert(0) += amount;
        Ok(())
    }

    pub fn total_balance(&self) -> u64 {
        self.balances.values().sum()
    }

    pub fn total_staked(&self) -> u64 {
        self.stakes.values().sum()
    }

    /// Mean declared stake weight across the shard's blocks.
    pub fn mean_stake_weight(&self) -> u64 {
        if self.blocks.is_empty() {
            return 0;
        }
        let total: u64 = self.blocks.iter().map(|b| b.stake_weight()).sum();
        total / self.blocks.len() as u64
    }

    /// Microseconds between the tip and the block ten positions behind it.
    /// `None` until the shard holds more than ten blocks.
    pub fn recent_time_span(&self) -> Option<u64> {
        let len = self.blocks.len();
        if len <= 10 {
            return None;
        }
        let last = self.blocks[len - 1].timestamp();
        let earlier = self.blocks[len - 11].timestamp();
        Some(last.saturating_sub(earlier))
    }

    /// Succinct checkpoint digest over the balance table in sorted address
    /// order, logged after each commit.
    pub fn state_digest(&self) -> String {
        let mut entries: Vec<(&String, &u64)> = self.balances.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut payload = String::new();
        for (address, balance) in entries {
            payload.push_str(address);
            payload.push_str(&balance.to_string());
        }
        sha256_hex(payload.as_bytes())
    }

    /// Human-readable status blob served by the HTTP gateway.
    pub fn status(&self) -> String {
        format!(
            "Shard {}: {} blocks, difficulty {}, tip {}, {} addresses, {:.6} coins liquid, {:.6} coins staked",
            self.shard_id,
            self.blocks.len(),
            self.difficulty,
            self.tip_hash(),
            self.balances.len(),
            micros_to_coins(self.total_balance()),
            micros_to_coins(self.total_staked()),
        )
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    pub fn blocks(&self) -> &[Block] {
        self.blocks.as_slice()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn set_difficulty(&mut self, difficulty: u32) {
        self.difficulty = difficulty.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routed(sender: &str, receiver: &str, amount: u64, fee: u64) -> Transaction {
        let mut tx =
            Transaction::with_timestamp(sender, receiver, amount, fee, None, 1).unwrap();
        tx.set_shard("0");
        tx
    }

    #[test]
    fn test_apply_debits_amount_plus_fee() {
        let mut shard = ShardState::new("0", 1);
        shard.credit("alice", 50);

        shard.apply_transaction(&routed("alice", "bob", 10, 1)).unwrap();
        assert_eq!(shard.balance_of("alice"), 39);
        assert_eq!(shard.balance_of("bob"), 10);
    }

    #[test]
    fn test_apply_rejects_underfunded_sender() {
        let mut shard = ShardState::new("0", 1);
        shard.credit("alice", 10);

        let result = shard.apply_transaction(&routed("alice", "bob", 10, 1));
        assert!(matches!(
            result,
            Err(ChainError::InsufficientBalance { .. })
        ));
        // Failed application leaves the table untouched
        assert_eq!(shard.balance_of("alice"), 10);
        assert_eq!(shard.balance_of("bob"), 0);
    }

    #[test]
    fn test_script_predicate_gates_application() {
        let mut shard = ShardState::new("0", 1);
        shard.credit("alice", 100);

        let mut gated = Transaction::with_timestamp(
            "alice",
            "bob",
            10,
            0,
            Some("min_balance:500".to_string()),
            1,
        )
        .unwrap();
        gated.set_shard("0");
        assert!(shard.apply_transaction(&gated).is_err());

        shard.credit("alice", 400);
        shard.apply_transaction(&gated).unwrap();
        assert_eq!(shard.balance_of("bob"), 10);
    }

    #[test]
    fn test_stake_moves_balance() {
        let mut shard = ShardState::new("0", 1);
        shard.credit("alice", 100);

        shard.move_to_stake("alice", 60).unwrap();
        assert_eq!(shard.balance_of("alice"), 40);
        assert_eq!(shard.stake_of("alice"), 60);
        assert_eq!(shard.total_balance() + shard.total_staked(), 100);

        assert!(shard.move_to_stake("alice", 41).is_err());
    }

    #[test]
    fn test_state_digest_is_order_independent() {
        let mut first = ShardState::new("0", 1);
        first.credit("alice", 10);
        first.credit("bob", 20);

        let mut second = ShardState::new("0", 1);
        second.credit("bob", 20);
        second.credit("alice", 10);

        assert_eq!(first.state_digest(), second.state_digest());

        second.credit("alice", 1);
        assert_ne!(first.state_digest(), second.state_digest());
    }

    #[test]
    fn test_recent_time_span_needs_eleven_blocks() {
        let shard = ShardState::new("0", 1);
        assert!(shard.recent_time_span().is_none());
    }
}
