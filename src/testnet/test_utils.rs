//! Fixtures for engine-level tests

use crate::core::{
    Block, ChainConfig, ChainEngine, MemoryFragment, MemoryMiner, Transaction,
};
use crate::error::Result;
use crate::utils::current_timestamp_micros;
use crate::wallet::Wallet;
use tempfile::TempDir;

/// Chain tunables for fast tests: difficulty 1 so sealing is effectively
/// certain within the attempt budget.
pub fn test_chain_config() -> ChainConfig {
    ChainConfig {
        initial_difficulty: 1,
        ..ChainConfig::default()
    }
}

/// A fresh engine over a temporary store, genesis included.
pub fn open_test_engine() -> Result<(ChainEngine, TempDir)> {
    let dir = tempfile::tempdir().map_err(|e| crate::error::ChainError::Io(e.to_string()))?;
    let engine = ChainEngine::open(test_chain_config(), &dir.path().join("db"))?;
    Ok((engine, dir))
}

/// Credit an address one block reward on a shard by syncing in an empty
/// block it "mined". This is the protocol path for seeding balances.
pub fn fund_address(engine: &ChainEngine, address: &str, shard_id: &str) -> Result<Block> {
    let previous_hash = engine.tip_hash(shard_id).unwrap_or_else(|| "0".to_string());
    let index = engine.block_count(shard_id) as u64;
    let difficulty = engine.shard_difficulty(shard_id).unwrap_or(1);

    let draft = Block::draft(
        index,
        current_timestamp_micros()?,
        vec![],
        MemoryFragment::empty(address),
        previous_hash,
        difficulty,
        0,
        shard_id.to_string(),
    )?;
    let sealed = MemoryMiner::new().seal(draft, 0)?;
    engine.sync_block(sealed.clone())?;
    Ok(sealed)
}

/// A routed, signed transfer from a wallet.
pub fn signed_transfer(
    wallet: &Wallet,
    receiver: &str,
    amount: u64,
    fee: u64,
    shard_id: &str,
) -> Result<Transaction> {
    let mut tx = Transaction::new(wallet.public_key(), receiver, amount, fee, None)?;
    tx.set_shard(shard_id);
    wallet.sign_transaction(&mut tx)?;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{INITIAL_BLOCK_REWARD, MICROS_PER_COIN};

    #[test]
    fn test_fund_address_credits_one_block_reward() {
        let (engine, _dir) = open_test_engine().unwrap();
        fund_address(&engine, "miner-a", "0").unwrap();
        assert_eq!(engine.get_balance("miner-a", "0"), INITIAL_BLOCK_REWARD);
    }

    #[test]
    fn test_signed_transfer_passes_admission() {
        let (engine, _dir) = open_test_engine().unwrap();
        let wallet = Wallet::new().unwrap();
        let shard = engine.route_for(wallet.public_key());

        fund_address(&engine, wallet.public_key(), &shard).unwrap();
        let tx = signed_transfer(&wallet, "bob", MICROS_PER_COIN, 0, &shard).unwrap();
        engine.submit_transaction(tx).unwrap();
        assert_eq!(engine.pending_len(), 1);
    }
}
