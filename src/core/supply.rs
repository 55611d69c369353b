/// Monetary units and the mutable reward schedule.
///
/// All amounts inside the node are integers in **micro-coins** so that the
/// conservation invariants hold exactly; floating point exists only at the
/// HTTP boundary.
///
/// ## Units
/// - **Micro**: the smallest unit
/// - **Coin**: 1,000,000 micros
/// - **Block reward**: 50 coins initially, halving every 210,000 blocks
/// - **Staking reward**: 0.1 coin initially, growing 5% at each halving
///
/// Number of micros in one coin
pub const MICROS_PER_COIN: u64 = 1_000_000;

/// Hard supply cap: 21,000,000 coins
pub const MAX_SUPPLY: u64 = 21_000_000 * MICROS_PER_COIN;

/// Initial block reward (50 coins)
pub const INITIAL_BLOCK_REWARD: u64 = 50 * MICROS_PER_COIN;

/// Initial staking bonus (0.1 coin)
pub const INITIAL_STAKING_REWARD: u64 = MICROS_PER_COIN / 10;

/// Blocks per shard between reward halvings
pub const HALVING_INTERVAL: usize = 210_000;

/// Target inter-block time in microseconds
pub const TARGET_BLOCK_TIME: u64 = 60_000;

/// Upper bound on the shard count a router may assign into
pub const MAX_SHARDS: u8 = 16;

/// Leading zero hex characters required of a freshly mined block hash
pub const INITIAL_DIFFICULTY: u32 = 4;

/// Genesis grant: 100 coins credited to the genesis address on shard "0"
pub const GENESIS_GRANT: u64 = 100 * MICROS_PER_COIN;

/// Average declared stake (in micros) above which a shard is considered
/// stake-heavy and its difficulty is raised
pub const STAKE_PRESSURE_THRESHOLD: u64 = 1_000 * MICROS_PER_COIN;

/// Convert whole coins (as from the HTTP boundary) to micros
pub fn coins_to_micros(coins: f64) -> u64 {
    (coins * MICROS_PER_COIN as f64).round() as u64
}

/// Convert micros to coins for display and the HTTP boundary
pub fn micros_to_coins(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_COIN as f64
}

/// The mutable emission state of a node. Centralized here so that mining,
/// validation, and the metrics endpoint all read the same numbers.
#[derive(Debug, Clone)]
pub struct RewardSchedule {
    block_reward: u64,
    staking_reward: u64,
    total_mined: u64,
}

impl Default for RewardSchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl RewardSchedule {
    pub fn new() -> RewardSchedule {
        RewardSchedule {
            block_reward: INITIAL_BLOCK_REWARD,
            staking_reward: INITIAL_STAKING_REWARD,
            total_mined: 0,
        }
    }

    pub fn block_reward(&self) -> u64 {
        self.block_reward
    }

    pub fn staking_reward(&self) -> u64 {
        self.staking_reward
    }

    pub fn total_mined(&self) -> u64 {
        self.total_mined
    }

    /// Mint up to `amount` micros, clamped so the running total never
    /// exceeds [`MAX_SUPPLY`]. Returns the amount actually minted.
    pub fn mint(&mut self, amount: u64) -> u64 {
        let remaining = MAX_SUPPLY.saturating_sub(self.total_mined);
        let minted = amount.min(remaining);
        self.total_mined += minted;
        minted
    }

    /// Apply one halving step: the block reward halves, the staking bonus
    /// grows by 5% (integer arithmetic, rounding down).
    pub fn halve(&mut self) {
        self.block_reward /= 2;
        self.staking_reward = self.staking_reward * 105 / 100;
    }
}
