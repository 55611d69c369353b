use crate::utils::sha256_digest;
use log::warn;
use std::collections::HashMap;
use std::sync::Mutex;

/// Admissions a shard may absorb between rebalances before the router
/// starts diverting traffic away from it
const REBALANCE_THRESHOLD: u64 = 1_000;

/// Deterministic transaction-to-shard assignment with a load-aware
/// override. The primary choice is a pure function of the sender; the
/// override is advisory only, so two nodes may legitimately disagree and
/// the fingerprint set stays authoritative.
pub struct ShardRouter {
    max_shards: u8,
    // The router's own lock; never taken together with shard state locks
    loads: Mutex<HashMap<String, u64>>,
}

impl ShardRouter {
    pub fn new(max_shards: u8) -> ShardRouter {
        ShardRouter {
            max_shards,
            loads: Mutex::new(HashMap::new()),
        }
    }

    /// Primary selection: first byte of SHA-256(sender) mod the shard
    /// count, rendered as a decimal shard id.
    pub fn primary_shard(sender: &str, max_shards: u8) -> String {
        let digest = sha256_digest(sender.as_bytes());
        (digest[0] % max_shards).to_string()
    }

    /// Route a sender to a shard. When the primary shard has absorbed more
    /// than the rebalance threshold, the first less-loaded shard in index
    /// order takes over.
    pub fn assign(&self, sender: &str) -> String {
        let primary = Self::primary_shard(sender, self.max_shards);

        let loads = match self.loads.lock() {
            Ok(loads) => loads,
            Err(_) => {
                warn!("Load table lock poisoned, falling back to primary shard");
                return primary;
            }
        };

        let primary_load = loads.get(&primary).copied().unwrap_or(0);
        if primary_load > REBALANCE_THRESHOLD {
            for idx in 0..self.max_shards {
                let candidate = idx.to_string();
                if loads.get(&candidate).copied().unwrap_or(0) < primary_load {
                    return candidate;
                }
            }
        }
        primary
    }

    /// Bump a shard's counter after its transaction was actually admitted.
    pub fn record_admission(&self, shard_id: &str) {
        if let Ok(mut loads) = self.loads.lock() {
            *loads.entry(shard_id.to_string()).or_insert(0) += 1;
        }
    }

    pub fn load(&self, shard_id: &str) -> u64 {
        self.loads
            .lock()
            .map(|loads| loads.get(shard_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Start a fresh rebalance window.
    pub fn reset_loads(&self) {
        if let Ok(mut loads) = self.loads.lock() {
            loads.clear();
        }
    }

    pub fn max_shards(&self) -> u8 {
        self.max_shards
    }
}
