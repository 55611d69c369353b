use crate::core::Transaction;
use std::collections::VecDeque;
use std::sync::RwLock;

/// FIFO queue of admitted-but-unmined transactions, fed by the HTTP
/// gateway and the gossip listener and drained by mining.
pub struct PendingPool {
    inner: RwLock<VecDeque<Transaction>>,
}

impl Default for PendingPool {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingPool {
    pub fn new() -> PendingPool {
        PendingPool {
            inner: RwLock::new(VecDeque::new()),
        }
    }

    pub fn enqueue(&self, tx: Transaction) {
        match self.inner.write() {
            Ok(mut pool) => pool.push_back(tx),
            Err(_) => {
                log::error!("Failed to acquire write lock on pending pool");
            }
        }
    }

    /// Swap the whole queue out under the lock; callers process the
    /// entries with the lock already released.
    pub fn drain_all(&self) -> Vec<Transaction> {
        match self.inner.write() {
            Ok(mut pool) => std::mem::take(&mut *pool).into(),
            Err(_) => {
                log::error!("Failed to acquire write lock on pending pool");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on pending pool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.is_empty(),
            Err(_) => {
                log::error!("Failed to acquire read lock on pending pool");
                true // Conservative default
            }
        }
    }
}
