// Persistent block bodies. Keys are block hashes in lowercase hex, values
// are the bincode body. Writes are asynchronous; the engine calls flush on
// shutdown to sync the log.

use crate::core::Block;
use crate::error::{ChainError, Result};
use log::warn;
use sled::{Db, Tree};
use std::path::Path;

const BLOCKS_TREE: &str = "blocks";
const CACHE_CAPACITY_BYTES: u64 = 64 * 1024 * 1024;

pub struct BlockStore {
    db: Db,
    blocks: Tree,
}

impl BlockStore {
    /// Open (creating if missing) the store at `path`. Failure here is
    /// fatal for the node.
    pub fn open(path: &Path) -> Result<BlockStore> {
        let db = sled::Config::new()
            .path(path)
            .cache_capacity(CACHE_CAPACITY_BYTES)
            .use_compression(true)
            .open()
            .map_err(|e| ChainError::Persistence(format!("Failed to open block store: {e}")))?;
        let blocks = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| ChainError::Persistence(format!("Failed to open blocks tree: {e}")))?;
        Ok(BlockStore { db, blocks })
    }

    /// Persist one block. Errors surface so the caller can abort the
    /// in-memory append and keep state and store aligned.
    pub fn put_block(&self, block: &Block) -> Result<()> {
        let body = block.serialize()?;
        self.blocks
            .insert(block.hash().as_bytes(), body)
            .map_err(|e| ChainError::Persistence(format!("Failed to store block: {e}")))?;
        Ok(())
    }

    /// Persist a batch of blocks atomically.
    pub fn put_blocks(&self, blocks: &[Block]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for block in blocks {
            batch.insert(block.hash().as_bytes(), block.serialize()?);
        }
        self.blocks
            .apply_batch(batch)
            .map_err(|e| ChainError::Persistence(format!("Failed to apply block batch: {e}")))?;
        Ok(())
    }

    pub fn get_block(&self, hash: &str) -> Result<Option<Block>> {
        let bytes = self
            .blocks
            .get(hash.as_bytes())
            .map_err(|e| ChainError::Persistence(format!("Failed to read block: {e}")))?;
        match bytes {
            Some(bytes) => Ok(Some(Block::deserialize(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, hash: &str) -> Result<bool> {
        Ok(self
            .blocks
            .contains_key(hash.as_bytes())
            .map_err(|e| ChainError::Persistence(format!("Failed to probe block: {e}")))?)
    }

    /// All stored blocks, in no particular order. Used at startup to
    /// rebuild shard state; corrupt entries are skipped with a warning.
    pub fn load_all(&self) -> Vec<Block> {
        let mut loaded = Vec::new();
        for entry in self.blocks.iter() {
            match entry {
                Ok((_, bytes)) => match Block::deserialize(bytes.as_ref()) {
                    Ok(block) => loaded.push(block),
                    Err(e) => warn!("Skipping undecodable block body: {e}"),
                },
                Err(e) => warn!("Skipping unreadable store entry: {e}"),
            }
        }
        loaded
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Sync the write-ahead log. Called once at shutdown.
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| ChainError::Persistence(format!("Failed to flush store: {e}")))?;
        Ok(())
    }
}
