use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};

/// Per-block metadata fragment. The chain treats everything here as opaque
/// except `remote_url`, which is bound by the artifact store when the block
/// is constructed and is the only field that participates in the block hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct MemoryFragment {
    fragment_type: String,
    local_path: String,
    remote_url: String,
    description: String,
    owner: String,
    lock_time: u64,
}

impl MemoryFragment {
    pub fn new(
        fragment_type: &str,
        local_path: &str,
        description: &str,
        owner: &str,
        lock_time: u64,
    ) -> Result<MemoryFragment> {
        if fragment_type.is_empty() {
            return Err(ChainError::InvalidEntity(
                "Memory fragment type must not be empty".to_string(),
            ));
        }

        Ok(MemoryFragment {
            fragment_type: fragment_type.to_string(),
            local_path: local_path.to_string(),
            remote_url: String::new(),
            description: description.to_string(),
            owner: owner.to_string(),
            lock_time,
        })
    }

    /// A placeholder fragment for blocks mined without an attached artifact.
    pub fn empty(owner: &str) -> MemoryFragment {
        MemoryFragment {
            fragment_type: "none".to_string(),
            local_path: String::new(),
            remote_url: String::new(),
            description: String::new(),
            owner: owner.to_string(),
            lock_time: 0,
        }
    }

    /// Bind the uploaded artifact URL. The binding happens once, at block
    /// construction; rebinding is an entity violation.
    pub fn bind_remote_url(&mut self, url: &str) -> Result<()> {
        if !self.remote_url.is_empty() {
            return Err(ChainError::InvalidEntity(
                "Memory fragment remote_url is already bound".to_string(),
            ));
        }
        self.remote_url = url.to_string();
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.fragment_type.is_empty() {
            return Err(ChainError::InvalidEntity(
                "Memory fragment type must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fragment_type(&self) -> &str {
        &self.fragment_type
    }

    pub fn local_path(&self) -> &str {
        &self.local_path
    }

    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn lock_time(&self) -> u64 {
        self.lock_time
    }
}
