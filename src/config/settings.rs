use crate::error::{ChainError, Result};
use crate::network::PeerNode;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

const DEFAULT_API_PORT: u16 = 8080;
const DEFAULT_DB_PATH: &str = "ahmiyat_db";
const DEFAULT_MEMORIES_DIR: &str = "memories";
const DEFAULT_BOOTSTRAP_HOST: &str = "node1.ahmiyat.example.com";
const DEFAULT_BOOTSTRAP_PORT: u16 = 5001;

/// Node-level settings. Loaded from a JSON config file when one is given,
/// with a couple of environment overrides for containerized deployments.
/// Chain tunables live in [`crate::core::ChainConfig`], not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP gateway port
    pub api_port: u16,
    /// Block store directory
    pub db_path: String,
    /// Working directory for memory fragment artifacts
    pub memories_dir: String,
    /// Overlay identity; derived from the listen port when empty
    pub node_id: String,
    /// Stake (in micros) this node declares when mining
    pub miner_stake: u64,
    /// Primary bootstrap seed
    pub bootstrap_host: String,
    pub bootstrap_port: u16,
    /// Seeds tried in order when the primary is unreachable
    pub fallback_seeds: Vec<(String, u16)>,
    /// Statically configured peers added to the DHT at startup
    pub peers: Vec<PeerNode>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            api_port: DEFAULT_API_PORT,
            db_path: DEFAULT_DB_PATH.to_string(),
            memories_dir: DEFAULT_MEMORIES_DIR.to_string(),
            node_id: String::new(),
            miner_stake: 0,
            bootstrap_host: DEFAULT_BOOTSTRAP_HOST.to_string(),
            bootstrap_port: DEFAULT_BOOTSTRAP_PORT,
            fallback_seeds: Vec::new(),
            peers: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<NodeConfig> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ChainError::Config(format!("Failed to read config {path:?}: {e}")))?;
        let mut config: NodeConfig = serde_json::from_str(&raw)
            .map_err(|e| ChainError::Config(format!("Failed to parse config {path:?}: {e}")))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus environment overrides, for nodes run without a file.
    pub fn from_env() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = env::var("AHMIYAT_API_PORT") {
            if let Ok(port) = port.parse() {
                self.api_port = port;
            }
        }
        if let Ok(path) = env::var("AHMIYAT_DB_PATH") {
            self.db_path = path;
        }
    }

    /// The overlay identity, falling back to a port-derived name.
    pub fn effective_node_id(&self, listen_port: u16) -> String {
        if self.node_id.is_empty() {
            format!("node-{listen_port}")
        } else {
            self.node_id.clone()
        }
    }
}
