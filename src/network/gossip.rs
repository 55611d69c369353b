use crate::core::{Block, BlockAnnouncer, ChainEngine, MemoryFragment};
use crate::error::{ChainError, Result};
use crate::network::dht::{DhtRegistry, BOOTSTRAP_REQUEST};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

/// One gossip frame per TCP connection; a block never exceeds this.
const MAX_FRAME_BYTES: u64 = 4 * 1024;
/// Per-read deadline bounding slow peers.
const READ_DEADLINE: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Peers addressed per block fanout.
const BROADCAST_FANOUT: usize = 10;
const CONNECT_RETRIES: u32 = 3;
/// Linear backoff step between connect retries.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);
/// Finished handler threads are pruned once the registry grows past this.
const WORKER_REGISTRY_LIMIT: usize = 100;

/// P2P frame types. Structured JSON framing: a delimiter wire format is
/// ambiguous once payloads contain the delimiters. Bootstrap replies are a
/// bare JSON peer list rather than a frame.
#[derive(Debug, Serialize, Deserialize)]
pub enum Package {
    Block { addr_from: String, block: Block },
}

/// Accepts serialized blocks from peers, answers bootstrap requests with
/// the current peer list, and kicks mining after each sync so gossiped
/// transactions drain promptly.
pub struct GossipListener {
    engine: Arc<ChainEngine>,
    dht: Arc<DhtRegistry>,
    miner_id: String,
    miner_stake: u64,
}

impl GossipListener {
    pub fn new(
        engine: Arc<ChainEngine>,
        dht: Arc<DhtRegistry>,
        miner_id: &str,
        miner_stake: u64,
    ) -> GossipListener {
        GossipListener {
            engine,
            dht,
            miner_id: miner_id.to_string(),
            miner_stake,
        }
    }

    /// Accept loop; endless. A failed bind is fatal for the node.
    pub fn run(&self, port: u16) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|e| ChainError::Network(format!("Failed to bind gossip port {port}: {e}")))?;
        info!("Gossip listener on port {port}");

        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let engine = Arc::clone(&self.engine);
                    let dht = Arc::clone(&self.dht);
                    let miner_id = self.miner_id.clone();
                    let miner_stake = self.miner_stake;

                    workers.push(thread::spawn(move || {
                        if let Err(e) =
                            handle_connection(engine, dht, &miner_id, miner_stake, stream)
                        {
                            warn!("Gossip connection dropped: {e}");
                        }
                    }));

                    if workers.len() > WORKER_REGISTRY_LIMIT {
                        workers.retain(|handle| !handle.is_finished());
                    }
                }
                Err(e) => {
                    error!("Error accepting gossip connection: {e}");
                }
            }
        }
        Ok(())
    }
}

fn handle_connection(
    engine: Arc<ChainEngine>,
    dht: Arc<DhtRegistry>,
    miner_id: &str,
    miner_stake: u64,
    mut stream: TcpStream,
) -> Result<()> {
    stream
        .set_read_timeout(Some(READ_DEADLINE))
        .map_err(|e| ChainError::Network(format!("Failed to set read deadline: {e}")))?;

    let mut payload = Vec::new();
    (&stream)
        .take(MAX_FRAME_BYTES)
        .read_to_end(&mut payload)
        .map_err(|e| ChainError::Network(format!("Failed to read frame: {e}")))?;

    if payload == BOOTSTRAP_REQUEST {
        let reply = serde_json::to_vec(&dht.peers())
            .map_err(|e| ChainError::Network(format!("Failed to encode peer list: {e}")))?;
        stream
            .write_all(&reply)
            .map_err(|e| ChainError::Network(format!("Failed to answer bootstrap: {e}")))?;
        let _ = stream.shutdown(Shutdown::Both);
        return Ok(());
    }

    // Anything else must be a block frame; malformed payloads are dropped.
    let package: Package = match serde_json::from_slice(&payload) {
        Ok(package) => package,
        Err(e) => {
            warn!("Dropping malformed gossip payload ({} bytes): {e}", payload.len());
            return Ok(());
        }
    };

    match package {
        Package::Block { addr_from, block } => {
            let hash = block.hash().to_string();
            match engine.sync_block(block) {
                Ok(true) => info!("Synced block {hash} from {addr_from}"),
                Ok(false) => info!("Ignored known block {hash} from {addr_from}"),
                Err(e) => warn!("Rejected gossiped block {hash} from {addr_from}: {e}"),
            }
            // Drain whatever the mempool accumulated while we were syncing.
            if engine.pending_len() > 0 {
                if let Err(e) =
                    engine.mine(miner_id, miner_stake, MemoryFragment::empty(miner_id))
                {
                    warn!("Post-sync mining failed: {e}");
                }
            }
        }
    }

    let _ = stream.shutdown(Shutdown::Both);
    Ok(())
}

/// Fans committed blocks out to the DHT-nearest peers. Send failures log
/// and never propagate into the mine path.
pub struct Broadcaster {
    dht: Arc<DhtRegistry>,
    node_id: String,
    node_addr: String,
}

impl Broadcaster {
    pub fn new(dht: Arc<DhtRegistry>, node_id: &str, node_addr: &str) -> Broadcaster {
        Broadcaster {
            dht,
            node_id: node_id.to_string(),
            node_addr: node_addr.to_string(),
        }
    }

    /// Send one framed block to up to ten nearest peers, one thread per
    /// peer, joined before returning.
    pub fn broadcast(&self, block: &Block) {
        let peers = self.dht.find_peers(&self.node_id, BROADCAST_FANOUT);
        if peers.is_empty() {
            return;
        }

        let frame = match serde_json::to_vec(&Package::Block {
            addr_from: self.node_addr.clone(),
            block: block.clone(),
        }) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode block frame: {e}");
                return;
            }
        };
        if frame.len() as u64 > MAX_FRAME_BYTES {
            warn!(
                "Block {} frame is {} bytes, over the {}-byte gossip cap; not broadcast",
                block.hash(),
                frame.len(),
                MAX_FRAME_BYTES
            );
            return;
        }

        thread::scope(|scope| {
            for peer in &peers {
                let endpoint = peer.endpoint();
                let frame = frame.as_slice();
                scope.spawn(move || {
                    if let Err(e) = send_with_retries(&endpoint, frame) {
                        warn!("Broadcast to {endpoint} failed: {e}");
                    }
                });
            }
        });
    }
}

impl BlockAnnouncer for Broadcaster {
    fn announce(&self, block: &Block) {
        self.broadcast(block);
    }
}

fn send_with_retries(endpoint: &str, frame: &[u8]) -> Result<()> {
    let addrs: Vec<_> = endpoint
        .to_socket_addrs()
        .map_err(|e| ChainError::Network(format!("Bad peer endpoint {endpoint}: {e}")))?
        .collect();
    let addr = addrs
        .first()
        .ok_or_else(|| ChainError::Network(format!("Peer endpoint {endpoint} did not resolve")))?;

    let mut last_error = None;
    for attempt in 1..=CONNECT_RETRIES {
        match TcpStream::connect_timeout(addr, CONNECT_TIMEOUT) {
            Ok(mut stream) => {
                stream
                    .write_all(frame)
                    .map_err(|e| ChainError::Network(format!("Failed to send frame: {e}")))?;
                let _ = stream.shutdown(Shutdown::Both);
                return Ok(());
            }
            Err(e) => {
                last_error = Some(e);
                // Linear backoff between attempts, 100ms then 200ms; no
                // sleep after the final failure.
                if attempt < CONNECT_RETRIES {
                    thread::sleep(RETRY_BACKOFF * attempt.min(2));
                }
            }
        }
    }
    Err(ChainError::Network(format!(
        "Gave up on {endpoint} after {CONNECT_RETRIES} attempts: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}
