// Node entry point: parse the CLI, wire the engine to storage, the DHT,
// the gossip transport, and the HTTP gateway, then hand the main thread
// to the listener's accept loop.

use ahmiyat::core::micros_to_coins;
use ahmiyat::{
    ChainConfig, ChainEngine, Command, ContentAddressedStore, DhtRegistry, GossipListener,
    NodeConfig, Opt, PeerNode, Wallet,
};
use clap::Parser;
use log::{error, info, LevelFilter};
use std::path::Path;
use std::process;
use std::sync::Arc;

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();
    if let Err(e) = run(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(Command::Wallet) = opt.command {
        let wallet = Wallet::new()?;
        println!("public_key:  {}", wallet.public_key());
        println!("private_key: {}", wallet.private_key());
        return Ok(());
    }

    let listen_port = opt
        .listen_port
        .ok_or("Usage: ahmiyat <listen_port> [--config <path>] [--miner <id>]")?;

    let node_config = match opt.config {
        Some(path) => NodeConfig::load(Path::new(&path))?,
        None => NodeConfig::from_env(),
    };
    let node_id = node_config.effective_node_id(listen_port);
    let miner_id = opt.miner.unwrap_or_else(|| node_id.clone());

    // Fatal when the store cannot be opened.
    let engine = Arc::new(ChainEngine::open(
        ChainConfig::default(),
        Path::new(&node_config.db_path),
    )?);
    engine.attach_artifact_store(Arc::new(ContentAddressedStore::new(
        &node_config.memories_dir,
    )?));

    let dht = Arc::new(DhtRegistry::with_fallback_seeds(
        node_config.fallback_seeds.clone(),
    ));
    for peer in &node_config.peers {
        dht.add_peer(peer.clone());
    }
    dht.bootstrap(&node_config.bootstrap_host, node_config.bootstrap_port);

    let node_addr = format!("127.0.0.1:{listen_port}");
    dht.add_peer(PeerNode::new(&node_id, "127.0.0.1", listen_port));
    engine.attach_announcer(Arc::new(ahmiyat::Broadcaster::new(
        Arc::clone(&dht),
        &node_id,
        &node_addr,
    )));

    let api_handle = ahmiyat::api::serve(Arc::clone(&engine), node_config.api_port);

    info!(
        "Balance of genesis: {}",
        micros_to_coins(engine.get_balance("genesis", "0"))
    );
    info!("Node {node_id} running on port {listen_port}");

    let listener = GossipListener::new(
        Arc::clone(&engine),
        dht,
        &miner_id,
        node_config.miner_stake,
    );
    let result = listener.run(listen_port);

    // The accept loop only returns on a fatal bind error; sync the store
    // before surfacing it.
    engine.flush()?;
    drop(api_handle);
    result?;
    Ok(())
}
