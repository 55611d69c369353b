use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "ahmiyat",
    about = "Peer-to-peer sharded ledger node",
    args_conflicts_with_subcommands = true
)]
pub struct Opt {
    /// TCP port the gossip listener binds to
    pub listen_port: Option<u16>,

    /// Path to a JSON node config (peers, bootstrap seed, ports)
    #[arg(long)]
    pub config: Option<String>,

    /// Identity credited with mining rewards; defaults to the node id
    #[arg(long)]
    pub miner: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "wallet", about = "Generate a secp256k1 keypair and print it")]
    Wallet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_form_parses() {
        let opt = Opt::try_parse_from(["ahmiyat", "6001", "--config", "node.json"]).unwrap();
        assert_eq!(opt.listen_port, Some(6001));
        assert_eq!(opt.config.as_deref(), Some("node.json"));
        assert!(opt.command.is_none());
    }

    #[test]
    fn test_wallet_subcommand_parses() {
        let opt = Opt::try_parse_from(["ahmiyat", "wallet"]).unwrap();
        assert!(matches!(opt.command, Some(Command::Wallet)));
    }
}
