//! Wallet key management
//!
//! secp256k1 keypair generation and transaction signing for clients and
//! the CLI bootstrap.

pub mod wallet;

pub use wallet::Wallet;
