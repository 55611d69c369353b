//! Error handling for the ledger node
//!
//! This module provides the error types surfaced by every subsystem of the
//! node, from entity validation to persistence and networking.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, ChainError>;

/// Error kinds surfaced by the chain core
#[derive(Debug, Clone)]
pub enum ChainError {
    /// A transaction, block, or memory fragment fails its invariants
    InvalidEntity(String),
    /// Transaction fingerprint has already been applied
    DuplicateTx(String),
    /// Balance does not cover the requested amount plus fee
    InsufficientBalance { required: u64, available: u64 },
    /// Miner stake is below the block's declared stake weight
    StakeTooLow { declared: u64, held: u64 },
    /// Mining attempt budget exhausted without a conforming hash
    MiningExhausted(String),
    /// Key-value store errors
    Persistence(String),
    /// Network communication errors
    Network(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::InvalidEntity(msg) => write!(f, "Invalid entity: {msg}"),
            ChainError::DuplicateTx(fp) => write!(f, "Duplicate transaction: {fp}"),
            ChainError::InsufficientBalance {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient balance: required {required}, available {available}"
                )
            }
            ChainError::StakeTooLow { declared, held } => {
                write!(f, "Stake too low: declared {declared}, held {held}")
            }
            ChainError::MiningExhausted(msg) => write!(f, "Mining exhausted: {msg}"),
            ChainError::Persistence(msg) => write!(f, "Persistence error: {msg}"),
            ChainError::Network(msg) => write!(f, "Network error: {msg}"),
            ChainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            ChainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            ChainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            ChainError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<sled::Error> for ChainError {
    fn from(err: sled::Error) -> Self {
        ChainError::Persistence(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for ChainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for ChainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        ChainError::Serialization(err.to_string())
    }
}
