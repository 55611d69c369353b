//! Utility functions and helpers
//!
//! Cryptographic primitives, timestamps, and the binary serialization
//! helpers used throughout the node.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp_micros, ecdsa_secp256k1_sign, ecdsa_secp256k1_verify, sha256_digest,
    sha256_hex,
};

pub use serialization::{decode, encode};
