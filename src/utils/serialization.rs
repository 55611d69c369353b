//! Binary codec for persisted block bodies.
//!
//! bincode 2 under its standard configuration, wrapped so that every
//! encode or decode failure lands in [`ChainError`] via the crate's
//! `From` conversions instead of leaking bincode's error types upward.

use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};

const CODEC_CONFIG: bincode::config::Configuration = bincode::config::standard();

/// Encode a value into the byte form the block store keeps.
pub fn encode<T: Serialize + bincode::Encode>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::encode_to_vec(value, CODEC_CONFIG)?)
}

/// Decode a value back from stored bytes. A body with trailing bytes is
/// rejected rather than silently truncated.
pub fn decode<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let (value, consumed) = bincode::decode_from_slice(bytes, CODEC_CONFIG)?;
    if consumed != bytes.len() {
        return Err(ChainError::Serialization(format!(
            "Stored body carries {} trailing bytes",
            bytes.len() - consumed
        )));
    }
    Ok(value)
}
