use data_encoding::HEXLOWER;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use ring::digest::{Context, SHA256};

use crate::error::{ChainError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds since the Unix epoch.
pub fn current_timestamp_micros() -> Result<u64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ChainError::Crypto(format!("System time error: {e}")))?
        .as_micros();

    // Ensure the timestamp fits in u64
    if duration > u64::MAX as u128 {
        return Err(ChainError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(duration as u64)
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// SHA-256 rendered as lowercase hex, the form used for block hashes,
/// transaction fingerprints and hashed node ids.
pub fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(sha256_digest(data).as_slice())
}

/// Sign a message with a secp256k1 private key given as 32-byte hex.
/// Returns the fixed-size signature as lowercase hex.
pub fn ecdsa_secp256k1_sign(private_key_hex: &str, message: &[u8]) -> Result<String> {
    let key_bytes = HEXLOWER
        .decode(private_key_hex.to_lowercase().as_bytes())
        .map_err(|e| ChainError::Crypto(format!("Invalid private key encoding: {e}")))?;
    let signing_key = SigningKey::from_slice(&key_bytes)
        .map_err(|e| ChainError::Crypto(format!("Failed to decode private key: {e}")))?;
    let signature: Signature = signing_key.sign(message);
    Ok(HEXLOWER.encode(signature.to_bytes().as_slice()))
}

/// Verify a hex signature against a SEC1-encoded public key given as hex.
pub fn ecdsa_secp256k1_verify(public_key_hex: &str, message: &[u8], signature_hex: &str) -> bool {
    let pub_bytes = match HEXLOWER.decode(public_key_hex.to_lowercase().as_bytes()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let verifying_key = match VerifyingKey::from_sec1_bytes(&pub_bytes) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let sig_bytes = match HEXLOWER.decode(signature_hex.to_lowercase().as_bytes()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = match Signature::from_slice(&sig_bytes) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    verifying_key.verify(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    #[test]
    fn test_sha256_hex_stable() {
        let digest = sha256_hex(b"ahmiyat");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, sha256_hex(b"ahmiyat"));
        assert_ne!(digest, sha256_hex(b"ahmiyah"));
    }

    #[test]
    fn test_sign_and_verify_round_trip() {
        let wallet = Wallet::new().unwrap();
        let signature = ecdsa_secp256k1_sign(wallet.private_key(), b"payload").unwrap();

        assert!(ecdsa_secp256k1_verify(
            wallet.public_key(),
            b"payload",
            &signature
        ));
        assert!(!ecdsa_secp256k1_verify(
            wallet.public_key(),
            b"tampered",
            &signature
        ));
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let signer = Wallet::new().unwrap();
        let other = Wallet::new().unwrap();
        let signature = ecdsa_secp256k1_sign(signer.private_key(), b"payload").unwrap();

        assert!(!ecdsa_secp256k1_verify(
            other.public_key(),
            b"payload",
            &signature
        ));
    }

    #[test]
    fn test_sign_rejects_garbage_key() {
        assert!(ecdsa_secp256k1_sign("not-hex", b"payload").is_err());
        assert!(ecdsa_secp256k1_sign("00ff", b"payload").is_err());
    }
}
