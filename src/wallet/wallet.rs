use crate::core::Transaction;
use crate::error::{ChainError, Result};
use data_encoding::HEXLOWER;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;

/// A secp256k1 keypair held as hex strings. The public key (uncompressed
/// SEC1 form) doubles as the account's on-chain identity; clients keep the
/// private key and sign transaction fingerprints with it.
#[derive(Debug, Clone)]
pub struct Wallet {
    private_key: String,
    public_key: String,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let signing_key = SigningKey::random(&mut OsRng);
        Ok(Self::from_signing_key(signing_key))
    }

    /// Rebuild a wallet from a stored 32-byte private key hex.
    pub fn from_private_key(private_key_hex: &str) -> Result<Wallet> {
        let bytes = HEXLOWER
            .decode(private_key_hex.to_lowercase().as_bytes())
            .map_err(|e| ChainError::Crypto(format!("Invalid private key encoding: {e}")))?;
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| ChainError::Crypto(format!("Failed to decode private key: {e}")))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Wallet {
        let public_key = signing_key.verifying_key().to_encoded_point(false);
        Wallet {
            private_key: HEXLOWER.encode(signing_key.to_bytes().as_slice()),
            public_key: HEXLOWER.encode(public_key.as_bytes()),
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// Sign a routed transaction's fingerprint in place.
    pub fn sign_transaction(&self, tx: &mut Transaction) -> Result<()> {
        tx.sign(&self.private_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_round_trips_through_hex() {
        let wallet = Wallet::new().unwrap();
        let restored = Wallet::from_private_key(wallet.private_key()).unwrap();
        assert_eq!(wallet.public_key(), restored.public_key());
        // Uncompressed SEC1: 0x04 || x || y, hex-encoded
        assert_eq!(wallet.public_key().len(), 130);
        assert!(wallet.public_key().starts_with("04"));
    }

    #[test]
    fn test_wallets_are_unique() {
        let a = Wallet::new().unwrap();
        let b = Wallet::new().unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let wallet = Wallet::new().unwrap();
        let mut tx = Transaction::new(wallet.public_key(), "bob", 10, 1, None).unwrap();
        tx.set_shard("0");
        wallet.sign_transaction(&mut tx).unwrap();
        assert!(tx.verify_signature());
    }
}
