// Value-transfer transactions. A transaction's identity is its fingerprint:
// the SHA-256 of an injective text encoding of its economic fields. The
// fingerprint is what gets signed, what the duplicate-application set tracks,
// and what block hashes commit to.

use crate::core::supply::MAX_SUPPLY;
use crate::error::{ChainError, Result};
use crate::utils::{
    current_timestamp_micros, ecdsa_secp256k1_sign, ecdsa_secp256k1_verify, sha256_hex,
};
use serde::{Deserialize, Serialize};

/// Sender name reserved for protocol-issued grants (the genesis credit).
/// System transactions carry no signature and are only admissible in a
/// shard's genesis block.
pub const SYSTEM_SENDER: &str = "system";

/// Script prefix of the single supported predicate form.
const MIN_BALANCE_PREFIX: &str = "min_balance:";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    sender: String,
    receiver: String,
    amount: u64,
    fee: u64,
    script: Option<String>,
    signature: String,
    shard_id: String,
    timestamp: u64,
}

impl Transaction {
    /// Create an unrouted, unsigned transaction, rejecting invariant
    /// violations up front. The shard id is assigned by the router and the
    /// signature is attached by the sender's wallet afterwards.
    pub fn new(
        sender: &str,
        receiver: &str,
        amount: u64,
        fee: u64,
        script: Option<String>,
    ) -> Result<Transaction> {
        let timestamp = current_timestamp_micros()?;
        Self::with_timestamp(sender, receiver, amount, fee, script, timestamp)
    }

    /// Create a transaction with an explicit timestamp. Used by the gossip
    /// decoder and by tests that need deterministic fingerprints.
    pub fn with_timestamp(
        sender: &str,
        receiver: &str,
        amount: u64,
        fee: u64,
        script: Option<String>,
        timestamp: u64,
    ) -> Result<Transaction> {
        if sender.is_empty() || receiver.is_empty() {
            return Err(ChainError::InvalidEntity(
                "Sender and receiver must not be empty".to_string(),
            ));
        }
        if sender == receiver {
            return Err(ChainError::InvalidEntity(
                "Sender and receiver must differ".to_string(),
            ));
        }
        if amount > MAX_SUPPLY {
            return Err(ChainError::InvalidEntity(format!(
                "Amount {amount} exceeds the supply cap"
            )));
        }
        if fee > amount {
            return Err(ChainError::InvalidEntity(format!(
                "Fee {fee} exceeds amount {amount}"
            )));
        }
        if timestamp == 0 {
            return Err(ChainError::InvalidEntity(
                "Timestamp must be positive".to_string(),
            ));
        }
        if let Some(ref script) = script {
            parse_min_balance_script(script)?;
        }

        Ok(Transaction {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            fee,
            script,
            signature: String::new(),
            shard_id: String::new(),
            timestamp,
        })
    }

    /// System grant used when a shard's genesis block is built.
    pub fn system_grant(receiver: &str, amount: u64, shard_id: &str) -> Result<Transaction> {
        let mut tx = Transaction::new(SYSTEM_SENDER, receiver, amount, 0, None)?;
        tx.shard_id = shard_id.to_string();
        Ok(tx)
    }

    /// The injective canonical encoding: every field in a fixed order,
    /// numbers rendered as decimal ASCII, each field prefixed with its byte
    /// length so that no payload containing a delimiter can collide.
    pub fn canonical_payload(&self) -> String {
        let script = self.script.as_deref().unwrap_or("");
        let amount = self.amount.to_string();
        let fee = self.fee.to_string();
        let timestamp = self.timestamp.to_string();
        let fields: [&str; 7] = [
            &self.sender,
            &self.receiver,
            &amount,
            &fee,
            script,
            &self.shard_id,
            &timestamp,
        ];
        let mut payload = String::new();
        for field in fields {
            payload.push_str(&field.len().to_string());
            payload.push(':');
            payload.push_str(field);
        }
        payload
    }

    /// SHA-256 of the canonical encoding, lowercase hex. This is the
    /// transaction's identity for at-most-once application.
    pub fn fingerprint(&self) -> String {
        sha256_hex(self.canonical_payload().as_bytes())
    }

    /// Sign the fingerprint with the sender's secp256k1 private key. The
    /// shard id must already be assigned, since it is part of the payload.
    pub fn sign(&mut self, private_key_hex: &str) -> Result<()> {
        if self.shard_id.is_empty() {
            return Err(ChainError::InvalidEntity(
                "Cannot sign before shard assignment".to_string(),
            ));
        }
        self.signature = ecdsa_secp256k1_sign(private_key_hex, self.fingerprint().as_bytes())?;
        Ok(())
    }

    /// Verify the signature against the sender's public key. System grants
    /// carry no signature and verify vacuously.
    pub fn verify_signature(&self) -> bool {
        if self.is_system() {
            return true;
        }
        if self.signature.is_empty() {
            return false;
        }
        ecdsa_secp256k1_verify(&self.sender, self.fingerprint().as_bytes(), &self.signature)
    }

    /// Admission-time invariant check. Construction already validated the
    /// economic fields; this re-checks them plus routing state, so that a
    /// transaction arriving off the wire gets the same scrutiny.
    pub fn validate(&self) -> Result<()> {
        if self.sender.is_empty() || self.receiver.is_empty() || self.sender == self.receiver {
            return Err(ChainError::InvalidEntity(
                "Invalid sender/receiver pair".to_string(),
            ));
        }
        if self.amount > MAX_SUPPLY || self.fee > self.amount {
            return Err(ChainError::InvalidEntity(
                "Amount or fee out of range".to_string(),
            ));
        }
        if self.timestamp == 0 {
            return Err(ChainError::InvalidEntity(
                "Timestamp must be positive".to_string(),
            ));
        }
        if self.shard_id.is_empty() {
            return Err(ChainError::InvalidEntity(
                "Shard id must be assigned before admission".to_string(),
            ));
        }
        if let Some(ref script) = self.script {
            parse_min_balance_script(script)?;
        }
        Ok(())
    }

    /// The balance threshold demanded by the script predicate, if any.
    pub fn script_threshold(&self) -> Option<u64> {
        self.script
            .as_deref()
            .and_then(|s| parse_min_balance_script(s).ok())
    }

    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn set_signature(&mut self, signature: String) {
        self.signature = signature;
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    pub fn set_shard(&mut self, shard_id: &str) {
        self.shard_id = shard_id.to_string();
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

/// Parse the single supported predicate form, `min_balance:<micros>`.
fn parse_min_balance_script(script: &str) -> Result<u64> {
    let threshold = script
        .strip_prefix(MIN_BALANCE_PREFIX)
        .ok_or_else(|| ChainError::InvalidEntity(format!("Unsupported script form: {script}")))?;
    threshold
        .parse::<u64>()
        .map_err(|e| ChainError::InvalidEntity(format!("Invalid script threshold: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn routed_tx(sender: &str, receiver: &str, amount: u64, fee: u64) -> Transaction {
        let mut tx = Transaction::with_timestamp(sender, receiver, amount, fee, None, 1).unwrap();
        tx.set_shard("0");
        tx
    }

    #[test]
    fn test_constructor_rejects_invariant_violations() {
        assert!(Transaction::new("a", "a", 10, 0, None).is_err());
        assert!(Transaction::new("", "b", 10, 0, None).is_err());
        assert!(Transaction::new("a", "b", 10, 11, None).is_err());
        assert!(Transaction::new("a", "b", MAX_SUPPLY + 1, 0, None).is_err());
        assert!(Transaction::with_timestamp("a", "b", 10, 0, None, 0).is_err());
    }

    #[test]
    fn test_script_forms() {
        let tx = Transaction::new("a", "b", 10, 0, Some("min_balance:500".to_string())).unwrap();
        assert_eq!(tx.script_threshold(), Some(500));

        assert!(Transaction::new("a", "b", 10, 0, Some("unlock_after:9".to_string())).is_err());
        assert!(Transaction::new("a", "b", 10, 0, Some("min_balance:x".to_string())).is_err());
    }

    #[test]
    fn test_fingerprint_is_deterministic_and_field_sensitive() {
        let tx = routed_tx("alice", "bob", 10, 1);
        assert_eq!(tx.fingerprint(), tx.fingerprint());

        let other = routed_tx("alice", "bob", 11, 1);
        assert_ne!(tx.fingerprint(), other.fingerprint());

        let mut rerouted = tx.clone();
        rerouted.set_shard("3");
        assert_ne!(tx.fingerprint(), rerouted.fingerprint());
    }

    #[test]
    fn test_canonical_encoding_is_injective_across_field_boundaries() {
        // Without length prefixes these two would concatenate identically.
        let a = routed_tx("ab", "cd", 10, 1);
        let b = routed_tx("a", "bcd", 10, 1);
        assert_ne!(a.canonical_payload(), b.canonical_payload());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_sign_requires_routing_and_verifies() {
        let wallet = Wallet::new().unwrap();
        let mut tx = Transaction::new(wallet.public_key(), "bob", 10, 1, None).unwrap();

        // Unrouted transactions cannot be signed: the shard id is part of
        // the signed payload.
        assert!(tx.sign(wallet.private_key()).is_err());

        tx.set_shard("2");
        tx.sign(wallet.private_key()).unwrap();
        assert!(tx.verify_signature());

        // Any field change invalidates the signature.
        tx.set_shard("3");
        assert!(!tx.verify_signature());
    }

    #[test]
    fn test_system_grant_verifies_without_signature() {
        let grant = Transaction::system_grant("genesis", 100, "0").unwrap();
        assert!(grant.is_system());
        assert!(grant.verify_signature());
        assert!(grant.validate().is_ok());
    }
}
