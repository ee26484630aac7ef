//! Identifiers used throughout TokenLedger.
//!
//! Party, sequencer and session IDs use UUIDv7 for time-ordered sorting.
//! `PartyKey` is the raw ed25519 verifying key, and `TransactionId` is a
//! content hash so every participant derives the same ID for the same proposal.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// PartyId
// ---------------------------------------------------------------------------

/// Opaque identity of a ledger participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PartyId(pub Uuid);

impl PartyId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for PartyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "party:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PartyKey
// ---------------------------------------------------------------------------

/// A party's attestation key: the raw ed25519 verifying key (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PartyKey(pub [u8; 32]);

impl PartyKey {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// SequencerId
// ---------------------------------------------------------------------------

/// Names the sequencing service that arbitrates consumption of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SequencerId(pub Uuid);

impl SequencerId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SequencerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SequencerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Identifies one point-to-point protocol session between two parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// SHA-256 content hash of a transaction. See [`crate::Transaction::compute_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TransactionId(pub [u8; 32]);

impl TransactionId {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// RecordRef
// ---------------------------------------------------------------------------

/// Identity of a record: the output slot of the transaction that produced it.
///
/// Two records with identical content are still distinct if they were
/// produced by different slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RecordRef {
    /// The transaction that produced the record.
    pub tx_id: TransactionId,
    /// Position of the record in that transaction's `produced` list.
    pub index: u32,
}

impl RecordRef {
    #[must_use]
    pub fn new(tx_id: TransactionId, index: u32) -> Self {
        Self { tx_id, index }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_id, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn party_id_uniqueness() {
        let a = PartyId::new();
        let b = PartyId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn party_id_ordering() {
        let a = PartyId::new();
        let b = PartyId::new();
        assert!(a < b);
    }

    #[test]
    fn record_ref_orders_by_tx_then_index() {
        let tx_a = TransactionId([1; 32]);
        let tx_b = TransactionId([2; 32]);
        assert!(RecordRef::new(tx_a, 5) < RecordRef::new(tx_b, 0));
        assert!(RecordRef::new(tx_a, 0) < RecordRef::new(tx_a, 1));
    }

    #[test]
    fn record_ref_display() {
        let r = RecordRef::new(TransactionId([0xAB; 32]), 3);
        assert_eq!(r.to_string(), "tx:abababababababab#3");
    }

    #[test]
    fn party_key_short() {
        let key = PartyKey([0x01; 32]);
        assert_eq!(key.short(), "01010101");
    }

    #[test]
    fn serde_roundtrips() {
        let pid = PartyId::new();
        let json = serde_json::to_string(&pid).unwrap();
        let back: PartyId = serde_json::from_str(&json).unwrap();
        assert_eq!(pid, back);

        let r = RecordRef::new(TransactionId([7; 32]), 1);
        let json = serde_json::to_string(&r).unwrap();
        let back: RecordRef = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
