//! Ledger records.
//!
//! A [`Record`] is an immutable quantity of token held by one party and
//! attributable to one issuer. It is either live or consumed, never mutated:
//! a transaction consumes records and produces their successors.
//!
//! ```text
//!   produced by an accepted tx   consumed by one later accepted tx
//!   ─────────────────────────▶ LIVE ─────────────────────────────▶ CONSUMED
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Party, RecordRef, SequencerId};

/// Quantity of token owned by `holder`, issued by `issuer`.
///
/// `quantity` must be positive on the ledger. The type does not enforce it
/// so that the validation engine can reject malformed proposals with a
/// precise reason instead of failing at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Provenance tag; retains redemption and supply-tracking authority.
    pub issuer: Party,
    /// Current owner.
    pub holder: Party,
    /// Number of token units.
    pub quantity: i64,
}

impl Record {
    #[must_use]
    pub fn new(issuer: Party, holder: Party, quantity: i64) -> Self {
        Self {
            issuer,
            holder,
            quantity,
        }
    }

    /// Parties entitled to see this record.
    #[must_use]
    pub fn participants(&self) -> [&Party; 2] {
        [&self.issuer, &self.holder]
    }

    /// Whether `party` is the issuer or the holder.
    #[must_use]
    pub fn involves(&self, party: &Party) -> bool {
        self.issuer == *party || self.holder == *party
    }

    /// Field-for-field equality including key material.
    ///
    /// `==` goes through party identity only; use this wherever a record
    /// is checked against a previously finalized copy.
    #[must_use]
    pub fn is_identical(&self, other: &Record) -> bool {
        self.quantity == other.quantity
            && self.issuer.id == other.issuer.id
            && self.issuer.key == other.issuer.key
            && self.holder.id == other.holder.id
            && self.holder.key == other.holder.key
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}:{}", self.issuer, self.holder, self.quantity)
    }
}

/// A live record together with its identity and governing sequencer.
///
/// This is what the record store returns and what a transaction carries in
/// its `consumed` list, so the record's contents travel with its reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveRecord {
    /// The output slot that created the record.
    pub reference: RecordRef,
    /// Record contents.
    pub record: Record,
    /// The sequencer that must arbitrate consumption of this record.
    pub sequencer: SequencerId,
}

impl LiveRecord {
    #[must_use]
    pub fn new(reference: RecordRef, record: Record, sequencer: SequencerId) -> Self {
        Self {
            reference,
            record,
            sequencer,
        }
    }
}

impl fmt::Display for LiveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.record, self.reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransactionId;

    #[test]
    fn participants_are_issuer_and_holder() {
        let issuer = Party::dummy("issuer");
        let holder = Party::dummy("holder");
        let record = Record::new(issuer.clone(), holder.clone(), 10);
        let [a, b] = record.participants();
        assert_eq!(a, &issuer);
        assert_eq!(b, &holder);
        assert!(record.involves(&issuer));
        assert!(record.involves(&holder));
        assert!(!record.involves(&Party::dummy("stranger")));
    }

    #[test]
    fn identical_content_distinct_identity() {
        let issuer = Party::dummy("issuer");
        let holder = Party::dummy("holder");
        let record = Record::new(issuer, holder, 5);
        let seq = SequencerId::new();
        let a = LiveRecord::new(RecordRef::new(TransactionId([1; 32]), 0), record.clone(), seq);
        let b = LiveRecord::new(RecordRef::new(TransactionId([1; 32]), 1), record, seq);
        assert_eq!(a.record, b.record);
        assert_ne!(a.reference, b.reference);
        assert_ne!(a, b);
    }

    #[test]
    fn identity_equal_is_not_identical_with_another_key() {
        let issuer = Party::dummy("issuer");
        let holder = Party::dummy("holder");
        let record = Record::new(issuer, holder, 5);
        let mut rekeyed = record.clone();
        rekeyed.holder.key = Party::dummy("mallory").key;

        assert_eq!(record, rekeyed);
        assert!(!record.is_identical(&rekeyed));
        assert!(record.is_identical(&record));

        let mut more = record.clone();
        more.quantity = 6;
        assert!(!record.is_identical(&more));
    }

    #[test]
    fn display_format() {
        let record = Record::new(Party::dummy("A"), Party::dummy("B"), 99);
        assert_eq!(record.to_string(), "A->B:99");
    }
}
