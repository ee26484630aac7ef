//! Low-level transaction assembly.

use std::collections::{BTreeSet, HashSet};

use tokenledger_types::{
    Intent, LedgerError, LiveRecord, Party, PartyKey, Record, RecordRef, Result, SequencerId,
    Transaction,
};
use uuid::Uuid;

/// Accumulates inputs, outputs, and attestors for one transaction.
///
/// Every input must be governed by the builder's sequencer, and no
/// reference may be added twice.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    sequencer: SequencerId,
    intent: Intent,
    consumed: Vec<LiveRecord>,
    seen: HashSet<RecordRef>,
    produced: Vec<Record>,
    attestors: BTreeSet<PartyKey>,
}

impl TransactionBuilder {
    #[must_use]
    pub fn new(intent: Intent, sequencer: SequencerId) -> Self {
        Self {
            sequencer,
            intent,
            consumed: Vec::new(),
            seen: HashSet::new(),
            produced: Vec::new(),
            attestors: BTreeSet::new(),
        }
    }

    /// Consume a live record.
    ///
    /// # Errors
    /// - `DuplicateConsumed` if the reference is already an input
    /// - `WrongSequencer` if the record is governed by another sequencer
    pub fn add_input(&mut self, live: LiveRecord) -> Result<&mut Self> {
        if live.sequencer != self.sequencer {
            return Err(LedgerError::WrongSequencer {
                expected: self.sequencer,
                actual: live.sequencer,
            });
        }
        if !self.seen.insert(live.reference) {
            return Err(LedgerError::DuplicateConsumed(live.reference));
        }
        self.consumed.push(live);
        Ok(self)
    }

    pub fn add_output(&mut self, record: Record) -> &mut Self {
        self.produced.push(record);
        self
    }

    pub fn add_attestor(&mut self, party: &Party) -> &mut Self {
        self.attestors.insert(party.key);
        self
    }

    /// Seal the transaction under a fresh nonce.
    #[must_use]
    pub fn build(self) -> Transaction {
        Transaction::new(
            Uuid::now_v7(),
            self.sequencer,
            self.intent,
            self.consumed,
            self.produced,
            self.attestors,
        )
    }
}

#[cfg(test)]
mod tests {
    use tokenledger_types::TransactionId;

    use super::*;

    fn live(seq: SequencerId, index: u32) -> LiveRecord {
        LiveRecord::new(
            RecordRef::new(TransactionId([4; 32]), index),
            Record::new(Party::dummy("A"), Party::dummy("B"), 5),
            seq,
        )
    }

    #[test]
    fn builds_with_declared_parts() {
        let seq = SequencerId::new();
        let b = Party::dummy("B");
        let input = live(seq, 0);
        let mut builder = TransactionBuilder::new(Intent::Move, seq);
        builder
            .add_input(input.clone())
            .unwrap()
            .add_output(Record::new(input.record.issuer.clone(), b.clone(), 5))
            .add_attestor(&input.record.holder);
        let tx = builder.build();
        assert_eq!(tx.intent, Intent::Move);
        assert_eq!(tx.consumed, vec![input.clone()]);
        assert_eq!(tx.produced.len(), 1);
        assert!(tx.attestors.contains(&input.record.holder.key));
        assert!(tx.verify_id());
    }

    #[test]
    fn duplicate_input_refused() {
        let seq = SequencerId::new();
        let input = live(seq, 3);
        let mut builder = TransactionBuilder::new(Intent::Redeem, seq);
        builder.add_input(input.clone()).unwrap();
        let err = builder.add_input(input.clone()).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateConsumed(r) if r == input.reference));
    }

    #[test]
    fn foreign_sequencer_refused() {
        let mut builder = TransactionBuilder::new(Intent::Move, SequencerId::new());
        let err = builder.add_input(live(SequencerId::new(), 0)).unwrap_err();
        assert!(matches!(err, LedgerError::WrongSequencer { .. }));
    }

    #[test]
    fn identical_builds_get_distinct_ids() {
        let seq = SequencerId::new();
        let a = Party::dummy("A");
        let make = || {
            let mut builder = TransactionBuilder::new(Intent::Issue, seq);
            builder
                .add_output(Record::new(a.clone(), a.clone(), 1))
                .add_attestor(&a);
            builder.build()
        };
        assert_ne!(make().id, make().id);
    }
}
