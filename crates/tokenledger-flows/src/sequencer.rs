//! Sequencing service: mutual exclusion over consumed records.
//!
//! A sequencer accepts each record reference as an input at most once,
//! across every submitter. It returns one binary decision per submission
//! and places accepted transactions in a total order.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokenledger_contract::verify;
use tokenledger_types::{
    FinalityReceipt, Party, Record, RecordRef, RejectReason, Result, SequencerDecision,
    SequencerId, SignedTransaction, TransactionId,
};
use tokio::sync::Mutex;

#[async_trait]
pub trait Sequencer: Send + Sync {
    fn id(&self) -> SequencerId;

    /// Decide on a fully attested transaction. `participants` are the
    /// parties that will learn the outcome.
    ///
    /// `Err` means no decision was reached; a refusal is
    /// `Ok(SequencerDecision::Rejected(_))`.
    async fn submit(
        &self,
        signed: &SignedTransaction,
        participants: &[Party],
    ) -> Result<SequencerDecision>;

    /// The receipt issued for `tx`, if this sequencer accepted it.
    ///
    /// Participants confirm a delivered receipt here before recording, so
    /// a peer cannot finalize a transaction the sequencer never saw.
    async fn receipt(&self, tx: &TransactionId) -> Result<Option<FinalityReceipt>>;
}

#[derive(Default)]
struct SequencerState {
    /// Input reference -> the transaction that consumed it. Never evicted.
    consumed: HashMap<RecordRef, TransactionId>,
    /// Outputs of accepted transactions, for checking submitted inputs.
    outputs: HashMap<RecordRef, Record>,
    accepted: HashMap<TransactionId, FinalityReceipt>,
    last_order: u64,
}

/// Single-process validating sequencer.
///
/// Besides double-spend detection it re-runs the contract, requires every
/// declared attestor's signature, and only accepts inputs it finalized as
/// outputs earlier with unaltered contents, keys included. Resubmitting an accepted
/// transaction returns the original receipt.
pub struct LocalSequencer {
    id: SequencerId,
    state: Mutex<SequencerState>,
}

impl LocalSequencer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(SequencerId::new())
    }

    #[must_use]
    pub fn with_id(id: SequencerId) -> Self {
        Self {
            id,
            state: Mutex::new(SequencerState::default()),
        }
    }

    /// Number of accepted transactions.
    pub async fn accepted_count(&self) -> usize {
        self.state.lock().await.accepted.len()
    }

    /// The transaction that consumed `reference`, if any.
    pub async fn consumed_by(&self, reference: &RecordRef) -> Option<TransactionId> {
        self.state.lock().await.consumed.get(reference).copied()
    }

    fn check(&self, signed: &SignedTransaction, state: &SequencerState) -> Option<RejectReason> {
        let tx = &signed.tx;
        if tx.sequencer != self.id {
            return Some(RejectReason::WrongSequencer {
                expected: self.id,
                actual: tx.sequencer,
            });
        }
        if !tx.verify_id() {
            return Some(RejectReason::Invalid {
                reason: "transaction id does not match contents".to_string(),
            });
        }
        if let Err(e) = verify(tx).and_then(|()| signed.verify_attestations()) {
            return Some(RejectReason::Invalid {
                reason: e.to_string(),
            });
        }

        let conflicts: Vec<RecordRef> = tx
            .consumed_refs()
            .into_iter()
            .filter(|r| state.consumed.contains_key(r))
            .collect();
        if !conflicts.is_empty() {
            return Some(RejectReason::DoubleSpend { conflicts });
        }

        for input in &tx.consumed {
            let known = state.outputs.get(&input.reference);
            if !known.is_some_and(|stored| stored.is_identical(&input.record)) {
                return Some(RejectReason::Invalid {
                    reason: format!("input {} is unknown or altered", input.reference),
                });
            }
        }
        None
    }
}

impl Default for LocalSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sequencer for LocalSequencer {
    fn id(&self) -> SequencerId {
        self.id
    }

    async fn submit(
        &self,
        signed: &SignedTransaction,
        participants: &[Party],
    ) -> Result<SequencerDecision> {
        let tx = &signed.tx;
        let mut state = self.state.lock().await;

        if let Some(receipt) = state.accepted.get(&tx.id) {
            tracing::debug!(sequencer = %self.id, tx = %tx.id, "Resubmission of accepted transaction");
            return Ok(SequencerDecision::Accepted(receipt.clone()));
        }

        if let Some(reason) = self.check(signed, &state) {
            tracing::info!(sequencer = %self.id, tx = %tx.id, %reason, "Transaction rejected");
            return Ok(SequencerDecision::Rejected(reason));
        }

        for input in &tx.consumed {
            state.consumed.insert(input.reference, tx.id);
            state.outputs.remove(&input.reference);
        }
        for live in tx.produced_live() {
            state.outputs.insert(live.reference, live.record);
        }
        state.last_order += 1;
        let receipt = FinalityReceipt {
            tx_id: tx.id,
            sequencer: self.id,
            order: state.last_order,
            finalized_at: Utc::now(),
        };
        state.accepted.insert(tx.id, receipt.clone());

        tracing::info!(
            sequencer = %self.id,
            tx = %tx.id,
            intent = %tx.intent,
            order = receipt.order,
            consumed = tx.consumed.len(),
            produced = tx.produced.len(),
            participants = participants.len(),
            "Transaction accepted"
        );
        Ok(SequencerDecision::Accepted(receipt))
    }

    async fn receipt(&self, tx: &TransactionId) -> Result<Option<FinalityReceipt>> {
        Ok(self.state.lock().await.accepted.get(tx).cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use ed25519_dalek::SigningKey;
    use tokenledger_types::{Attestation, Intent, LiveRecord, Transaction};
    use uuid::Uuid;

    use super::*;

    struct Fixture {
        seq: LocalSequencer,
        a: (Party, SigningKey),
        b: (Party, SigningKey),
        c: Party,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                seq: LocalSequencer::new(),
                a: Party::generate("A"),
                b: Party::generate("B"),
                c: Party::dummy("C"),
            }
        }

        fn signed(
            &self,
            intent: Intent,
            consumed: Vec<LiveRecord>,
            produced: Vec<Record>,
            signers: &[&(Party, SigningKey)],
        ) -> SignedTransaction {
            let attestors: BTreeSet<_> = signers.iter().map(|(p, _)| p.key).collect();
            let tx = Transaction::new(Uuid::now_v7(), self.seq.id(), intent, consumed, produced, attestors);
            let mut signed = SignedTransaction::new(tx);
            for (_, key) in signers {
                signed.add_attestation(Attestation::sign(&signed.id(), key)).unwrap();
            }
            signed
        }

        async fn issue_to_b(&self, qty: i64) -> LiveRecord {
            let signed = self.signed(
                Intent::Issue,
                vec![],
                vec![Record::new(self.a.0.clone(), self.b.0.clone(), qty)],
                &[&self.a],
            );
            assert!(self.seq.submit(&signed, &[]).await.unwrap().is_accepted());
            signed.tx.produced_live().remove(0)
        }

        fn move_to_c(&self, input: LiveRecord) -> SignedTransaction {
            let out = Record::new(input.record.issuer.clone(), self.c.clone(), input.record.quantity);
            self.signed(Intent::Move, vec![input], vec![out], &[&self.b])
        }
    }

    #[tokio::test]
    async fn orders_are_monotonic() {
        let f = Fixture::new();
        f.issue_to_b(1).await;
        f.issue_to_b(2).await;
        let signed = f.signed(
            Intent::Issue,
            vec![],
            vec![Record::new(f.a.0.clone(), f.b.0.clone(), 3)],
            &[&f.a],
        );
        match f.seq.submit(&signed, &[]).await.unwrap() {
            SequencerDecision::Accepted(r) => {
                assert_eq!(r.order, 3);
                assert_eq!(r.tx_id, signed.id());
                assert_eq!(r.sequencer, f.seq.id());
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn double_spend_rejected() {
        let f = Fixture::new();
        let input = f.issue_to_b(10).await;
        let first = f.move_to_c(input.clone());
        let second = f.move_to_c(input.clone());
        assert_ne!(first.id(), second.id());

        assert!(f.seq.submit(&first, &[]).await.unwrap().is_accepted());
        let decision = f.seq.submit(&second, &[]).await.unwrap();
        assert_eq!(
            decision,
            SequencerDecision::Rejected(RejectReason::DoubleSpend {
                conflicts: vec![input.reference]
            })
        );
        assert_eq!(f.seq.consumed_by(&input.reference).await, Some(first.id()));
    }

    #[tokio::test]
    async fn resubmission_is_idempotent() {
        let f = Fixture::new();
        let input = f.issue_to_b(10).await;
        let mv = f.move_to_c(input);
        let first = f.seq.submit(&mv, &[]).await.unwrap();
        let again = f.seq.submit(&mv, &[]).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(f.seq.accepted_count().await, 2);
    }

    #[tokio::test]
    async fn missing_attestation_rejected() {
        let f = Fixture::new();
        let input = f.issue_to_b(10).await;
        let mut mv = f.move_to_c(input.clone());
        mv.attestations.clear();
        let decision = f.seq.submit(&mv, &[]).await.unwrap();
        assert!(matches!(decision, SequencerDecision::Rejected(RejectReason::Invalid { .. })));
        assert_eq!(f.seq.consumed_by(&input.reference).await, None);
    }

    #[tokio::test]
    async fn redeem_without_issuer_rejected() {
        let f = Fixture::new();
        let input = f.issue_to_b(10).await;
        let redeem = f.signed(Intent::Redeem, vec![input], vec![], &[&f.b]);
        match f.seq.submit(&redeem, &[]).await.unwrap() {
            SequencerDecision::Rejected(RejectReason::Invalid { reason }) => {
                assert!(reason.contains("TL_RULE_10"), "{reason}");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fabricated_input_rejected() {
        let f = Fixture::new();
        let mut input = f.issue_to_b(10).await;
        input.record.quantity = 1_000;
        let decision = f.seq.submit(&f.move_to_c(input), &[]).await.unwrap();
        assert!(matches!(decision, SequencerDecision::Rejected(RejectReason::Invalid { .. })));
    }

    #[tokio::test]
    async fn rekeyed_input_rejected() {
        let f = Fixture::new();
        let input = f.issue_to_b(10).await;
        let mallory = Party::generate("Mallory");

        // Same reference and holder id as B's record, but Mallory's key.
        let mut stolen = input.clone();
        stolen.record.holder.key = mallory.0.key;
        let out = Record::new(f.a.0.clone(), mallory.0.clone(), 10);
        let theft = f.signed(Intent::Move, vec![stolen], vec![out], &[&mallory]);
        assert!(verify(&theft.tx).is_ok());

        let decision = f.seq.submit(&theft, &[]).await.unwrap();
        assert!(
            matches!(decision, SequencerDecision::Rejected(RejectReason::Invalid { .. })),
            "got {decision:?}"
        );
        assert_eq!(f.seq.consumed_by(&input.reference).await, None);

        // B can still spend it.
        assert!(f.seq.submit(&f.move_to_c(input), &[]).await.unwrap().is_accepted());
    }

    #[tokio::test]
    async fn receipt_lookup() {
        let f = Fixture::new();
        let input = f.issue_to_b(10).await;
        let mv = f.move_to_c(input);
        assert_eq!(f.seq.receipt(&mv.id()).await.unwrap(), None);

        let SequencerDecision::Accepted(issued) = f.seq.submit(&mv, &[]).await.unwrap() else {
            panic!("expected acceptance");
        };
        assert_eq!(f.seq.receipt(&mv.id()).await.unwrap(), Some(issued));
    }

    #[tokio::test]
    async fn foreign_sequencer_rejected() {
        let f = Fixture::new();
        let other = LocalSequencer::new();
        let signed = f.signed(
            Intent::Issue,
            vec![],
            vec![Record::new(f.a.0.clone(), f.b.0.clone(), 1)],
            &[&f.a],
        );
        let decision = other.submit(&signed, &[]).await.unwrap();
        assert!(matches!(
            decision,
            SequencerDecision::Rejected(RejectReason::WrongSequencer { .. })
        ));
    }
}
