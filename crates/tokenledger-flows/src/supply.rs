//! Issuer supply bookkeeping.
//!
//! Invariant checked on demand:
//! ```text
//! Σ(live records issued by me) == Σ(issued) - Σ(redeemed)
//! ```
//! Moves never change an issuer's outstanding supply, so only issuances and
//! redemptions are counted.

use tokenledger_types::{Intent, LedgerError, PartyId, Result, Transaction};

/// Running issued / redeemed totals for one issuer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplyLedger {
    issuer: PartyId,
    issued: i128,
    redeemed: i128,
}

impl SupplyLedger {
    #[must_use]
    pub fn new(issuer: PartyId) -> Self {
        Self {
            issuer,
            issued: 0,
            redeemed: 0,
        }
    }

    /// Count a committed transaction. Call once per transaction.
    pub fn record(&mut self, tx: &Transaction) {
        match tx.intent {
            Intent::Issue => {
                self.issued += tx
                    .produced
                    .iter()
                    .filter(|r| r.issuer.id == self.issuer)
                    .map(|r| i128::from(r.quantity))
                    .sum::<i128>();
            }
            Intent::Redeem => {
                self.redeemed += tx
                    .consumed
                    .iter()
                    .filter(|input| input.record.issuer.id == self.issuer)
                    .map(|input| i128::from(input.record.quantity))
                    .sum::<i128>();
            }
            Intent::Move => {}
        }
    }

    pub fn issued(&self) -> i128 {
        self.issued
    }

    pub fn redeemed(&self) -> i128 {
        self.redeemed
    }

    /// Expected outstanding supply: issued - redeemed.
    pub fn outstanding(&self) -> i128 {
        self.issued - self.redeemed
    }

    /// Compare the live supply observed in the record store with the totals.
    ///
    /// # Errors
    /// Returns [`LedgerError::SupplyInvariantViolation`] if they differ.
    pub fn verify(&self, live_supply: i128) -> Result<()> {
        let expected = self.outstanding();
        if live_supply != expected {
            return Err(LedgerError::SupplyInvariantViolation {
                reason: format!(
                    "issuer {}: live supply {live_supply} != expected {expected} \
                     (issued={}, redeemed={})",
                    self.issuer, self.issued, self.redeemed
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tokenledger_types::{LiveRecord, Party, Record, RecordRef, SequencerId, TransactionId};
    use uuid::Uuid;

    use super::*;

    fn tx(intent: Intent, consumed: Vec<LiveRecord>, produced: Vec<Record>) -> Transaction {
        Transaction::new(
            Uuid::now_v7(),
            SequencerId::new(),
            intent,
            consumed,
            produced,
            BTreeSet::new(),
        )
    }

    #[test]
    fn issue_then_redeem() {
        let (a, b, other) = (Party::dummy("A"), Party::dummy("B"), Party::dummy("Z"));
        let mut ledger = SupplyLedger::new(a.id);
        ledger.record(&tx(
            Intent::Issue,
            vec![],
            vec![Record::new(a.clone(), b.clone(), 70), Record::new(a.clone(), b.clone(), 30)],
        ));
        // Someone else's issuance does not count.
        ledger.record(&tx(Intent::Issue, vec![], vec![Record::new(other, b.clone(), 5)]));
        assert_eq!(ledger.issued(), 100);
        ledger.verify(100).unwrap();

        let input = LiveRecord::new(
            RecordRef::new(TransactionId([1; 32]), 0),
            Record::new(a.clone(), b, 30),
            SequencerId::new(),
        );
        ledger.record(&tx(Intent::Redeem, vec![input], vec![]));
        assert_eq!(ledger.redeemed(), 30);
        assert_eq!(ledger.outstanding(), 70);
        ledger.verify(70).unwrap();
    }

    #[test]
    fn mismatch_reported() {
        let a = Party::dummy("A");
        let ledger = SupplyLedger::new(a.id);
        let err = ledger.verify(1).unwrap_err();
        assert!(matches!(err, LedgerError::SupplyInvariantViolation { .. }));
        assert!(err.to_string().contains("TL_ERR_502"));
    }
}
