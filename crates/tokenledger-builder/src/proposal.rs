//! Per-intent builders.
//!
//! Each operation selects its inputs from the initiator's record store,
//! assembles the transaction, and runs the contract locally. Nothing here
//! touches the network: a [`Proposal`] that comes back has already passed
//! validation and says who must co-attest and who must learn the outcome.

use tokenledger_contract::verify;
use tokenledger_types::{
    Intent, LedgerError, LiveRecord, Party, Record, Result, SelectionPolicy, SequencerId,
    Transaction,
};

use crate::builder::TransactionBuilder;
use crate::selection::select;
use crate::store::{RecordFilter, RecordStore};

/// A locally valid transaction plus its distribution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub tx: Transaction,
    /// Parties other than the initiator that must attest before submission.
    pub counter_attestors: Vec<Party>,
    /// Parties other than the initiator and counter-attestors that receive
    /// the finalized transaction as consensus participants.
    pub observers: Vec<Party>,
    /// Issuer that receives a best-effort copy for supply tracking.
    pub supply_copy: Option<Party>,
}

impl Proposal {
    /// Every party that must learn the outcome, excluding the initiator.
    pub fn participants(&self) -> impl Iterator<Item = &Party> {
        self.counter_attestors.iter().chain(&self.observers)
    }
}

/// Builds proposals on behalf of one party.
pub struct ProposalBuilder<'a> {
    me: &'a Party,
    store: &'a dyn RecordStore,
    selection: SelectionPolicy,
    /// Sequencer for issuances, which have no inputs to inherit one from.
    issuance_sequencer: SequencerId,
}

impl<'a> ProposalBuilder<'a> {
    #[must_use]
    pub fn new(
        me: &'a Party,
        store: &'a dyn RecordStore,
        selection: SelectionPolicy,
        issuance_sequencer: SequencerId,
    ) -> Self {
        Self {
            me,
            store,
            selection,
            issuance_sequencer,
        }
    }

    /// Create `quantity` new tokens issued by this party and held by `holder`.
    pub fn issue(&self, holder: &Party, quantity: i64) -> Result<Proposal> {
        self.issue_many(&[(holder.clone(), quantity)])
    }

    /// One issuance transaction with an output per `(holder, quantity)` pair.
    /// Holders do not attest; only this party as issuer does.
    pub fn issue_many(&self, outputs: &[(Party, i64)]) -> Result<Proposal> {
        let mut builder = TransactionBuilder::new(Intent::Issue, self.issuance_sequencer);
        for (holder, quantity) in outputs {
            builder.add_output(Record::new(self.me.clone(), holder.clone(), *quantity));
        }
        builder.add_attestor(self.me);

        let observers = distinct_excluding(outputs.iter().map(|(holder, _)| holder), self.me);
        self.finish(builder.build(), Vec::new(), observers, None)
    }

    /// Move `quantity` of `issuer`'s tokens from this party to `new_holder`.
    ///
    /// One live record covering the whole quantity is consumed; any remainder
    /// comes back to this party as a change record.
    ///
    /// # Errors
    /// - `SameEntity` if `new_holder` is this party, checked before anything else
    /// - `NonPositiveQuantity` if `quantity` is zero or negative
    /// - `InsufficientFunds` if no single live record covers `quantity`
    pub fn plan_move(&self, issuer: &Party, quantity: i64, new_holder: &Party) -> Result<Proposal> {
        if new_holder == self.me {
            return Err(LedgerError::SameEntity(self.me.id));
        }
        positive(quantity)?;

        let filter = RecordFilter::issued_to(issuer.id, self.me.id).at_least(quantity);
        let eligible = self.store.query(&filter)?;
        let Some(input) = select(&eligible, self.selection).cloned() else {
            return Err(LedgerError::InsufficientFunds {
                issuer: issuer.id,
                requested: quantity,
            });
        };
        tracing::debug!(
            party = %self.me,
            input = %input.reference,
            held = input.record.quantity,
            requested = quantity,
            eligible = eligible.len(),
            "Selected record for move"
        );

        let remainder = input.record.quantity.checked_sub(quantity).ok_or(
            LedgerError::InsufficientFunds {
                issuer: issuer.id,
                requested: quantity,
            },
        )?;
        let mut builder = TransactionBuilder::new(Intent::Move, input.sequencer);
        builder.add_input(input)?;
        builder.add_output(Record::new(issuer.clone(), new_holder.clone(), quantity));
        if remainder > 0 {
            builder.add_output(Record::new(issuer.clone(), self.me.clone(), remainder));
        }
        builder.add_attestor(self.me);

        let supply_copy =
            (issuer != self.me && issuer != new_holder).then(|| issuer.clone());
        self.finish(builder.build(), Vec::new(), vec![new_holder.clone()], supply_copy)
    }

    /// Redeem exactly `quantity` of `issuer`'s tokens held by this party.
    /// The issuer must counter-attest.
    ///
    /// # Errors
    /// - `NonPositiveQuantity` if `quantity` is zero or negative
    /// - `NoMatchingRecord` if no live record has exactly `quantity`
    pub fn plan_redeem(&self, issuer: &Party, quantity: i64) -> Result<Proposal> {
        let input = self.exact_match(issuer, self.me, quantity)?;
        self.redemption(input, issuer)
    }

    /// Redeem exactly `quantity` of this party's tokens held by `holder`.
    /// The holder must counter-attest.
    ///
    /// # Errors
    /// - `NonPositiveQuantity` if `quantity` is zero or negative
    /// - `NoMatchingRecord` if no live record has exactly `quantity`
    pub fn plan_redeem_from(&self, holder: &Party, quantity: i64) -> Result<Proposal> {
        let input = self.exact_match(self.me, holder, quantity)?;
        self.redemption(input, holder)
    }

    fn exact_match(&self, issuer: &Party, holder: &Party, quantity: i64) -> Result<LiveRecord> {
        positive(quantity)?;
        let filter = RecordFilter::issued_to(issuer.id, holder.id).exactly(quantity);
        let eligible = self.store.query(&filter)?;
        select(&eligible, SelectionPolicy::FirstRecorded)
            .cloned()
            .ok_or(LedgerError::NoMatchingRecord {
                issuer: issuer.id,
                holder: holder.id,
                quantity,
            })
    }

    fn redemption(&self, input: LiveRecord, counterparty: &Party) -> Result<Proposal> {
        let issuer = input.record.issuer.clone();
        let holder = input.record.holder.clone();
        let mut builder = TransactionBuilder::new(Intent::Redeem, input.sequencer);
        builder.add_input(input)?;
        builder.add_attestor(&issuer).add_attestor(&holder);

        let counter_attestors = if counterparty == self.me {
            Vec::new()
        } else {
            vec![counterparty.clone()]
        };
        self.finish(builder.build(), counter_attestors, Vec::new(), None)
    }

    fn finish(
        &self,
        tx: Transaction,
        counter_attestors: Vec<Party>,
        observers: Vec<Party>,
        supply_copy: Option<Party>,
    ) -> Result<Proposal> {
        verify(&tx)?;
        tracing::debug!(
            tx = %tx.id,
            intent = %tx.intent,
            party = %self.me,
            counter_attestors = counter_attestors.len(),
            observers = observers.len(),
            "Proposal built"
        );
        Ok(Proposal {
            tx,
            counter_attestors,
            observers,
            supply_copy,
        })
    }
}

fn positive(quantity: i64) -> Result<()> {
    if quantity > 0 {
        Ok(())
    } else {
        Err(LedgerError::NonPositiveQuantity(quantity))
    }
}

/// Distinct parties in first-seen order, leaving out `me`.
fn distinct_excluding<'p>(parties: impl Iterator<Item = &'p Party>, me: &Party) -> Vec<Party> {
    let mut out: Vec<Party> = Vec::new();
    for party in parties {
        if party != me && !out.contains(party) {
            out.push(party.clone());
        }
    }
    out
}
