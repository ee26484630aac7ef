//! Record store: the participant's local view of live records.
//!
//! A store is written only with finalized transactions. Local knowledge of
//! which records are live is advisory: once a proposal leaves this node a
//! concurrent transaction elsewhere may already have consumed the same
//! record, and only the sequencer can tell.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use tokenledger_types::{
    LedgerError, LiveRecord, Party, PartyId, RecordRef, Result, SignedTransaction, TransactionId,
};

/// Predicate over live records. `None` fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub issuer: Option<PartyId>,
    pub holder: Option<PartyId>,
    /// Inclusive lower bound on quantity.
    pub min_quantity: Option<i64>,
    pub exact_quantity: Option<i64>,
}

impl RecordFilter {
    /// Records issued by `issuer` and held by `holder`.
    #[must_use]
    pub fn issued_to(issuer: PartyId, holder: PartyId) -> Self {
        Self {
            issuer: Some(issuer),
            holder: Some(holder),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn at_least(mut self, quantity: i64) -> Self {
        self.min_quantity = Some(quantity);
        self
    }

    #[must_use]
    pub fn exactly(mut self, quantity: i64) -> Self {
        self.exact_quantity = Some(quantity);
        self
    }

    #[must_use]
    pub fn matches(&self, live: &LiveRecord) -> bool {
        let r = &live.record;
        self.issuer.is_none_or(|id| r.issuer.id == id)
            && self.holder.is_none_or(|id| r.holder.id == id)
            && self.min_quantity.is_none_or(|q| r.quantity >= q)
            && self.exact_quantity.is_none_or(|q| r.quantity == q)
    }
}

/// Result of recording a finalized transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The transaction was recorded before; nothing changed.
    AlreadyApplied,
}

/// Query/append collaborator holding one participant's live records.
///
/// Implementations must allow concurrent readers. `apply` must be safe to
/// call again with a transaction that was already recorded.
pub trait RecordStore: Send + Sync {
    /// The participant this store belongs to.
    fn owner(&self) -> &Party;

    /// Live records matching `filter`, in recording order.
    fn query(&self, filter: &RecordFilter) -> Result<Vec<LiveRecord>>;

    /// Record a finalized transaction: consumed records die, produced records
    /// the owner participates in become live.
    fn apply(&self, signed: &SignedTransaction) -> Result<ApplyOutcome>;

    /// A previously recorded transaction.
    fn transaction(&self, id: &TransactionId) -> Result<Option<SignedTransaction>>;
}

#[derive(Default)]
struct StoreState {
    /// Live records in recording order.
    live: Vec<LiveRecord>,
    /// Every reference ever seen consumed.
    consumed: HashSet<RecordRef>,
    transactions: HashMap<TransactionId, SignedTransaction>,
}

/// In-memory [`RecordStore`].
pub struct MemoryRecordStore {
    owner: Party,
    state: RwLock<StoreState>,
}

impl MemoryRecordStore {
    /// Create an empty store for `owner`.
    #[must_use]
    pub fn for_party(owner: Party) -> Self {
        Self {
            owner,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Number of live records.
    pub fn live_count(&self) -> Result<usize> {
        Ok(self.state.read().map_err(poisoned)?.live.len())
    }

    /// Whether `reference` has been consumed by a recorded transaction.
    pub fn is_consumed(&self, reference: &RecordRef) -> Result<bool> {
        Ok(self
            .state
            .read()
            .map_err(poisoned)?
            .consumed
            .contains(reference))
    }
}

fn poisoned<T>(_: PoisonError<T>) -> LedgerError {
    LedgerError::RecordStore("store lock poisoned".to_string())
}

impl RecordStore for MemoryRecordStore {
    fn owner(&self) -> &Party {
        &self.owner
    }

    fn query(&self, filter: &RecordFilter) -> Result<Vec<LiveRecord>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .live
            .iter()
            .filter(|live| filter.matches(live))
            .cloned()
            .collect())
    }

    fn apply(&self, signed: &SignedTransaction) -> Result<ApplyOutcome> {
        let tx = &signed.tx;
        let mut state = self.state.write().map_err(poisoned)?;
        if state.transactions.contains_key(&tx.id) {
            tracing::debug!(tx = %tx.id, party = %self.owner, "Transaction already recorded");
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        let consumed: HashSet<RecordRef> = tx.consumed_refs().into_iter().collect();
        state.live.retain(|live| !consumed.contains(&live.reference));
        state.consumed.extend(consumed);

        let mut added = 0usize;
        for live in tx.produced_live() {
            if live.record.involves(&self.owner) && !state.consumed.contains(&live.reference) {
                state.live.push(live);
                added += 1;
            }
        }
        state.transactions.insert(tx.id, signed.clone());

        tracing::debug!(
            tx = %tx.id,
            party = %self.owner,
            consumed = tx.consumed.len(),
            added,
            "Transaction recorded"
        );
        Ok(ApplyOutcome::Applied)
    }

    fn transaction(&self, id: &TransactionId) -> Result<Option<SignedTransaction>> {
        Ok(self.state.read().map_err(poisoned)?.transactions.get(id).cloned())
    }
}
