//! Proposed ledger mutations.
//!
//! A [`Transaction`] consumes zero or more live records, produces zero or
//! more new ones, carries exactly one [`Intent`], and declares the set of
//! keys that must attest to it. It is accepted or rejected as a whole.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    LedgerError, LiveRecord, Party, PartyKey, Record, RecordRef, Result, SequencerId,
    TransactionId, constants,
};

/// What a transaction is meant to do. Closed set: the validation engine
/// matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Intent {
    /// Create new supply. No inputs.
    Issue,
    /// Transfer existing supply between holders, conserving per-issuer totals.
    Move,
    /// Destroy supply. No outputs.
    Redeem,
}

impl Intent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "ISSUE",
            Self::Move => "MOVE",
            Self::Redeem => "REDEEM",
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::Issue => 0,
            Self::Move => 1,
            Self::Redeem => 2,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ISSUE" => Ok(Self::Issue),
            "MOVE" => Ok(Self::Move),
            "REDEEM" => Ok(Self::Redeem),
            _ => Err(LedgerError::UnknownIntent(s.to_string())),
        }
    }
}

impl TryFrom<String> for Intent {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Intent> for String {
    fn from(intent: Intent) -> Self {
        intent.as_str().to_string()
    }
}

/// A proposed, not yet attested, ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Content hash; see [`Transaction::compute_id`].
    pub id: TransactionId,
    /// Uniqueness salt so that two identical proposals are distinct transactions.
    pub nonce: Uuid,
    /// The sequencer that must arbitrate this transaction.
    pub sequencer: SequencerId,
    /// The single intent tag.
    pub intent: Intent,
    /// Records spent, in order, with their contents.
    pub consumed: Vec<LiveRecord>,
    /// Records created, in order. Output `i` becomes `RecordRef { tx_id: id, index: i }`.
    pub produced: Vec<Record>,
    /// Keys that must attest before the sequencer will accept the transaction.
    pub attestors: BTreeSet<PartyKey>,
}

impl Transaction {
    /// Assemble a transaction and compute its ID.
    #[must_use]
    pub fn new(
        nonce: Uuid,
        sequencer: SequencerId,
        intent: Intent,
        consumed: Vec<LiveRecord>,
        produced: Vec<Record>,
        attestors: BTreeSet<PartyKey>,
    ) -> Self {
        let mut tx = Self {
            id: TransactionId([0u8; 32]),
            nonce,
            sequencer,
            intent,
            consumed,
            produced,
            attestors,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// SHA-256 over the canonical encoding of every field except `id`.
    ///
    /// Format: `"tokenledger:tx:v1:" || nonce || sequencer || intent ||
    /// n_consumed || (ref, record)... || n_produced || record... ||
    /// n_attestors || keys...`, where each record is encoded as
    /// `issuer id || issuer key || holder id || holder key || quantity`.
    #[must_use]
    pub fn compute_id(&self) -> TransactionId {
        let mut hasher = Sha256::new();
        hasher.update(constants::TX_ID_DOMAIN);
        hasher.update(self.nonce.as_bytes());
        hasher.update(self.sequencer.0.as_bytes());
        hasher.update([self.intent.tag()]);

        hasher.update((self.consumed.len() as u64).to_le_bytes());
        for input in &self.consumed {
            hasher.update(input.reference.tx_id.as_bytes());
            hasher.update(input.reference.index.to_le_bytes());
            hash_record(&mut hasher, &input.record);
        }

        hasher.update((self.produced.len() as u64).to_le_bytes());
        for record in &self.produced {
            hash_record(&mut hasher, record);
        }

        hasher.update((self.attestors.len() as u64).to_le_bytes());
        for key in &self.attestors {
            hasher.update(key.as_bytes());
        }

        TransactionId(hasher.finalize().into())
    }

    /// Whether `id` still matches the contents.
    #[must_use]
    pub fn verify_id(&self) -> bool {
        self.compute_id() == self.id
    }

    /// References of the consumed records, in order.
    #[must_use]
    pub fn consumed_refs(&self) -> Vec<RecordRef> {
        self.consumed.iter().map(|input| input.reference).collect()
    }

    /// The produced records as live records, with the references they get
    /// once this transaction is finalized.
    #[must_use]
    pub fn produced_live(&self) -> Vec<LiveRecord> {
        self.produced
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let index = u32::try_from(index).unwrap_or(u32::MAX);
                LiveRecord::new(RecordRef::new(self.id, index), record.clone(), self.sequencer)
            })
            .collect()
    }

    /// Every party named as issuer or holder in a consumed or produced record,
    /// in first-seen order.
    #[must_use]
    pub fn named_parties(&self) -> Vec<Party> {
        let mut seen = HashSet::new();
        self.consumed
            .iter()
            .map(|input| &input.record)
            .chain(self.produced.iter())
            .flat_map(Record::participants)
            .filter(|party| seen.insert(party.id))
            .cloned()
            .collect()
    }

    /// Decode a transaction received as JSON.
    ///
    /// The intent tag is checked before the rest of the payload so that an
    /// unrecognised tag surfaces as [`LedgerError::UnknownIntent`].
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        let tag = value
            .get("intent")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| LedgerError::Serialization("missing intent tag".into()))?;
        tag.parse::<Intent>()?;
        serde_json::from_value(value).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LedgerError::Serialization(e.to_string()))
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} in={} out={}",
            self.id,
            self.intent,
            self.consumed.len(),
            self.produced.len()
        )
    }
}

fn hash_record(hasher: &mut Sha256, record: &Record) {
    hasher.update(record.issuer.id.0.as_bytes());
    hasher.update(record.issuer.key.as_bytes());
    hasher.update(record.holder.id.0.as_bytes());
    hasher.update(record.holder.key.as_bytes());
    hasher.update(record.quantity.to_le_bytes());
}
