//! Sequencer decisions and finality receipts.
//!
//! The sequencing service returns exactly one [`SequencerDecision`] per
//! submitted transaction. Acceptance carries a [`FinalityReceipt`] fixing the
//! transaction's position in the global total order.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{RecordRef, SequencerId, TransactionId};

/// Proof that a sequencer accepted a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalityReceipt {
    /// The accepted transaction.
    pub tx_id: TransactionId,
    /// The sequencer that accepted it.
    pub sequencer: SequencerId,
    /// Position in the sequencer's total order (starts at 1).
    pub order: u64,
    /// When the sequencer accepted it.
    pub finalized_at: DateTime<Utc>,
}

impl fmt::Display for FinalityReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{} by {}", self.tx_id, self.order, self.sequencer)
    }
}

/// Why a sequencer refused a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Some consumed references were already consumed by another transaction.
    DoubleSpend {
        conflicts: Vec<RecordRef>,
    },
    /// The transaction failed validation or is missing attestations.
    Invalid { reason: String },
    /// The transaction names a different sequencer.
    WrongSequencer {
        expected: SequencerId,
        actual: SequencerId,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DoubleSpend { conflicts } => {
                write!(f, "double spend of {} record(s)", conflicts.len())
            }
            Self::Invalid { reason } => write!(f, "invalid: {reason}"),
            Self::WrongSequencer { expected, actual } => {
                write!(f, "wrong sequencer: expected {expected}, got {actual}")
            }
        }
    }
}

/// The single binary outcome of a sequencer submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequencerDecision {
    Accepted(FinalityReceipt),
    Rejected(RejectReason),
}

impl SequencerDecision {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}
