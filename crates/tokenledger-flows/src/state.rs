//! Per-transaction flow state machine.
//!
//! ```text
//! BUILDING -> LOCALLY_VALID -> [AWAITING_COUNTERSIGNATURES] -> SUBMITTED_TO_SEQUENCER -> FINALIZED
//!     \              \                    \                              \
//!      +--------------+--------------------+------------------------------+--> REJECTED
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tokenledger_types::{LedgerError, Result, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowState {
    Building,
    LocallyValid,
    AwaitingCountersignatures,
    SubmittedToSequencer,
    Finalized,
    Rejected,
}

impl FlowState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Building, Self::LocallyValid | Self::Rejected)
                | (
                    Self::LocallyValid,
                    Self::AwaitingCountersignatures | Self::SubmittedToSequencer | Self::Rejected
                )
                | (
                    Self::AwaitingCountersignatures,
                    Self::SubmittedToSequencer | Self::Rejected
                )
                | (Self::SubmittedToSequencer, Self::Finalized | Self::Rejected)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Rejected)
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Building => "BUILDING",
            Self::LocallyValid => "LOCALLY_VALID",
            Self::AwaitingCountersignatures => "AWAITING_COUNTERSIGNATURES",
            Self::SubmittedToSequencer => "SUBMITTED_TO_SEQUENCER",
            Self::Finalized => "FINALIZED",
            Self::Rejected => "REJECTED",
        };
        write!(f, "{s}")
    }
}

/// Current state of one flow instance, with transition checking.
#[derive(Debug)]
pub struct FlowTracker {
    party: String,
    state: FlowState,
    tx: Option<TransactionId>,
}

impl FlowTracker {
    #[must_use]
    pub fn new(party: impl Into<String>) -> Self {
        Self {
            party: party.into(),
            state: FlowState::Building,
            tx: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn bind(&mut self, tx: TransactionId) {
        self.tx = Some(tx);
    }

    /// Move to `next`.
    ///
    /// # Errors
    /// Returns `Internal` if the transition is not allowed.
    pub fn advance(&mut self, next: FlowState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(LedgerError::Internal(format!(
                "illegal flow transition {} -> {next}",
                self.state
            )));
        }
        match self.tx {
            Some(tx) => tracing::info!(party = %self.party, %tx, from = %self.state, to = %next, "Flow state"),
            None => tracing::info!(party = %self.party, from = %self.state, to = %next, "Flow state"),
        }
        self.state = next;
        Ok(())
    }

    /// Move to `Rejected` unless already terminal.
    pub fn reject(&mut self) {
        if !self.state.is_terminal() {
            self.state = FlowState::Rejected;
            tracing::info!(party = %self.party, tx = ?self.tx, "Flow rejected");
        }
    }
}
