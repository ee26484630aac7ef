//! Human-readable progress reporting.
//!
//! Flows report each step to a [`ProgressObserver`] owned by the node. The
//! observer never influences the protocol.

use std::fmt;
use std::sync::Mutex;

use tokenledger_types::TransactionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowStep {
    /// Selecting inputs and assembling the transaction.
    Generating,
    /// Running the contract.
    Verifying,
    /// Attaching this party's attestation.
    Signing,
    /// Waiting for counterparties to attest.
    GatheringAttestations,
    /// Waiting on the sequencer.
    Finalizing,
    /// Writing the committed transaction to the record store.
    Recording,
    Done,
}

impl FlowStep {
    pub fn label(self) -> &'static str {
        match self {
            Self::Generating => "Generating transaction",
            Self::Verifying => "Verifying contract constraints",
            Self::Signing => "Signing transaction",
            Self::GatheringAttestations => "Gathering counterparty attestations",
            Self::Finalizing => "Obtaining sequencer decision",
            Self::Recording => "Recording transaction",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub trait ProgressObserver: Send + Sync {
    fn on_step(&self, tx: Option<TransactionId>, step: FlowStep);
}

pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_step(&self, _tx: Option<TransactionId>, _step: FlowStep) {}
}

/// Emits each step as a `debug` event.
pub struct TracingObserver {
    party: String,
}

impl TracingObserver {
    #[must_use]
    pub fn new(party: impl Into<String>) -> Self {
        Self {
            party: party.into(),
        }
    }
}

impl ProgressObserver for TracingObserver {
    fn on_step(&self, tx: Option<TransactionId>, step: FlowStep) {
        match tx {
            Some(tx) => tracing::debug!(party = %self.party, %tx, step = %step, "Progress"),
            None => tracing::debug!(party = %self.party, step = %step, "Progress"),
        }
    }
}

/// Keeps every reported step, for inspection in tests and tooling.
#[derive(Default)]
pub struct RecordingObserver {
    steps: Mutex<Vec<FlowStep>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps reported so far, oldest first.
    pub fn steps(&self) -> Vec<FlowStep> {
        self.steps
            .lock()
            .map(|steps| steps.clone())
            .unwrap_or_default()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_step(&self, _tx: Option<TransactionId>, step: FlowStep) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push(step);
        }
    }
}
