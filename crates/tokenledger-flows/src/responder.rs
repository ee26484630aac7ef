//! The counterparty's own acceptance hook.
//!
//! Runs after the contract re-check, before this party attests. Returning
//! `Err(reason)` declines the proposal.

use tokenledger_types::{Party, Transaction};

pub trait ResponderPolicy: Send + Sync {
    fn check(&self, tx: &Transaction, initiator: &Party) -> Result<(), String>;
}

/// Attests to any transaction that passes the contract.
pub struct AcceptValid;

impl ResponderPolicy for AcceptValid {
    fn check(&self, _tx: &Transaction, _initiator: &Party) -> Result<(), String> {
        Ok(())
    }
}

/// Refuses every proposal with a fixed reason.
pub struct DeclineAll {
    reason: String,
}

impl DeclineAll {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ResponderPolicy for DeclineAll {
    fn check(&self, _tx: &Transaction, _initiator: &Party) -> Result<(), String> {
        Err(self.reason.clone())
    }
}

impl<F> ResponderPolicy for F
where
    F: Fn(&Transaction, &Party) -> Result<(), String> + Send + Sync,
{
    fn check(&self, tx: &Transaction, initiator: &Party) -> Result<(), String> {
        self(tx, initiator)
    }
}
