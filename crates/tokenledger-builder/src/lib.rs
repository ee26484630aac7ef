//! # tokenledger-builder
//!
//! **Transaction assembly for TokenLedger.**
//!
//! Turns an operation request (issue, move, redeem) into a locally valid
//! transaction and a plan for who must co-attest and who must learn the
//! outcome:
//!
//! 1. Query the participant's [`RecordStore`] for eligible live records
//! 2. Pick one according to the configured [`SelectionPolicy`]
//! 3. Assemble inputs, outputs, and attestors with [`TransactionBuilder`]
//! 4. Run the contract before anything leaves the node
//!
//! [`SelectionPolicy`]: tokenledger_types::SelectionPolicy

pub mod builder;
pub mod proposal;
pub mod selection;
pub mod store;

pub use builder::TransactionBuilder;
pub use proposal::{Proposal, ProposalBuilder};
pub use selection::select;
pub use store::{ApplyOutcome, MemoryRecordStore, RecordFilter, RecordStore};
