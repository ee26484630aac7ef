//! # tokenledger-types
//!
//! Shared types, errors, and configuration for the **TokenLedger** core.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`PartyId`], [`PartyKey`], [`SequencerId`], [`SessionId`], [`TransactionId`], [`RecordRef`]
//! - **Parties**: [`Party`]
//! - **Record model**: [`Record`], [`LiveRecord`]
//! - **Transaction model**: [`Transaction`], [`Intent`]
//! - **Attestations**: [`Attestation`], [`SignedTransaction`]
//! - **Sequencer outcomes**: [`SequencerDecision`], [`FinalityReceipt`], [`RejectReason`]
//! - **Configuration**: [`FlowConfig`], [`SelectionPolicy`]
//! - **Errors**: [`LedgerError`] with `TL_ERR_` prefix codes, contract [`Rule`]s and [`Violation`]s
//! - **Constants**: system-wide defaults and domain separators

pub mod attestation;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod party;
pub mod receipt;
pub mod record;
pub mod transaction;

// Re-export all primary types at crate root for ergonomic imports:
//   use tokenledger_types::{Record, Transaction, Intent, ...};

pub use attestation::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use party::*;
pub use receipt::*;
pub use record::*;
pub use transaction::*;

// Constants are accessed via `tokenledger_types::constants::FOO`
// (not re-exported to avoid name collisions).
