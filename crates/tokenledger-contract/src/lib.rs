//! # tokenledger-contract
//!
//! **Pure deterministic validation engine for TokenLedger transactions.**
//!
//! The contract decides whether a proposed [`Transaction`] is a legal state
//! transition. It has:
//!
//! - **Zero side effects**: no store access, no network, no clock
//! - **Deterministic output**: same transaction -> same verdict on every node
//! - **Complete reports**: every violated rule is listed, not just the first
//! - **Overflow-free conservation**: per-issuer sums are computed in `i128`
//!
//! [`Transaction`]: tokenledger_types::Transaction

pub mod rules;
pub mod sums;

pub use rules::{verify, violations};
pub use sums::{has_positive_quantities, issuer_sums};
