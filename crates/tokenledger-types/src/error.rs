//! Error types for the TokenLedger core.
//!
//! All errors use the `TL_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors (a contract rule was violated)
//! - 2xx: Resource errors (no suitable live record)
//! - 3xx: Protocol errors (counterparty, session, attestation)
//! - 4xx: Sequencer errors
//! - 5xx: Record store errors
//! - 9xx: General / internal errors

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{PartyId, PartyKey, RecordRef, SequencerId, TransactionId};

// ---------------------------------------------------------------------------
// Contract rules
// ---------------------------------------------------------------------------

/// One clause of the validation contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rule {
    /// Issue: nothing may be consumed.
    IssueConsumesNothing,
    /// Issue: at least one record must be produced.
    IssueProducesRecords,
    /// Move: at least one record must be consumed.
    MoveConsumesRecords,
    /// Move: at least one record must be produced.
    MoveProducesRecords,
    /// Redeem: at least one record must be consumed.
    RedeemConsumesRecords,
    /// Redeem: nothing may be produced.
    RedeemProducesNothing,
    /// Every quantity must be strictly positive.
    PositiveQuantities,
    /// Move: the set of issuers must be the same on both sides.
    IssuersConserved,
    /// Move: per-issuer totals must be the same on both sides.
    QuantitiesConserved,
    /// Issuers of the relevant records must attest.
    IssuersAttest,
    /// Current holders of the consumed records must attest.
    HoldersAttest,
    /// A record may appear at most once in `consumed`.
    DistinctConsumed,
}

impl Rule {
    /// Stable short code for logs and assertions.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::IssueConsumesNothing => "TL_RULE_01",
            Self::IssueProducesRecords => "TL_RULE_02",
            Self::MoveConsumesRecords => "TL_RULE_03",
            Self::MoveProducesRecords => "TL_RULE_04",
            Self::RedeemConsumesRecords => "TL_RULE_05",
            Self::RedeemProducesNothing => "TL_RULE_06",
            Self::PositiveQuantities => "TL_RULE_07",
            Self::IssuersConserved => "TL_RULE_08",
            Self::QuantitiesConserved => "TL_RULE_09",
            Self::IssuersAttest => "TL_RULE_10",
            Self::HoldersAttest => "TL_RULE_11",
            Self::DistinctConsumed => "TL_RULE_12",
        }
    }

    /// The invariant in plain words.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::IssueConsumesNothing => "no records may be consumed when issuing",
            Self::IssueProducesRecords => "issuing must produce at least one record",
            Self::MoveConsumesRecords => "moving must consume at least one record",
            Self::MoveProducesRecords => "moving must produce at least one record",
            Self::RedeemConsumesRecords => "redeeming must consume at least one record",
            Self::RedeemProducesNothing => "no records may be produced when redeeming",
            Self::PositiveQuantities => "all quantities must be above zero",
            Self::IssuersConserved => "the set of issuers must be conserved",
            Self::QuantitiesConserved => "the sum of quantities per issuer must be conserved",
            Self::IssuersAttest => "the issuers must attest",
            Self::HoldersAttest => "the current holders must attest",
            Self::DistinctConsumed => "a record may be consumed at most once",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.describe())
    }
}

/// A violated rule plus the specifics that violated it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: Rule,
    pub detail: String,
}

impl Violation {
    #[must_use]
    pub fn new(rule: Rule, detail: impl Into<String>) -> Self {
        Self {
            rule,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule, self.detail)
    }
}

/// Renders a list of violations as `a; b; c`.
struct Violations<'a>(&'a [Violation]);

impl fmt::Display for Violations<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

fn render(violations: &[Violation]) -> String {
    Violations(violations).to_string()
}

// ---------------------------------------------------------------------------
// LedgerError
// ---------------------------------------------------------------------------

/// Coarse classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A contract rule failed, locally or at a counterparty.
    Validation,
    /// No live record satisfied the request.
    Resource,
    /// A counterparty declined, timed out, or sent something malformed.
    Protocol,
    /// The sequencing service rejected or did not answer.
    Sequencer,
    /// The record store failed.
    Store,
    /// Anything else.
    Internal,
}

/// Central error enum for all TokenLedger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// The transaction violates one or more contract rules.
    #[error("TL_ERR_100: Validation failed for {tx}: {}", render(.violations))]
    ValidationFailed {
        tx: TransactionId,
        violations: Vec<Violation>,
    },

    /// The intent tag is not one of Issue, Move, Redeem.
    #[error("TL_ERR_101: Unknown intent: {0}")]
    UnknownIntent(String),

    /// A move whose recipient is the mover itself.
    #[error("TL_ERR_102: Cannot move tokens to the same entity: {0}")]
    SameEntity(PartyId),

    /// The same record was added to a transaction twice.
    #[error("TL_ERR_103: Record consumed twice in one transaction: {0}")]
    DuplicateConsumed(RecordRef),

    /// A requested move or redemption quantity is zero or negative.
    #[error("TL_ERR_104: Quantity must be above zero, got {0}")]
    NonPositiveQuantity(i64),

    // =================================================================
    // Resource Errors (2xx)
    // =================================================================
    /// No single live record held by the mover covers the requested quantity.
    #[error("TL_ERR_200: Insufficient funds: no record from issuer {issuer} with at least {requested}")]
    InsufficientFunds { issuer: PartyId, requested: i64 },

    /// No live record matches the redemption exactly.
    #[error("TL_ERR_201: No matching record: issuer {issuer}, holder {holder}, quantity {quantity}")]
    NoMatchingRecord {
        issuer: PartyId,
        holder: PartyId,
        quantity: i64,
    },

    // =================================================================
    // Protocol Errors (3xx)
    // =================================================================
    /// A counterparty refused to attest.
    #[error("TL_ERR_300: Counterparty {party} declined: {reason}")]
    CounterpartyDeclined { party: PartyId, reason: String },

    /// A session operation passed its deadline.
    #[error("TL_ERR_301: Session with {party} timed out while {phase}")]
    SessionTimeout { party: PartyId, phase: String },

    /// A peer sent something that does not fit the protocol.
    #[error("TL_ERR_302: Malformed message from {party}: {reason}")]
    MalformedMessage { party: PartyId, reason: String },

    /// The session was closed by the peer or the transport.
    #[error("TL_ERR_303: Session with {0} closed")]
    SessionClosed(PartyId),

    /// A declared attestor has not attested.
    #[error("TL_ERR_304: Missing attestation from {0}")]
    MissingAttestation(PartyKey),

    /// An attestation does not verify.
    #[error("TL_ERR_305: Invalid attestation from {key}: {reason}")]
    InvalidAttestation { key: PartyKey, reason: String },

    /// An attestation from a key that was not asked to attest.
    #[error("TL_ERR_306: Unexpected attestation from {0}")]
    UnexpectedAttestor(PartyKey),

    /// No route to a party.
    #[error("TL_ERR_307: Unknown party: {0}")]
    UnknownParty(PartyId),

    // =================================================================
    // Sequencer Errors (4xx)
    // =================================================================
    /// The sequencer detected that a consumed record was already spent.
    #[error("TL_ERR_400: Sequencer conflict for {tx}: {} record(s) already consumed", .conflicts.len())]
    SequencerConflict {
        tx: TransactionId,
        conflicts: Vec<RecordRef>,
    },

    /// The sequencer rejected the transaction for another reason.
    #[error("TL_ERR_401: Sequencer rejected {tx}: {reason}")]
    SequencerRejected { tx: TransactionId, reason: String },

    /// No decision arrived before the deadline.
    #[error("TL_ERR_402: Sequencer timed out for {0}")]
    SequencerTimeout(TransactionId),

    /// The transaction names a sequencer this party cannot reach.
    #[error("TL_ERR_403: Wrong sequencer: expected {expected}, got {actual}")]
    WrongSequencer {
        expected: SequencerId,
        actual: SequencerId,
    },

    /// The sequencer holds no receipt matching a delivered finality.
    #[error("TL_ERR_404: Sequencer has not finalized {0}")]
    FinalityUnconfirmed(TransactionId),

    // =================================================================
    // Record Store Errors (5xx)
    // =================================================================
    /// The record store failed to read or write.
    #[error("TL_ERR_500: Record store error: {0}")]
    RecordStore(String),

    /// A finalized transaction arrived without a receipt matching it.
    #[error("TL_ERR_501: Receipt does not match transaction {0}")]
    ReceiptMismatch(TransactionId),

    /// Supply bookkeeping disagrees with the live records.
    #[error("TL_ERR_502: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("TL_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("TL_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config, missing fields, etc.).
    #[error("TL_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl LedgerError {
    /// Which subsystem produced this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ValidationFailed { .. }
            | Self::UnknownIntent(_)
            | Self::SameEntity(_)
            | Self::DuplicateConsumed(_)
            | Self::NonPositiveQuantity(_) => ErrorCategory::Validation,
            Self::InsufficientFunds { .. } | Self::NoMatchingRecord { .. } => {
                ErrorCategory::Resource
            }
            Self::CounterpartyDeclined { .. }
            | Self::SessionTimeout { .. }
            | Self::MalformedMessage { .. }
            | Self::SessionClosed(_)
            | Self::MissingAttestation(_)
            | Self::InvalidAttestation { .. }
            | Self::UnexpectedAttestor(_)
            | Self::UnknownParty(_) => ErrorCategory::Protocol,
            Self::SequencerConflict { .. }
            | Self::SequencerRejected { .. }
            | Self::SequencerTimeout(_)
            | Self::WrongSequencer { .. }
            | Self::FinalityUnconfirmed(_) => ErrorCategory::Sequencer,
            Self::RecordStore(_)
            | Self::ReceiptMismatch(_)
            | Self::SupplyInvariantViolation { .. } => ErrorCategory::Store,
            Self::Internal(_) | Self::Serialization(_) | Self::Configuration(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// The violated rules, if this is a validation failure.
    #[must_use]
    pub fn violated_rules(&self) -> Vec<Rule> {
        match self {
            Self::ValidationFailed { violations, .. } => {
                violations.iter().map(|v| v.rule).collect()
            }
            Self::NonPositiveQuantity(_) => vec![Rule::PositiveQuantities],
            _ => Vec::new(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
