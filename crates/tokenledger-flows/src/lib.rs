//! # tokenledger-flows
//!
//! **Multi-party orchestration for TokenLedger.**
//!
//! A [`LedgerNode`] proposes transactions, gathers counter-attestations,
//! obtains a sequencer decision, and distributes the committed result. The
//! same node answers other parties' sessions as a responder.
//!
//! ## Collaborators
//!
//! Everything outside the protocol is injected behind a trait:
//!
//! - [`Messaging`] / [`Session`]: peer sessions with explicit deadlines
//! - [`Sequencer`]: double-spend arbitration and total order
//! - [`Signer`]: this party's attestations
//! - [`RecordStore`](tokenledger_builder::RecordStore): the local vault
//! - [`ProgressObserver`]: optional step reporting
//! - [`ResponderPolicy`]: the counterparty's own acceptance hook
//!
//! [`LocalNetwork`] and [`LocalSequencer`] are in-process implementations
//! for tests and single-process deployments.

pub mod messaging;
pub mod node;
pub mod progress;
pub mod responder;
pub mod sequencer;
pub mod signer;
pub mod state;
pub mod supply;

pub use messaging::{FlowMessage, Inbox, LocalMessaging, LocalNetwork, LocalSession, Messaging, Session};
pub use node::{FinalizedTransaction, LedgerNode, ResponderOutcome};
pub use progress::{FlowStep, NoopObserver, ProgressObserver, RecordingObserver, TracingObserver};
pub use responder::{AcceptValid, DeclineAll, ResponderPolicy};
pub use sequencer::{LocalSequencer, Sequencer};
pub use signer::{KeyPairSigner, Signer};
pub use state::{FlowState, FlowTracker};
pub use supply::SupplyLedger;
