//! A ledger participant: initiator and responder flows.
//!
//! The initiator runs, per operation:
//! 1. Build the proposal and run the contract (no network on failure)
//! 2. Attach its own attestation
//! 3. Collect counter-attestations, if the intent needs any
//! 4. Submit to the sequencer
//! 5. On acceptance, record locally and deliver to every participant
//! 6. Forward a best-effort supply copy to a bystander issuer
//!
//! Nothing is recorded anywhere unless the sequencer accepted. Responders
//! confirm every delivered receipt with the sequencer before recording.

use std::sync::{Arc, Mutex};

use tokenledger_builder::{ApplyOutcome, Proposal, ProposalBuilder, RecordFilter, RecordStore};
use tokenledger_contract::verify;
use tokenledger_types::{
    FinalityReceipt, FlowConfig, LedgerError, Party, RejectReason, Result, SequencerDecision,
    SignedTransaction, TransactionId,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::messaging::{FlowMessage, Inbox, Messaging, Session};
use crate::progress::{FlowStep, NoopObserver, ProgressObserver};
use crate::responder::{AcceptValid, ResponderPolicy};
use crate::sequencer::Sequencer;
use crate::signer::Signer;
use crate::state::{FlowState, FlowTracker};
use crate::supply::SupplyLedger;

/// A committed transaction as seen by its initiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedTransaction {
    pub signed: SignedTransaction,
    pub receipt: FinalityReceipt,
    /// Participants that did not confirm recording. The commit stands.
    pub undelivered: Vec<Party>,
}

impl FinalizedTransaction {
    pub fn id(&self) -> TransactionId {
        self.signed.id()
    }
}

/// How a responder flow ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderOutcome {
    /// The committed transaction was recorded locally.
    Recorded {
        tx: TransactionId,
        receipt: FinalityReceipt,
        supply_copy: bool,
    },
    /// This party refused to attest.
    Declined { tx: TransactionId, reason: String },
    /// This party attested but the initiator abandoned the transaction.
    Aborted { tx: TransactionId, reason: String },
}

pub struct LedgerNode {
    signer: Arc<dyn Signer>,
    store: Arc<dyn RecordStore>,
    messaging: Arc<dyn Messaging>,
    sequencer: Arc<dyn Sequencer>,
    config: FlowConfig,
    observer: Arc<dyn ProgressObserver>,
    policy: Arc<dyn ResponderPolicy>,
    supply: Mutex<SupplyLedger>,
}

impl LedgerNode {
    /// # Errors
    /// Returns `Configuration` if the store belongs to another party.
    pub fn new(
        signer: Arc<dyn Signer>,
        store: Arc<dyn RecordStore>,
        messaging: Arc<dyn Messaging>,
        sequencer: Arc<dyn Sequencer>,
    ) -> Result<Self> {
        if store.owner() != signer.party() {
            return Err(LedgerError::Configuration(format!(
                "record store belongs to {}, not {}",
                store.owner(),
                signer.party()
            )));
        }
        let supply = Mutex::new(SupplyLedger::new(signer.party().id));
        Ok(Self {
            signer,
            store,
            messaging,
            sequencer,
            config: FlowConfig::default(),
            observer: Arc::new(NoopObserver),
            policy: Arc::new(AcceptValid),
            supply,
        })
    }

    /// # Errors
    /// Returns `Configuration` if `config` has a zero timeout.
    pub fn with_config(mut self, config: FlowConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn ResponderPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn party(&self) -> &Party {
        self.signer.party()
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    fn builder(&self) -> ProposalBuilder<'_> {
        ProposalBuilder::new(
            self.party(),
            self.store.as_ref(),
            self.config.selection,
            self.sequencer.id(),
        )
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Issue `quantity` new tokens to `holder`.
    pub async fn issue(&self, holder: &Party, quantity: i64) -> Result<FinalizedTransaction> {
        self.run(|b| b.issue(holder, quantity)).await
    }

    /// Issue to several holders in one transaction.
    pub async fn issue_many(&self, outputs: &[(Party, i64)]) -> Result<FinalizedTransaction> {
        self.run(|b| b.issue_many(outputs)).await
    }

    /// Move `quantity` of `issuer`'s tokens to `new_holder`.
    pub async fn move_tokens(
        &self,
        issuer: &Party,
        quantity: i64,
        new_holder: &Party,
    ) -> Result<FinalizedTransaction> {
        self.run(|b| b.plan_move(issuer, quantity, new_holder)).await
    }

    /// Redeem a record of exactly `quantity` issued by `issuer`, with the
    /// issuer's counter-attestation.
    pub async fn redeem(&self, issuer: &Party, quantity: i64) -> Result<FinalizedTransaction> {
        self.run(|b| b.plan_redeem(issuer, quantity)).await
    }

    /// As issuer, redeem a record of exactly `quantity` held by `holder`, with
    /// the holder's counter-attestation.
    pub async fn redeem_from(&self, holder: &Party, quantity: i64) -> Result<FinalizedTransaction> {
        self.run(|b| b.plan_redeem_from(holder, quantity)).await
    }

    /// Check this party's issued supply against its live records.
    ///
    /// # Errors
    /// Returns `SupplyInvariantViolation` on mismatch.
    pub fn verify_supply(&self) -> Result<()> {
        let me = self.party().id;
        let live: i128 = self
            .store
            .query(&RecordFilter {
                issuer: Some(me),
                ..RecordFilter::default()
            })?
            .iter()
            .map(|live| i128::from(live.record.quantity))
            .sum();
        self.supply_ledger()?.verify(live)
    }

    /// Snapshot of this party's supply totals.
    pub fn supply_ledger(&self) -> Result<SupplyLedger> {
        self.supply
            .lock()
            .map(|s| s.clone())
            .map_err(|_| LedgerError::Internal("supply ledger poisoned".to_string()))
    }

    // -----------------------------------------------------------------
    // Initiator
    // -----------------------------------------------------------------

    async fn run(
        &self,
        build: impl FnOnce(&ProposalBuilder<'_>) -> Result<Proposal>,
    ) -> Result<FinalizedTransaction> {
        let mut flow = FlowTracker::new(self.party().name.clone());
        self.observer.on_step(None, FlowStep::Generating);
        let proposal = match build(&self.builder()) {
            Ok(p) => p,
            Err(e) => {
                flow.reject();
                tracing::info!(party = %self.party(), error = %e, "Proposal not built");
                return Err(e);
            }
        };
        flow.bind(proposal.tx.id);

        let mut sessions = Vec::new();
        let result = self.drive(&proposal, &mut flow, &mut sessions).await;
        let abandoned = match &result {
            Err(e) if flow.state() != FlowState::Finalized => Some(e.to_string()),
            _ => None,
        };
        if let Some(reason) = abandoned {
            flow.reject();
            for session in &mut sessions {
                let abort = FlowMessage::Aborted {
                    reason: reason.clone(),
                };
                if let Err(send) = session.send(abort).await {
                    tracing::debug!(peer = %session.peer(), error = %send, "Abort not delivered");
                }
            }
        }
        result
    }

    async fn drive(
        &self,
        proposal: &Proposal,
        flow: &mut FlowTracker,
        sessions: &mut Vec<Box<dyn Session>>,
    ) -> Result<FinalizedTransaction> {
        let tx = &proposal.tx;
        let id = tx.id;

        self.observer.on_step(Some(id), FlowStep::Verifying);
        verify(tx)?;
        flow.advance(FlowState::LocallyValid)?;

        self.observer.on_step(Some(id), FlowStep::Signing);
        let mut signed = SignedTransaction::new(tx.clone());
        signed.add_attestation(self.signer.attest(&id))?;

        if !proposal.counter_attestors.is_empty() {
            flow.advance(FlowState::AwaitingCountersignatures)?;
            self.observer.on_step(Some(id), FlowStep::GatheringAttestations);
            for party in &proposal.counter_attestors {
                let mut session = self.messaging.initiate(party).await?;
                session.send(FlowMessage::Propose(signed.clone())).await?;
                sessions.push(session);
                let Some(session) = sessions.last_mut() else {
                    return Err(LedgerError::Internal("session list empty".to_string()));
                };
                let deadline = Instant::now() + self.config.attestation_timeout();
                match session.receive(deadline, "awaiting attestation").await? {
                    FlowMessage::Attest(attestation) if attestation.by == party.key => {
                        signed.add_attestation(attestation)?;
                    }
                    FlowMessage::Attest(attestation) => {
                        return Err(LedgerError::UnexpectedAttestor(attestation.by));
                    }
                    FlowMessage::Decline { reason } => {
                        tracing::info!(tx = %id, party = %party, %reason, "Counterparty declined");
                        return Err(LedgerError::CounterpartyDeclined {
                            party: party.id,
                            reason,
                        });
                    }
                    other => {
                        return Err(LedgerError::MalformedMessage {
                            party: party.id,
                            reason: format!("expected attestation, got {other}"),
                        });
                    }
                }
            }
        }
        signed.verify_attestations()?;

        let mut participants = vec![self.party().clone()];
        participants.extend(proposal.participants().cloned());

        flow.advance(FlowState::SubmittedToSequencer)?;
        self.observer.on_step(Some(id), FlowStep::Finalizing);
        let receipt = self.sequence(&signed, &participants).await?;

        flow.advance(FlowState::Finalized)?;
        self.observer.on_step(Some(id), FlowStep::Recording);
        let recorded = self.record(&signed);
        if let Err(e) = &recorded {
            tracing::error!(tx = %id, party = %self.party(), error = %e, "Committed transaction not recorded locally");
        }

        let mut undelivered = Vec::new();
        for session in sessions.iter_mut() {
            let finalized = FlowMessage::Finalized {
                signed: signed.clone(),
                receipt: receipt.clone(),
            };
            if let Err(e) = self.deliver(session.as_mut(), finalized).await {
                tracing::warn!(tx = %id, party = %session.peer(), error = %e, "Finality not confirmed");
                undelivered.push(session.peer().clone());
            }
        }
        for party in &proposal.observers {
            let finalized = FlowMessage::Finalized {
                signed: signed.clone(),
                receipt: receipt.clone(),
            };
            if let Err(e) = self.open_and_deliver(party, finalized).await {
                tracing::warn!(tx = %id, party = %party, error = %e, "Finality not confirmed");
                undelivered.push(party.clone());
            }
        }

        let bystander = proposal
            .supply_copy
            .as_ref()
            .filter(|issuer| self.config.forward_supply_copy && !participants.contains(*issuer));
        if let Some(issuer) = bystander {
            let copy = FlowMessage::SupplyCopy {
                signed: signed.clone(),
                receipt: receipt.clone(),
            };
            if let Err(e) = self.open_and_deliver(issuer, copy).await {
                tracing::warn!(tx = %id, issuer = %issuer, error = %e, "Supply copy not delivered");
            }
        }

        recorded?;
        self.observer.on_step(Some(id), FlowStep::Done);
        tracing::info!(
            tx = %id,
            party = %self.party(),
            intent = %tx.intent,
            order = receipt.order,
            undelivered = undelivered.len(),
            "Transaction finalized"
        );
        Ok(FinalizedTransaction {
            signed,
            receipt,
            undelivered,
        })
    }

    async fn sequence(
        &self,
        signed: &SignedTransaction,
        participants: &[Party],
    ) -> Result<FinalityReceipt> {
        let id = signed.id();
        let expected = self.sequencer.id();
        if signed.tx.sequencer != expected {
            return Err(LedgerError::WrongSequencer {
                expected,
                actual: signed.tx.sequencer,
            });
        }

        let decision = tokio::time::timeout(
            self.config.sequencer_timeout(),
            self.sequencer.submit(signed, participants),
        )
        .await
        .map_err(|_| LedgerError::SequencerTimeout(id))??;

        match decision {
            SequencerDecision::Accepted(receipt) if receipt.tx_id == id => Ok(receipt),
            SequencerDecision::Accepted(_) => Err(LedgerError::ReceiptMismatch(id)),
            SequencerDecision::Rejected(RejectReason::DoubleSpend { conflicts }) => {
                Err(LedgerError::SequencerConflict { tx: id, conflicts })
            }
            SequencerDecision::Rejected(RejectReason::WrongSequencer { expected, actual }) => {
                Err(LedgerError::WrongSequencer { expected, actual })
            }
            SequencerDecision::Rejected(RejectReason::Invalid { reason }) => {
                Err(LedgerError::SequencerRejected { tx: id, reason })
            }
        }
    }

    async fn open_and_deliver(&self, party: &Party, message: FlowMessage) -> Result<()> {
        let mut session = self.messaging.initiate(party).await?;
        self.deliver(session.as_mut(), message).await
    }

    /// Send a committed transaction and wait for the peer to confirm it.
    async fn deliver(&self, session: &mut dyn Session, message: FlowMessage) -> Result<()> {
        session.send(message).await?;
        let deadline = Instant::now() + self.config.finality_timeout();
        let reply = session.receive(deadline, "awaiting recording").await?;
        match reply {
            FlowMessage::Recorded => Ok(()),
            other => Err(LedgerError::MalformedMessage {
                party: session.peer().id,
                reason: format!("expected recorded, got {other}"),
            }),
        }
    }

    /// Apply a committed transaction to the store; count it once.
    fn record(&self, signed: &SignedTransaction) -> Result<ApplyOutcome> {
        let outcome = self.store.apply(signed)?;
        if outcome == ApplyOutcome::Applied {
            self.supply
                .lock()
                .map_err(|_| LedgerError::Internal("supply ledger poisoned".to_string()))?
                .record(&signed.tx);
        }
        Ok(outcome)
    }

    // -----------------------------------------------------------------
    // Responder
    // -----------------------------------------------------------------

    /// Only the sequencer's own record of acceptance makes a delivered
    /// receipt recordable.
    async fn confirm_finality(&self, receipt: &FinalityReceipt) -> Result<()> {
        let id = receipt.tx_id;
        let expected = self.sequencer.id();
        if receipt.sequencer != expected {
            return Err(LedgerError::WrongSequencer {
                expected,
                actual: receipt.sequencer,
            });
        }
        let issued = tokio::time::timeout(
            self.config.sequencer_timeout(),
            self.sequencer.receipt(&id),
        )
        .await
        .map_err(|_| LedgerError::SequencerTimeout(id))??;
        if issued.as_ref() == Some(receipt) {
            Ok(())
        } else {
            tracing::warn!(tx = %id, party = %self.party(), claimed_order = receipt.order, "Finality not confirmed by sequencer");
            Err(LedgerError::FinalityUnconfirmed(id))
        }
    }

    /// Handle sessions from `inbox` until it closes, one task per session.
    pub fn serve(self: Arc<Self>, mut inbox: Inbox) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(session) = inbox.recv().await {
                let node = Arc::clone(&self);
                tokio::spawn(async move {
                    let peer = session.peer().clone();
                    match node.respond(session).await {
                        Ok(outcome) => {
                            tracing::debug!(party = %node.party(), %peer, ?outcome, "Responder flow done");
                        }
                        Err(e) => {
                            tracing::warn!(party = %node.party(), %peer, error = %e, "Responder flow failed");
                        }
                    }
                });
            }
        })
    }

    /// Run the responder side of one session.
    pub async fn respond(&self, mut session: Box<dyn Session>) -> Result<ResponderOutcome> {
        let deadline = Instant::now() + self.config.finality_timeout();
        let opening = session.receive(deadline, "awaiting proposal").await?;
        match opening {
            FlowMessage::Propose(proposed) => self.counter_attest(session, proposed).await,
            FlowMessage::Finalized { signed, receipt } => {
                self.accept_finalized(session.as_mut(), &signed, receipt, false)
                    .await
            }
            FlowMessage::SupplyCopy { signed, receipt } => {
                self.accept_finalized(session.as_mut(), &signed, receipt, true)
                    .await
            }
            other => Err(LedgerError::MalformedMessage {
                party: session.peer().id,
                reason: format!("unexpected opening message {other}"),
            }),
        }
    }

    async fn counter_attest(
        &self,
        mut session: Box<dyn Session>,
        proposed: SignedTransaction,
    ) -> Result<ResponderOutcome> {
        let id = proposed.id();
        let initiator = session.peer().clone();

        if let Err(reason) = self.review(&proposed, &initiator) {
            tracing::info!(tx = %id, party = %self.party(), %initiator, %reason, "Declining");
            session
                .send(FlowMessage::Decline {
                    reason: reason.clone(),
                })
                .await?;
            return Ok(ResponderOutcome::Declined { tx: id, reason });
        }

        session
            .send(FlowMessage::Attest(self.signer.attest(&id)))
            .await?;
        tracing::info!(tx = %id, party = %self.party(), %initiator, "Attested");

        let deadline = Instant::now() + self.config.finality_timeout();
        let outcome = session.receive(deadline, "awaiting finality").await?;
        match outcome {
            FlowMessage::Finalized { signed, receipt } if signed.id() == id => {
                self.accept_finalized(session.as_mut(), &signed, receipt, false)
                    .await
            }
            FlowMessage::Aborted { reason } => {
                tracing::info!(tx = %id, party = %self.party(), %reason, "Initiator aborted");
                Ok(ResponderOutcome::Aborted { tx: id, reason })
            }
            other => Err(LedgerError::MalformedMessage {
                party: initiator.id,
                reason: format!("expected outcome for {id}, got {other}"),
            }),
        }
    }

    /// Independent checks before attesting. `Err` carries the decline reason.
    fn review(&self, proposed: &SignedTransaction, initiator: &Party) -> std::result::Result<(), String> {
        let tx = &proposed.tx;
        if !tx.verify_id() {
            return Err("transaction id does not match contents".to_string());
        }
        if !tx.attestors.contains(&self.party().key) {
            return Err("not a declared attestor".to_string());
        }
        if tx.sequencer != self.sequencer.id() {
            return Err(format!("unknown sequencer {}", tx.sequencer));
        }
        verify(tx).map_err(|e| e.to_string())?;
        for attestation in &proposed.attestations {
            attestation.verify(&tx.id).map_err(|e| e.to_string())?;
        }
        self.policy.check(tx, initiator)
    }

    async fn accept_finalized(
        &self,
        session: &mut dyn Session,
        signed: &SignedTransaction,
        receipt: FinalityReceipt,
        supply_copy: bool,
    ) -> Result<ResponderOutcome> {
        let id = signed.id();
        let peer = session.peer().id;
        if receipt.tx_id != id || receipt.sequencer != signed.tx.sequencer {
            return Err(LedgerError::ReceiptMismatch(id));
        }
        if !signed.tx.verify_id() {
            return Err(LedgerError::MalformedMessage {
                party: peer,
                reason: format!("transaction id {id} does not match contents"),
            });
        }
        verify(&signed.tx)?;
        signed.verify_attestations()?;
        self.confirm_finality(&receipt).await?;

        let outcome = self.record(signed)?;
        session.send(FlowMessage::Recorded).await?;
        tracing::info!(
            tx = %id,
            party = %self.party(),
            order = receipt.order,
            supply_copy,
            ?outcome,
            "Recorded finalized transaction"
        );
        Ok(ResponderOutcome::Recorded {
            tx: id,
            receipt,
            supply_copy,
        })
    }
}
