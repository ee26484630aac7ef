//! Session collaborator and the in-process transport.
//!
//! A [`Session`] is a reliable, ordered, bidirectional channel with one peer.
//! No ordering holds across sessions. Every receive takes an explicit
//! deadline; expiry surfaces as `SessionTimeout`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokenledger_types::{
    Attestation, FinalityReceipt, LedgerError, Party, PartyId, Result, SessionId,
    SignedTransaction,
};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Everything that crosses a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowMessage {
    /// Initiator asks the peer to attest.
    Propose(SignedTransaction),
    /// Peer's attestation of a proposed transaction.
    Attest(Attestation),
    /// Peer refuses to attest.
    Decline { reason: String },
    /// Committed transaction for a consensus participant.
    Finalized {
        signed: SignedTransaction,
        receipt: FinalityReceipt,
    },
    /// Committed transaction forwarded to an issuer for supply tracking.
    SupplyCopy {
        signed: SignedTransaction,
        receipt: FinalityReceipt,
    },
    /// The proposal the peer attested will not be committed.
    Aborted { reason: String },
    /// Peer has recorded the committed transaction.
    Recorded,
}

impl FlowMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Propose(_) => "propose",
            Self::Attest(_) => "attest",
            Self::Decline { .. } => "decline",
            Self::Finalized { .. } => "finalized",
            Self::SupplyCopy { .. } => "supply_copy",
            Self::Aborted { .. } => "aborted",
            Self::Recorded => "recorded",
        }
    }
}

impl fmt::Display for FlowMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

#[async_trait]
pub trait Session: Send {
    fn id(&self) -> SessionId;

    /// The party at the other end.
    fn peer(&self) -> &Party;

    async fn send(&mut self, message: FlowMessage) -> Result<()>;

    /// Next message from the peer, or `SessionTimeout` naming `phase` once
    /// `deadline` passes.
    async fn receive(&mut self, deadline: Instant, phase: &str) -> Result<FlowMessage>;
}

/// Opens sessions on behalf of one party.
#[async_trait]
pub trait Messaging: Send + Sync {
    async fn initiate(&self, peer: &Party) -> Result<Box<dyn Session>>;
}

/// Sessions other parties opened towards a registered party.
pub type Inbox = mpsc::UnboundedReceiver<Box<dyn Session>>;

type Registry = Arc<Mutex<HashMap<PartyId, mpsc::UnboundedSender<Box<dyn Session>>>>>;

/// In-process session transport over `tokio::mpsc` channels.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    registry: Registry,
}

impl LocalNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `party` reachable. Sessions opened towards it arrive on the
    /// returned inbox. Registering again replaces the previous inbox.
    pub fn register(&self, party: &Party) -> Result<Inbox> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry
            .lock()
            .map_err(|_| LedgerError::Internal("network registry poisoned".to_string()))?
            .insert(party.id, tx);
        Ok(rx)
    }

    /// Make `party` unreachable for new sessions.
    pub fn disconnect(&self, party: &Party) -> Result<()> {
        self.registry
            .lock()
            .map_err(|_| LedgerError::Internal("network registry poisoned".to_string()))?
            .remove(&party.id);
        Ok(())
    }

    /// A [`Messaging`] handle that opens sessions as `me`.
    #[must_use]
    pub fn endpoint(&self, me: &Party) -> LocalMessaging {
        LocalMessaging {
            me: me.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}

pub struct LocalMessaging {
    me: Party,
    registry: Registry,
}

#[async_trait]
impl Messaging for LocalMessaging {
    async fn initiate(&self, peer: &Party) -> Result<Box<dyn Session>> {
        let inbox = self
            .registry
            .lock()
            .map_err(|_| LedgerError::Internal("network registry poisoned".to_string()))?
            .get(&peer.id)
            .cloned()
            .ok_or(LedgerError::UnknownParty(peer.id))?;

        let id = SessionId::new();
        let (to_peer, from_me) = mpsc::unbounded_channel();
        let (to_me, from_peer) = mpsc::unbounded_channel();
        let theirs = LocalSession {
            id,
            peer: self.me.clone(),
            outgoing: to_me,
            incoming: from_me,
        };
        inbox
            .send(Box::new(theirs))
            .map_err(|_| LedgerError::UnknownParty(peer.id))?;

        tracing::debug!(session = %id, from = %self.me, to = %peer, "Session opened");
        Ok(Box::new(LocalSession {
            id,
            peer: peer.clone(),
            outgoing: to_peer,
            incoming: from_peer,
        }))
    }
}

pub struct LocalSession {
    id: SessionId,
    peer: Party,
    outgoing: mpsc::UnboundedSender<FlowMessage>,
    incoming: mpsc::UnboundedReceiver<FlowMessage>,
}

#[async_trait]
impl Session for LocalSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn peer(&self) -> &Party {
        &self.peer
    }

    async fn send(&mut self, message: FlowMessage) -> Result<()> {
        tracing::debug!(session = %self.id, to = %self.peer, kind = message.kind(), "Send");
        self.outgoing
            .send(message)
            .map_err(|_| LedgerError::SessionClosed(self.peer.id))
    }

    async fn receive(&mut self, deadline: Instant, phase: &str) -> Result<FlowMessage> {
        match tokio::time::timeout_at(deadline, self.incoming.recv()).await {
            Ok(Some(message)) => {
                tracing::debug!(session = %self.id, from = %self.peer, kind = message.kind(), "Receive");
                Ok(message)
            }
            Ok(None) => Err(LedgerError::SessionClosed(self.peer.id)),
            Err(_) => Err(LedgerError::SessionTimeout {
                party: self.peer.id,
                phase: phase.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn session_round_trip() {
        let net = LocalNetwork::new();
        let (a, b) = (Party::dummy("A"), Party::dummy("B"));
        let mut inbox_b = net.register(&b).unwrap();

        let mut to_b = net.endpoint(&a).initiate(&b).await.unwrap();
        let mut at_b = inbox_b.recv().await.unwrap();
        assert_eq!(at_b.peer(), &a);
        assert_eq!(to_b.peer(), &b);
        assert_eq!(at_b.id(), to_b.id());

        to_b.send(FlowMessage::Decline { reason: "x".into() }).await.unwrap();
        to_b.send(FlowMessage::Recorded).await.unwrap();
        assert_eq!(
            at_b.receive(soon(), "test").await.unwrap(),
            FlowMessage::Decline { reason: "x".into() }
        );
        assert_eq!(at_b.receive(soon(), "test").await.unwrap(), FlowMessage::Recorded);

        at_b.send(FlowMessage::Recorded).await.unwrap();
        assert_eq!(to_b.receive(soon(), "test").await.unwrap(), FlowMessage::Recorded);
    }

    #[tokio::test]
    async fn unknown_peer() {
        let net = LocalNetwork::new();
        let (a, b) = (Party::dummy("A"), Party::dummy("B"));
        let err = net.endpoint(&a).initiate(&b).await.err().unwrap();
        assert!(matches!(err, LedgerError::UnknownParty(id) if id == b.id));
    }

    #[tokio::test]
    async fn disconnected_peer_is_unreachable() {
        let net = LocalNetwork::new();
        let (a, b) = (Party::dummy("A"), Party::dummy("B"));
        let _inbox = net.register(&b).unwrap();
        net.disconnect(&b).unwrap();
        assert!(net.endpoint(&a).initiate(&b).await.is_err());
    }

    #[tokio::test]
    async fn receive_honours_deadline() {
        let net = LocalNetwork::new();
        let (a, b) = (Party::dummy("A"), Party::dummy("B"));
        let _inbox = net.register(&b).unwrap();
        let mut s = net.endpoint(&a).initiate(&b).await.unwrap();
        let err = s
            .receive(Instant::now() + Duration::from_millis(20), "awaiting attestation")
            .await
            .unwrap_err();
        match err {
            LedgerError::SessionTimeout { party, phase } => {
                assert_eq!(party, b.id);
                assert_eq!(phase, "awaiting attestation");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_peer_closes_session() {
        let net = LocalNetwork::new();
        let (a, b) = (Party::dummy("A"), Party::dummy("B"));
        let mut inbox = net.register(&b).unwrap();
        let mut s = net.endpoint(&a).initiate(&b).await.unwrap();
        drop(inbox.recv().await);
        assert!(matches!(
            s.receive(soon(), "test").await,
            Err(LedgerError::SessionClosed(_))
        ));
        assert!(matches!(
            s.send(FlowMessage::Recorded).await,
            Err(LedgerError::SessionClosed(_))
        ));
    }
}
