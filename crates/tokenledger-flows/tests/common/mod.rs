//! Shared harness: an in-process network, one sequencer, and nodes that
//! answer their sessions in background tasks.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use ed25519_dalek::SigningKey;
use tokenledger_builder::{MemoryRecordStore, RecordFilter, RecordStore};
use tokenledger_flows::*;
use tokenledger_types::*;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct Member {
    pub party: Party,
    pub key: SigningKey,
    pub node: Arc<LedgerNode>,
    pub store: Arc<MemoryRecordStore>,
    pub progress: Arc<RecordingObserver>,
}

impl Member {
    /// Quantity of `issuer`'s tokens this member's store shows held by `holder`.
    pub fn holding(&self, issuer: &Party, holder: &Party) -> i64 {
        self.store
            .query(&RecordFilter::issued_to(issuer.id, holder.id))
            .unwrap()
            .iter()
            .map(|live| live.record.quantity)
            .sum()
    }

    pub fn live_count(&self) -> usize {
        self.store.live_count().unwrap()
    }
}

pub struct Cluster {
    pub net: LocalNetwork,
    pub sequencer: Arc<LocalSequencer>,
}

impl Cluster {
    pub fn new() -> Self {
        init_tracing();
        Self {
            net: LocalNetwork::new(),
            sequencer: Arc::new(LocalSequencer::new()),
        }
    }

    /// A reachable member serving its sessions with default settings.
    pub fn join(&self, name: &str) -> Member {
        self.join_with(name, FlowConfig::default(), Arc::new(AcceptValid))
    }

    pub fn join_with(
        &self,
        name: &str,
        config: FlowConfig,
        policy: Arc<dyn ResponderPolicy>,
    ) -> Member {
        let (member, inbox) = self.join_unserved(name, config, policy);
        let _handle = Arc::clone(&member.node).serve(inbox);
        member
    }

    /// A reachable member whose inbox nobody reads.
    pub fn join_unserved(
        &self,
        name: &str,
        config: FlowConfig,
        policy: Arc<dyn ResponderPolicy>,
    ) -> (Member, Inbox) {
        let (party, key) = Party::generate(name);
        let signer = KeyPairSigner::new(party.clone(), key.clone()).unwrap();
        let inbox = self.net.register(&party).unwrap();
        let member = self.member(party, key, signer, config, policy);
        (member, inbox)
    }

    /// A member no one can open sessions to.
    pub fn offline(&self, name: &str) -> Member {
        let (party, key) = Party::generate(name);
        let signer = KeyPairSigner::new(party.clone(), key.clone()).unwrap();
        self.member(party, key, signer, FlowConfig::default(), Arc::new(AcceptValid))
    }

    /// A second node for an existing party, with its own empty store.
    pub fn replica(&self, of: &Member) -> Member {
        let signer = KeyPairSigner::new(of.party.clone(), of.key.clone()).unwrap();
        self.member(
            of.party.clone(),
            of.key.clone(),
            signer,
            FlowConfig::default(),
            Arc::new(AcceptValid),
        )
    }

    fn member(
        &self,
        party: Party,
        key: SigningKey,
        signer: KeyPairSigner,
        config: FlowConfig,
        policy: Arc<dyn ResponderPolicy>,
    ) -> Member {
        let store = Arc::new(MemoryRecordStore::for_party(party.clone()));
        let progress = Arc::new(RecordingObserver::new());
        let node = LedgerNode::new(
            Arc::new(signer),
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::new(self.net.endpoint(&party)),
            Arc::clone(&self.sequencer) as Arc<dyn Sequencer>,
        )
        .unwrap()
        .with_config(config)
        .unwrap()
        .with_policy(policy)
        .with_observer(Arc::clone(&progress) as Arc<dyn ProgressObserver>);
        Member {
            party,
            key,
            node: Arc::new(node),
            store,
            progress,
        }
    }
}
