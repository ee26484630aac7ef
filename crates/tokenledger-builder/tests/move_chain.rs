//! A holder spends down a single issuance through repeated moves, recording
//! each result locally, and the change always comes back as the next input.

use tokenledger_builder::{MemoryRecordStore, ProposalBuilder, RecordFilter, RecordStore};
use tokenledger_types::*;

fn record_everywhere(stores: &[&MemoryRecordStore], tx: &Transaction) {
    let signed = SignedTransaction::new(tx.clone());
    for store in stores {
        store.apply(&signed).unwrap();
    }
}

#[test]
fn change_feeds_the_next_move() {
    let seq = SequencerId::new();
    let mint = Party::dummy("Mint");
    let alice = Party::dummy("Alice");
    let bob = Party::dummy("Bob");
    let mint_store = MemoryRecordStore::for_party(mint.clone());
    let alice_store = MemoryRecordStore::for_party(alice.clone());
    let bob_store = MemoryRecordStore::for_party(bob.clone());
    let all = [&mint_store, &alice_store, &bob_store];

    let issued = ProposalBuilder::new(&mint, &mint_store, SelectionPolicy::default(), seq)
        .issue(&alice, 100)
        .unwrap();
    record_everywhere(&all, &issued.tx);

    let alice_builder = ProposalBuilder::new(&alice, &alice_store, SelectionPolicy::default(), seq);
    for (step, amount) in [30_i64, 25, 45].into_iter().enumerate() {
        let p = alice_builder.plan_move(&mint, amount, &bob).unwrap();
        assert_eq!(p.tx.consumed.len(), 1, "step {step}");
        record_everywhere(&all, &p.tx);
    }

    let alice_left = alice_store.query(&RecordFilter::default()).unwrap();
    assert!(alice_left.is_empty(), "alice spent everything: {alice_left:?}");

    let bob_total: i64 = bob_store
        .query(&RecordFilter::issued_to(mint.id, bob.id))
        .unwrap()
        .iter()
        .map(|live| live.record.quantity)
        .sum();
    assert_eq!(bob_total, 100);

    // The issuer sees every record it issued, wherever it sits now.
    let outstanding: i64 = mint_store
        .query(&RecordFilter::default())
        .unwrap()
        .iter()
        .map(|live| live.record.quantity)
        .sum();
    assert_eq!(outstanding, 100);

    assert!(matches!(
        alice_builder.plan_move(&mint, 1, &bob),
        Err(LedgerError::InsufficientFunds { .. })
    ));
}
