//! The Issue / Move / Redeem contract.
//!
//! Every clause for the transaction's intent is evaluated, and every failing
//! clause is reported. A transaction with several problems is never reported
//! as having only the first one.

use std::collections::{BTreeMap, HashMap, HashSet};

use tokenledger_types::{
    Intent, LedgerError, Party, PartyId, Record, Result, Rule, Transaction, Violation,
};

use crate::sums::{has_positive_quantities, issuer_sums};

/// Check `tx` against the contract.
///
/// Pure: the verdict depends only on `tx`'s consumed record contents,
/// produced records, intent, and declared attestors.
///
/// # Errors
/// Returns [`LedgerError::ValidationFailed`] listing every violated rule.
pub fn verify(tx: &Transaction) -> Result<()> {
    let violations = violations(tx);
    if violations.is_empty() {
        return Ok(());
    }
    tracing::debug!(
        tx = %tx.id,
        intent = %tx.intent,
        violations = violations.len(),
        "Transaction rejected by contract"
    );
    Err(LedgerError::ValidationFailed {
        tx: tx.id,
        violations,
    })
}

/// Every rule `tx` violates, in clause order. Empty means valid.
#[must_use]
pub fn violations(tx: &Transaction) -> Vec<Violation> {
    let inputs: Vec<&Record> = tx.consumed.iter().map(|input| &input.record).collect();
    let outputs: Vec<&Record> = tx.produced.iter().collect();
    let mut found = Vec::new();

    check_distinct_consumed(tx, &mut found);

    match tx.intent {
        Intent::Issue => {
            require(
                &mut found,
                inputs.is_empty(),
                Rule::IssueConsumesNothing,
                || format!("{} record(s) consumed", inputs.len()),
            );
            require(
                &mut found,
                !outputs.is_empty(),
                Rule::IssueProducesRecords,
                || "no records produced".to_string(),
            );
            check_positive(&inputs, &outputs, &mut found);
            check_attested(
                tx,
                outputs.iter().map(|r| &r.issuer),
                Rule::IssuersAttest,
                &mut found,
            );
        }
        Intent::Move => {
            require(
                &mut found,
                !inputs.is_empty(),
                Rule::MoveConsumesRecords,
                || "no records consumed".to_string(),
            );
            require(
                &mut found,
                !outputs.is_empty(),
                Rule::MoveProducesRecords,
                || "no records produced".to_string(),
            );
            check_positive(&inputs, &outputs, &mut found);
            check_conservation(&inputs, &outputs, &mut found);
            check_attested(
                tx,
                inputs.iter().map(|r| &r.holder),
                Rule::HoldersAttest,
                &mut found,
            );
        }
        Intent::Redeem => {
            require(
                &mut found,
                !inputs.is_empty(),
                Rule::RedeemConsumesRecords,
                || "no records consumed".to_string(),
            );
            require(
                &mut found,
                outputs.is_empty(),
                Rule::RedeemProducesNothing,
                || format!("{} record(s) produced", outputs.len()),
            );
            check_positive(&inputs, &[], &mut found);
            check_attested(
                tx,
                inputs.iter().map(|r| &r.issuer),
                Rule::IssuersAttest,
                &mut found,
            );
            check_attested(
                tx,
                inputs.iter().map(|r| &r.holder),
                Rule::HoldersAttest,
                &mut found,
            );
        }
    }

    found
}

fn require(found: &mut Vec<Violation>, holds: bool, rule: Rule, detail: impl FnOnce() -> String) {
    if !holds {
        found.push(Violation::new(rule, detail()));
    }
}

fn check_distinct_consumed(tx: &Transaction, found: &mut Vec<Violation>) {
    let mut seen = HashSet::new();
    let repeated: Vec<String> = tx
        .consumed
        .iter()
        .filter(|input| !seen.insert(input.reference))
        .map(|input| input.reference.to_string())
        .collect();
    require(found, repeated.is_empty(), Rule::DistinctConsumed, || {
        format!("consumed more than once: {}", repeated.join(", "))
    });
}

fn check_positive(inputs: &[&Record], outputs: &[&Record], found: &mut Vec<Violation>) {
    if has_positive_quantities(inputs.iter().copied(), outputs.iter().copied()) {
        return;
    }
    let offenders: Vec<String> = inputs
        .iter()
        .enumerate()
        .filter(|(_, r)| r.quantity <= 0)
        .map(|(i, r)| format!("consumed[{i}]={}", r.quantity))
        .chain(
            outputs
                .iter()
                .enumerate()
                .filter(|(_, r)| r.quantity <= 0)
                .map(|(i, r)| format!("produced[{i}]={}", r.quantity)),
        )
        .collect();
    found.push(Violation::new(
        Rule::PositiveQuantities,
        format!("non-positive quantities: {}", offenders.join(", ")),
    ));
}

fn check_conservation(inputs: &[&Record], outputs: &[&Record], found: &mut Vec<Violation>) {
    let input_sums = issuer_sums(inputs.iter().copied());
    let output_sums = issuer_sums(outputs.iter().copied());
    let names: HashMap<PartyId, &str> = inputs
        .iter()
        .chain(outputs)
        .map(|r| (r.issuer.id, r.issuer.name.as_str()))
        .collect();
    let name = |id: &PartyId| names.get(id).copied().unwrap_or("?").to_string();

    let only_in = |a: &BTreeMap<PartyId, i128>, b: &BTreeMap<PartyId, i128>| -> Vec<String> {
        a.keys().filter(|k| !b.contains_key(*k)).map(name).collect()
    };
    let vanished = only_in(&input_sums, &output_sums);
    let appeared = only_in(&output_sums, &input_sums);
    require(
        found,
        vanished.is_empty() && appeared.is_empty(),
        Rule::IssuersConserved,
        || {
            format!(
                "issuers only consumed: [{}]; issuers only produced: [{}]",
                vanished.join(", "),
                appeared.join(", ")
            )
        },
    );

    let unbalanced: Vec<String> = input_sums
        .iter()
        .filter_map(|(issuer, consumed)| {
            let produced = output_sums.get(issuer)?;
            (produced != consumed)
                .then(|| format!("{} consumed {consumed} produced {produced}", name(issuer)))
        })
        .collect();
    require(
        found,
        unbalanced.is_empty(),
        Rule::QuantitiesConserved,
        || unbalanced.join(", "),
    );
}

fn check_attested<'a>(
    tx: &Transaction,
    required: impl Iterator<Item = &'a Party>,
    rule: Rule,
    found: &mut Vec<Violation>,
) {
    let mut seen = HashSet::new();
    let missing: Vec<String> = required
        .filter(|party| seen.insert(party.id))
        .filter(|party| !tx.attestors.contains(&party.key))
        .map(|party| format!("{} ({})", party.name, party.key))
        .collect();
    require(found, missing.is_empty(), rule, || {
        format!("missing attestation from {}", missing.join(", "))
    });
}
