//! Choosing one live record among several eligible ones.

use tokenledger_types::{LiveRecord, SelectionPolicy};

/// Pick one record from `eligible`, which must be in store recording order.
///
/// `SmallestSufficient` returns the smallest quantity and keeps the earliest
/// recorded among equals; `FirstRecorded` returns the head of the list.
#[must_use]
pub fn select(eligible: &[LiveRecord], policy: SelectionPolicy) -> Option<&LiveRecord> {
    match policy {
        SelectionPolicy::SmallestSufficient => {
            eligible.iter().min_by_key(|live| live.record.quantity)
        }
        SelectionPolicy::FirstRecorded => eligible.first(),
    }
}

#[cfg(test)]
mod tests {
    use tokenledger_types::{Party, Record, RecordRef, SequencerId, TransactionId};

    use super::*;

    fn records(quantities: &[i64]) -> Vec<LiveRecord> {
        let (a, b) = (Party::dummy("A"), Party::dummy("B"));
        let seq = SequencerId::new();
        quantities
            .iter()
            .zip(0u32..)
            .map(|(q, i)| {
                LiveRecord::new(
                    RecordRef::new(TransactionId([1; 32]), i),
                    Record::new(a.clone(), b.clone(), *q),
                    seq,
                )
            })
            .collect()
    }

    #[test]
    fn smallest_sufficient_prefers_least_fragmenting() {
        let eligible = records(&[50, 12, 30]);
        let chosen = select(&eligible, SelectionPolicy::SmallestSufficient).unwrap();
        assert_eq!(chosen.reference.index, 1);
    }

    #[test]
    fn smallest_sufficient_ties_go_to_earliest() {
        let eligible = records(&[40, 20, 20, 20]);
        let chosen = select(&eligible, SelectionPolicy::SmallestSufficient).unwrap();
        assert_eq!(chosen.reference.index, 1);
    }

    #[test]
    fn first_recorded_takes_head() {
        let eligible = records(&[50, 12, 30]);
        let chosen = select(&eligible, SelectionPolicy::FirstRecorded).unwrap();
        assert_eq!(chosen.reference.index, 0);
    }

    #[test]
    fn nothing_eligible() {
        assert!(select(&[], SelectionPolicy::SmallestSufficient).is_none());
        assert!(select(&[], SelectionPolicy::FirstRecorded).is_none());
    }
}
