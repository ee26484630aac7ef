//! Per-issuer quantity totals, the basis of the conservation law.

use std::collections::BTreeMap;

use tokenledger_types::{PartyId, Record};

/// Sum of quantities grouped by issuer.
///
/// Totals are accumulated in `i128` so that no set of `i64` quantities can
/// overflow into a value that happens to balance.
pub fn issuer_sums<'a>(records: impl IntoIterator<Item = &'a Record>) -> BTreeMap<PartyId, i128> {
    let mut sums = BTreeMap::new();
    for record in records {
        *sums.entry(record.issuer.id).or_insert(0i128) += i128::from(record.quantity);
    }
    sums
}

/// Whether every record in both sets has a strictly positive quantity.
pub fn has_positive_quantities<'a>(
    consumed: impl IntoIterator<Item = &'a Record>,
    produced: impl IntoIterator<Item = &'a Record>,
) -> bool {
    consumed.into_iter().all(|r| r.quantity > 0) && produced.into_iter().all(|r| r.quantity > 0)
}

#[cfg(test)]
mod tests {
    use tokenledger_types::Party;

    use super::*;

    #[test]
    fn groups_by_issuer() {
        let a = Party::dummy("A");
        let b = Party::dummy("B");
        let holder = Party::dummy("H");
        let records = [
            Record::new(a.clone(), holder.clone(), 10),
            Record::new(b.clone(), holder.clone(), 3),
            Record::new(a.clone(), holder, 5),
        ];
        let sums = issuer_sums(&records);
        assert_eq!(sums.len(), 2);
        assert_eq!(sums[&a.id], 15);
        assert_eq!(sums[&b.id], 3);
    }

    #[test]
    fn empty_set_has_no_issuers() {
        let none: [Record; 0] = [];
        assert!(issuer_sums(&none).is_empty());
    }

    #[test]
    fn no_overflow_at_extremes() {
        let a = Party::dummy("A");
        let h = Party::dummy("H");
        let records = [
            Record::new(a.clone(), h.clone(), i64::MAX),
            Record::new(a.clone(), h, i64::MAX),
        ];
        assert_eq!(issuer_sums(&records)[&a.id], 2 * i128::from(i64::MAX));
    }

    #[test]
    fn positive_quantities() {
        let a = Party::dummy("A");
        let ok = [Record::new(a.clone(), a.clone(), 1)];
        let zero = [Record::new(a.clone(), a.clone(), 0)];
        let negative = [Record::new(a.clone(), a, -4)];
        assert!(has_positive_quantities(&ok, &ok));
        let none: [Record; 0] = [];
        assert!(has_positive_quantities(&none, &none));
        assert!(!has_positive_quantities(&zero, &ok));
        assert!(!has_positive_quantities(&ok, &negative));
    }
}
