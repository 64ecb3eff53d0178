//! Highest-averages (D'Hondt) apportionment of proportional blocks.
//!
//! Every party with positive support contributes the quotients
//! `support / 1 .. support / S`. The `S` largest quotients each win one seat.
//! Equal quotients go to the party with more total support, then to the lower
//! party code.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{EngineError, Result, ResultExt};
use crate::types::{PartyCode, ProportionalBlock};

/// One candidate quotient in the selection pool.
struct Quotient<'a> {
    party: &'a PartyCode,
    support: f64,
    value: f64,
}

impl Quotient<'_> {
    /// Selection order: larger quotient, larger support, lower party code.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .value
            .total_cmp(&self.value)
            .then_with(|| other.support.total_cmp(&self.support))
            .then_with(|| self.party.cmp(other.party))
    }
}

/// Apportion `seats` among parties by D'Hondt.
///
/// Every party in `support` appears in the output, zero-support parties with 0 seats.
pub fn dhondt(
    block_id: &str,
    seats: u32,
    support: &BTreeMap<PartyCode, f64>,
) -> Result<BTreeMap<PartyCode, u32>> {
    let no_support = |reason: String| EngineError::NoSupport {
        block_id: block_id.to_string(),
        reason,
    };

    if let Some((party, value)) = support.iter().find(|(_, v)| !v.is_finite() || **v < 0.0) {
        return Err(no_support(format!("invalid support {value} for {party}")));
    }
    if !support.values().any(|v| *v > 0.0) {
        return Err(no_support("no party has positive support".into()));
    }

    let mut pool: Vec<Quotient<'_>> = support
        .iter()
        .filter(|(_, v)| **v > 0.0)
        .flat_map(|(party, &v)| {
            (1..=seats).map(move |d| Quotient {
                party,
                support: v,
                value: v / f64::from(d),
            })
        })
        .collect();
    pool.sort_by(|a, b| a.rank(b));

    let mut allocation: BTreeMap<PartyCode, u32> =
        support.keys().map(|p| (p.clone(), 0)).collect();
    for q in pool.iter().take(seats as usize) {
        if let Some(n) = allocation.get_mut(q.party) {
            *n += 1;
        }
    }

    Ok(allocation)
}

/// Result of apportioning every block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockApportionment {
    /// Block id → party → seats
    pub blocks: BTreeMap<String, BTreeMap<PartyCode, u32>>,
    /// Party → seats summed over all blocks
    pub totals: BTreeMap<PartyCode, u32>,
}

/// Apportion every block in parallel and sum the national proportional totals.
///
/// `support_for` supplies the support map of each block.
pub fn apportion_blocks<F>(blocks: &[ProportionalBlock], support_for: F) -> Result<BlockApportionment>
where
    F: Fn(&ProportionalBlock) -> Result<BTreeMap<PartyCode, f64>> + Sync,
{
    let allocations: Vec<(String, BTreeMap<PartyCode, u32>)> = blocks
        .par_iter()
        .map(|block| -> Result<(String, BTreeMap<PartyCode, u32>)> {
            let support = support_for(block)?;
            let seats = dhondt(&block.id, block.seats, &support)
                .context(format!("apportioning block {}", block.id))?;
            tracing::debug!(block = %block.id, seats = block.seats, "Block apportioned");
            Ok((block.id.clone(), seats))
        })
        .collect::<Result<_>>()?;

    let mut result = BlockApportionment::default();
    for (block_id, seats) in allocations {
        for (party, n) in &seats {
            *result.totals.entry(party.clone()).or_default() += n;
        }
        result.blocks.insert(block_id, seats);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn support(pairs: &[(&str, f64)]) -> BTreeMap<PartyCode, f64> {
        pairs.iter().map(|(p, v)| ((*p).to_string(), *v)).collect()
    }

    #[test]
    fn test_textbook_example() {
        let seats = dhondt(
            "kinki",
            5,
            &support(&[("A", 100_000.0), ("B", 80_000.0), ("C", 30_000.0)]),
        )
        .unwrap();
        assert_eq!(seats["A"], 3);
        assert_eq!(seats["B"], 2);
        assert_eq!(seats["C"], 0);
    }

    #[test]
    fn test_zero_support_party_listed_with_no_seats() {
        let seats = dhondt("tokai", 21, &support(&[("A", 1.0), ("B", 0.0)])).unwrap();
        assert_eq!(seats["A"], 21);
        assert_eq!(seats["B"], 0);
    }

    #[test_case(2, &[("A", 0.5), ("B", 0.5)], &[1, 1] ; "even split")]
    #[test_case(1, &[("B", 0.5), ("A", 0.5)], &[1, 0] ; "equal support goes to lower code")]
    #[test_case(3, &[("A", 0.4), ("B", 0.2)], &[2, 1] ; "quotient tie goes to larger support")]
    #[test_case(0, &[("A", 0.4), ("B", 0.2)], &[0, 0] ; "no seats")]
    fn test_tie_breaks(seats: u32, pairs: &[(&str, f64)], expected: &[u32]) {
        let result = dhondt("b", seats, &support(pairs)).unwrap();
        assert_eq!(result["A"], expected[0]);
        assert_eq!(result["B"], expected[1]);
    }

    #[test]
    fn test_no_support_errors() {
        let err = dhondt("shikoku", 6, &support(&[("A", 0.0)])).unwrap_err();
        assert!(matches!(err, EngineError::NoSupport { ref block_id, .. } if block_id == "shikoku"));
        assert!(dhondt("shikoku", 6, &BTreeMap::new()).is_err());
        assert!(dhondt("shikoku", 6, &support(&[("A", -1.0), ("B", 2.0)])).is_err());
        assert!(dhondt("shikoku", 6, &support(&[("A", f64::NAN)])).is_err());
    }

    #[test]
    fn test_apportion_blocks_sums_totals() {
        let blocks = vec![
            ProportionalBlock { id: "north".into(), seats: 5, support: support(&[("A", 0.6), ("B", 0.4)]) },
            ProportionalBlock { id: "south".into(), seats: 3, support: support(&[("B", 0.7), ("C", 0.3)]) },
        ];
        let result = apportion_blocks(&blocks, |b| Ok(b.support.clone())).unwrap();
        assert_eq!(result.blocks.len(), 2);
        assert_eq!(result.totals.values().sum::<u32>(), 8);
        assert_eq!(result.blocks["north"]["A"], 3);
        assert_eq!(result.totals["B"], 2 + 2);
        assert_eq!(result.totals["C"], 1);
    }

    #[test]
    fn test_apportion_blocks_reports_block() {
        let blocks = vec![ProportionalBlock { id: "empty".into(), seats: 4, support: BTreeMap::new() }];
        let err = apportion_blocks(&blocks, |b| Ok(b.support.clone())).unwrap_err();
        assert_eq!(err.kind(), "no_support");
        assert!(err.to_string().contains("empty"));
    }

    proptest! {
        #[test]
        fn prop_conserves_block_seats(
            seats in 0u32..40,
            values in proptest::collection::vec(0.0f64..1000.0, 1..8),
        ) {
            prop_assume!(values.iter().any(|v| *v > 0.0));
            let map: BTreeMap<PartyCode, f64> =
                values.iter().enumerate().map(|(i, v)| (format!("P{i}"), *v)).collect();
            let result = dhondt("b", seats, &map).unwrap();
            prop_assert_eq!(result.values().sum::<u32>(), seats);
            for (party, v) in &map {
                if *v == 0.0 {
                    prop_assert_eq!(result[party], 0);
                }
            }
        }

        #[test]
        fn prop_monotone_in_own_support(
            seats in 1u32..30,
            values in proptest::collection::vec(1.0f64..1000.0, 2..6),
            boost in 0.0f64..500.0,
        ) {
            let mut map: BTreeMap<PartyCode, f64> =
                values.iter().enumerate().map(|(i, v)| (format!("P{i}"), *v)).collect();
            let before = dhondt("b", seats, &map).unwrap()["P0"];
            if let Some(v) = map.get_mut("P0") {
                *v += boost;
            }
            let after = dhondt("b", seats, &map).unwrap()["P0"];
            prop_assert!(after >= before);
        }
    }
}
