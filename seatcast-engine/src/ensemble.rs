//! Ensemble combiner.
//!
//! Weighted linear combination of model seat vectors, reconciled back to
//! integers. Party totals are reconciled first, so each stays within one seat
//! of its raw value. The district tier is then fitted under those totals and
//! the proportional tier takes the rest, which keeps both tier sums exact.

use seatcast_common::validation::WEIGHT_EPSILON;
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::reconcile::reconcile_largest_remainder;
use crate::types::{ModelId, ModelResult, PartyCode};

/// Check that `weights` can combine `members` results.
pub fn check_weights(weights: &[f64], members: usize) -> Result<()> {
    let invalid = |reason: String| Err(EngineError::InvalidWeights { reason });

    if weights.is_empty() {
        return invalid("no weights given".into());
    }
    if weights.len() != members {
        return invalid(format!("{} weights for {} models", weights.len(), members));
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return invalid(format!("weight {w} is not a finite non-negative number"));
    }
    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > WEIGHT_EPSILON {
        return invalid(format!("weights sum to {total}, expected 1"));
    }
    Ok(())
}

/// Combine `results` with `weights` into a new result tagged `model`.
pub fn combine(model: ModelId, results: &[&ModelResult], weights: &[f64]) -> Result<ModelResult> {
    check_weights(weights, results.len())?;

    let expected = results[0].totals();
    for r in &results[1..] {
        let totals = r.totals();
        if totals.district != expected.district {
            return Err(EngineError::SeatConservationViolation {
                model: r.model,
                tier: "district",
                expected: expected.district,
                actual: totals.district,
            });
        }
        if totals.proportional != expected.proportional {
            return Err(EngineError::SeatConservationViolation {
                model: r.model,
                tier: "proportional",
                expected: expected.proportional,
                actual: totals.proportional,
            });
        }
    }

    let mut raw_district: BTreeMap<PartyCode, f64> = BTreeMap::new();
    let mut raw_total: BTreeMap<PartyCode, f64> = BTreeMap::new();
    for (result, &w) in results.iter().zip(weights) {
        for (party, split) in &result.seats {
            *raw_district.entry(party.clone()).or_default() += w * f64::from(split.district);
            *raw_total.entry(party.clone()).or_default() += w * f64::from(split.total());
        }
    }

    let totals = reconcile_largest_remainder(model, "total", &raw_total, expected.total())?;
    let district = fit_district_tier(model, &raw_district, &totals, expected.district)?;

    let mut proportional: BTreeMap<PartyCode, u32> = BTreeMap::new();
    for (party, &total) in &totals {
        let d = district.get(party).copied().unwrap_or(0);
        let p = total.checked_sub(d).ok_or(EngineError::SeatConservationViolation {
            model,
            tier: "proportional",
            expected: expected.proportional,
            actual: 0,
        })?;
        proportional.insert(party.clone(), p);
    }

    let combined = ModelResult::from_tiers(model, &district, &proportional);
    combined.ensure_conserved(expected)?;
    Ok(combined)
}

/// Reconcile the district tier, then move seats off any party whose district
/// seats exceed its reconciled total.
///
/// A moved seat goes to the party with room under its total whose district
/// seats fall furthest below its raw district value. Ties go to the lower
/// party code.
fn fit_district_tier(
    model: ModelId,
    raw_district: &BTreeMap<PartyCode, f64>,
    totals: &BTreeMap<PartyCode, u32>,
    target: u32,
) -> Result<BTreeMap<PartyCode, u32>> {
    let mut district = reconcile_largest_remainder(model, "district", raw_district, target)?;
    let cap = |party: &PartyCode| totals.get(party).copied().unwrap_or(0);

    let over: Vec<(PartyCode, u32)> = district
        .iter()
        .filter(|(party, d)| **d > cap(*party))
        .map(|(party, d)| (party.clone(), d - cap(party)))
        .collect();

    for (party, excess) in over {
        for _ in 0..excess {
            let receiver = district
                .iter()
                .filter(|(q, d)| cap(*q) > **d)
                .map(|(q, d)| (q.clone(), raw_district.get(q).copied().unwrap_or(0.0) - f64::from(*d)))
                .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
                .map(|(q, _)| q)
                .ok_or(EngineError::SeatConservationViolation {
                    model,
                    tier: "district",
                    expected: target,
                    actual: totals.values().sum(),
                })?;
            if let Some(d) = district.get_mut(&party) {
                *d -= 1;
            }
            if let Some(d) = district.get_mut(&receiver) {
                *d += 1;
            }
        }
    }

    Ok(district)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SeatSplit;
    use proptest::prelude::*;

    fn result(model: ModelId, seats: &[(&str, u32, u32)]) -> ModelResult {
        ModelResult {
            model,
            seats: seats
                .iter()
                .map(|(p, d, pr)| ((*p).to_string(), SeatSplit { district: *d, proportional: *pr }))
                .collect(),
        }
    }

    #[test]
    fn test_two_party_midpoint() {
        let a = result(ModelId::Engagement, &[("A", 120, 0), ("B", 100, 0)]);
        let b = result(ModelId::SentimentWeighted, &[("A", 118, 0), ("B", 102, 0)]);
        let combined = combine(ModelId::VideoEnsemble, &[&a, &b], &[0.5, 0.5]).unwrap();
        assert_eq!(combined.model, ModelId::VideoEnsemble);
        assert_eq!(combined.seats_for("A"), 119);
        assert_eq!(combined.seats_for("B"), 101);
    }

    #[test]
    fn test_party_totals_follow_raw_totals() {
        let a = result(ModelId::Engagement, &[("A", 3, 0), ("B", 0, 3)]);
        let b = result(ModelId::News, &[("A", 0, 3), ("B", 3, 0)]);
        let combined = combine(ModelId::IntegratedEnsemble, &[&a, &b], &[0.5, 0.5]).unwrap();
        assert_eq!(combined.district_total(), 3);
        assert_eq!(combined.proportional_total(), 3);
        // both parties average exactly 3 seats; only the tier split is rounded
        assert_eq!(combined.seats_for("A"), 3);
        assert_eq!(combined.seats_for("B"), 3);
        assert_eq!(combined.seats["A"], SeatSplit { district: 2, proportional: 1 });
        assert_eq!(combined.seats["B"], SeatSplit { district: 1, proportional: 2 });
    }

    #[test]
    fn test_district_seat_moves_under_party_total() {
        // raw district A .6, B .4; raw totals A .6, B .7, C 1.7
        let m1 = result(ModelId::Engagement, &[("A", 1, 0), ("B", 0, 1), ("C", 0, 1)]);
        let m2 = result(ModelId::SentimentWeighted, &[("A", 1, 0), ("B", 0, 0), ("C", 0, 2)]);
        let m3 = result(ModelId::PollingMomentum, &[("A", 0, 0), ("B", 1, 0), ("C", 0, 2)]);
        let combined =
            combine(ModelId::VideoEnsemble, &[&m1, &m2, &m3], &[0.3, 0.3, 0.4]).unwrap();

        assert_eq!(combined.seats_for("A"), 0);
        assert_eq!(combined.seats["B"], SeatSplit { district: 1, proportional: 0 });
        assert_eq!(combined.seats["C"], SeatSplit { district: 0, proportional: 2 });
        assert_eq!(combined.district_total(), 1);
        assert_eq!(combined.proportional_total(), 2);
    }

    #[test]
    fn test_party_missing_from_one_model() {
        let a = result(ModelId::Engagement, &[("A", 4, 2)]);
        let b = result(ModelId::News, &[("A", 2, 2), ("C", 2, 0)]);
        let combined = combine(ModelId::IntegratedEnsemble, &[&a, &b], &[0.75, 0.25]).unwrap();
        assert_eq!(combined.total_seats(), 6);
        assert_eq!(combined.seats_for("C"), 0);
        assert_eq!(combined.seats_for("A"), 6);
    }

    #[test]
    fn test_invalid_weights() {
        let a = result(ModelId::Engagement, &[("A", 1, 1)]);
        for weights in [vec![], vec![0.5], vec![0.7, 0.7], vec![-0.5, 1.5], vec![f64::NAN, 1.0]] {
            let err = combine(ModelId::VideoEnsemble, &[&a, &a], &weights).unwrap_err();
            assert!(matches!(err, EngineError::InvalidWeights { .. }), "{weights:?}");
        }
    }

    #[test]
    fn test_mismatched_totals_are_a_violation() {
        let a = result(ModelId::Engagement, &[("A", 3, 1)]);
        let b = result(ModelId::News, &[("A", 2, 1)]);
        let err = combine(ModelId::IntegratedEnsemble, &[&a, &b], &[0.5, 0.5]).unwrap_err();
        assert!(matches!(err, EngineError::SeatConservationViolation { tier: "district", .. }));
    }

    proptest! {
        #[test]
        fn prop_ensemble_conserves_both_tiers(
            split_a in proptest::collection::vec(0u32..50, 4),
            split_b in proptest::collection::vec(0u32..50, 4),
            w in 0.0f64..1.0,
        ) {
            // Build two results with identical tier totals by shifting seats between parties.
            let district_total: u32 = split_a.iter().sum();
            let proportional_total: u32 = split_b.iter().sum();
            let parties = ["A", "B", "C", "D"];
            let make = |model: ModelId, d: &[u32], p: &[u32]| ModelResult {
                model,
                seats: parties
                    .iter()
                    .enumerate()
                    .map(|(i, party)| ((*party).to_string(), SeatSplit { district: d[i], proportional: p[i] }))
                    .collect(),
            };
            let first = make(ModelId::Engagement, &split_a, &split_b);
            let mut rev_a = split_a.clone();
            rev_a.reverse();
            let mut rev_b = split_b.clone();
            rev_b.reverse();
            let second = make(ModelId::News, &rev_a, &rev_b);

            let combined = combine(ModelId::IntegratedEnsemble, &[&first, &second], &[w, 1.0 - w]).unwrap();
            prop_assert_eq!(combined.district_total(), district_total);
            prop_assert_eq!(combined.proportional_total(), proportional_total);

            for (i, party) in parties.iter().enumerate() {
                let raw = w * f64::from(split_a[i] + split_b[i])
                    + (1.0 - w) * f64::from(rev_a[i] + rev_b[i]);
                let diff = (f64::from(combined.seats_for(party)) - raw).abs();
                prop_assert!(diff < 1.0 + 1e-9, "{} got {} from raw {}", party, combined.seats_for(party), raw);
            }
        }
    }
}
