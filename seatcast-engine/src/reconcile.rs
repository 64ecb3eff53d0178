//! Largest-remainder reconciliation of fractional seat vectors.

use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::types::{ModelId, PartyCode};

/// Values this close to an integer are treated as that integer.
const SNAP_EPSILON: f64 = 1e-9;

/// Round a raw seat vector to integers summing exactly to `target`.
///
/// Every value is floored, then the leftover seats go one at a time to the
/// largest fractional remainders. Equal remainders go to the lower party code.
pub fn reconcile_largest_remainder(
    model: ModelId,
    tier: &'static str,
    raw: &BTreeMap<PartyCode, f64>,
    target: u32,
) -> Result<BTreeMap<PartyCode, u32>> {
    if let Some((party, v)) = raw.iter().find(|(_, v)| !v.is_finite() || **v < 0.0) {
        return Err(EngineError::InvalidInput(format!(
            "{model}: raw {tier} seats for {party} is {v}"
        )));
    }

    let mut seats: BTreeMap<PartyCode, u32> = BTreeMap::new();
    let mut remainders: Vec<(&PartyCode, f64)> = Vec::with_capacity(raw.len());
    for (party, &value) in raw {
        let snapped = if (value - value.round()).abs() < SNAP_EPSILON {
            value.round()
        } else {
            value
        };
        let floor = snapped.floor();
        seats.insert(party.clone(), floor as u32);
        remainders.push((party, snapped - floor));
    }

    let floor_sum: u32 = seats.values().sum();
    let violation = || EngineError::SeatConservationViolation {
        model,
        tier,
        expected: target,
        actual: floor_sum,
    };
    if floor_sum > target {
        return Err(violation());
    }
    let leftover = (target - floor_sum) as usize;
    if leftover > remainders.len() {
        return Err(violation());
    }

    remainders.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    for (party, _) in remainders.into_iter().take(leftover) {
        if let Some(n) = seats.get_mut(party) {
            *n += 1;
        }
    }

    Ok(seats)
}
