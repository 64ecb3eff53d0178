//! Coalition totals and race rankings.

use serde::{Deserialize, Serialize};
use seatcast_common::config::CoalitionConfig;
use std::collections::BTreeMap;

use crate::district::DistrictCall;
use crate::types::{ModelId, ModelResult, PartyCode};

// ============================================================================
// Coalitions
// ============================================================================

/// Seats held by one coalition under one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoalitionTotal {
    pub coalition: String,
    pub parties: Vec<PartyCode>,
    pub seats: u32,
    /// Strictly more than half the chamber
    pub majority: bool,
    /// At least two thirds of the chamber
    pub supermajority: bool,
}

/// Strict majority test: exactly half is not a majority.
pub fn has_majority(seats: u32, total_seats: u32) -> bool {
    u64::from(seats) * 2 > u64::from(total_seats)
}

/// Two-thirds test.
pub fn has_supermajority(seats: u32, total_seats: u32) -> bool {
    u64::from(seats) * 3 >= u64::from(total_seats) * 2
}

/// Sum seats per coalition. Unknown party codes contribute nothing.
pub fn coalition_totals(
    result: &ModelResult,
    coalitions: &[CoalitionConfig],
    total_seats: u32,
) -> Vec<CoalitionTotal> {
    coalitions
        .iter()
        .map(|c| {
            let seats = c.parties.iter().map(|p| result.seats_for(p)).sum();
            CoalitionTotal {
                coalition: c.name.clone(),
                parties: c.parties.clone(),
                seats,
                majority: has_majority(seats, total_seats),
                supermajority: has_supermajority(seats, total_seats),
            }
        })
        .collect()
}

// ============================================================================
// Closest Races
// ============================================================================

/// One entry of the closest-race ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosestRace {
    /// 1-based
    pub rank: usize,
    pub district_id: String,
    pub prefecture: String,
    pub margin: f64,
    pub winner: PartyCode,
    pub runner_up: Option<PartyCode>,
}

/// The `k` districts with the smallest margins, ties by district id.
pub fn closest_races(calls: &[DistrictCall], k: usize) -> Vec<ClosestRace> {
    let mut ranked: Vec<&DistrictCall> = calls.iter().collect();
    ranked.sort_by(|a, b| {
        a.margin
            .total_cmp(&b.margin)
            .then_with(|| a.district_id.cmp(&b.district_id))
    });

    ranked
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(i, call)| ClosestRace {
            rank: i + 1,
            district_id: call.district_id.clone(),
            prefecture: call.prefecture.clone(),
            margin: call.margin,
            winner: call.winner.clone(),
            runner_up: call.runner_up.clone(),
        })
        .collect()
}

// ============================================================================
// Model Comparison
// ============================================================================

/// A party's seat change against a reference model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatDelta {
    pub party: PartyCode,
    pub baseline: u32,
    pub seats: u32,
    pub delta: i64,
}

/// Per-party change of `result` against `baseline`, over the union of parties.
pub fn seat_deltas(result: &ModelResult, baseline: &ModelResult) -> Vec<SeatDelta> {
    let mut parties: Vec<&PartyCode> = result.seats.keys().chain(baseline.seats.keys()).collect();
    parties.sort();
    parties.dedup();

    parties
        .into_iter()
        .map(|party| {
            let before = baseline.seats_for(party);
            let after = result.seats_for(party);
            SeatDelta {
                party: party.clone(),
                baseline: before,
                seats: after,
                delta: i64::from(after) - i64::from(before),
            }
        })
        .collect()
}

/// Spread of a party's seat total across models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatRange {
    pub party: PartyCode,
    pub min: u32,
    pub max: u32,
    pub min_model: ModelId,
    pub max_model: ModelId,
}

/// Per-party min and max across `results`. The lower model id wins ties.
pub fn seat_ranges<'a>(results: impl IntoIterator<Item = &'a ModelResult>) -> Vec<SeatRange> {
    let mut ranges: BTreeMap<PartyCode, SeatRange> = BTreeMap::new();
    let mut sorted: Vec<&ModelResult> = results.into_iter().collect();
    sorted.sort_by_key(|r| r.model);

    for result in &sorted {
        for party in result.seats.keys() {
            let seats = result.seats_for(party);
            ranges
                .entry(party.clone())
                .and_modify(|r| {
                    if seats < r.min {
                        r.min = seats;
                        r.min_model = result.model;
                    }
                    if seats > r.max {
                        r.max = seats;
                        r.max_model = result.model;
                    }
                })
                .or_insert(SeatRange {
                    party: party.clone(),
                    min: seats,
                    max: seats,
                    min_model: result.model,
                    max_model: result.model,
                });
        }
    }

    ranges.into_values().collect()
}
