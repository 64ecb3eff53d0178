//! Share-space helpers shared by the base models.

use std::collections::BTreeMap;

use super::CandidateSignal;
use crate::error::{EngineError, Result};
use crate::types::{District, ModelId, PartyCode, SourceShare};

/// Rescale a partial source table onto the polling mass of the parties it covers.
///
/// Parties absent from `source` keep their polling share. Covered parties split
/// their combined polling mass in proportion to their source values. If the
/// covered parties carry no polling mass at all the raw source values are used.
pub(crate) fn coverage_shares(
    model: ModelId,
    signal: &str,
    source: &BTreeMap<PartyCode, f64>,
    polling: &SourceShare,
) -> Result<SourceShare> {
    let source_total: f64 = source.values().filter(|v| **v > 0.0).sum();
    if source_total <= 0.0 {
        return Err(missing(model, signal));
    }

    let covered_mass: f64 = source.keys().map(|p| polling.get(p)).sum();
    let scale = if covered_mass > 0.0 { covered_mass } else { 1.0 };

    let mut weights: BTreeMap<PartyCode, f64> = polling
        .iter()
        .filter(|(p, _)| !source.contains_key(*p))
        .map(|(p, v)| (p.clone(), *v))
        .collect();
    for (party, value) in source {
        weights.insert(party.clone(), value.max(0.0) / source_total * scale);
    }

    SourceShare::normalized(weights).ok_or_else(|| missing(model, signal))
}

/// Per-party swing of a model share against the polling reference.
///
/// Parties without a positive polling share swing by 1.
pub(crate) fn swing(shares: &SourceShare, polling: &SourceShare, party: &str) -> f64 {
    let base = polling.get(party);
    if base > 0.0 {
        shares.get(party) / base
    } else {
        1.0
    }
}

/// Per-candidate multipliers `1 - w + w * x / mean(x)` over one district.
///
/// Negative or non-finite values count as zero. When every candidate scores
/// zero, or the signal is ignored, every multiplier is 1.
pub(crate) fn candidate_tilt(district: &District, signal: CandidateSignal, weight: f64) -> Vec<f64> {
    let n = district.candidates.len();
    if signal == CandidateSignal::Ignored || weight <= 0.0 || n == 0 {
        return vec![1.0; n];
    }

    let values: Vec<f64> = district
        .candidates
        .iter()
        .map(|c| signal.value(c))
        .map(|v| if v.is_finite() && v > 0.0 { v } else { 0.0 })
        .collect();
    let mean = values.iter().sum::<f64>() / n as f64;
    if mean <= 0.0 {
        return vec![1.0; n];
    }

    values.iter().map(|v| 1.0 - weight + weight * v / mean).collect()
}

/// Floor weights at zero and normalize; `None` when nothing positive remains.
pub(crate) fn floored(weights: BTreeMap<PartyCode, f64>) -> Option<SourceShare> {
    SourceShare::normalized(weights.into_iter().map(|(p, v)| (p, v.max(0.0))).collect())
}

pub(crate) fn missing(model: ModelId, signal: &str) -> EngineError {
    EngineError::MissingSignal {
        model,
        signal: signal.to_string(),
    }
}
