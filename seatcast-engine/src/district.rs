//! District resolver.
//!
//! Calls the winner of each single-member district from candidate vote-share
//! estimates, measures the margin between the top two and turns the shares into
//! win probabilities with a temperature softmax.
//!
//! # Ordering
//!
//! ```text
//! share desc ──▶ party code asc ──▶ candidate position asc
//! ```
//!
//! Exact ties never depend on input order beyond the final position key, so a
//! district resolves identically on every run.

use serde::{Deserialize, Serialize};
use seatcast_common::config::DistrictModelConfig;
use std::collections::BTreeMap;

use crate::error::{EngineError, Result, ResultExt};
use crate::types::{District, PartyCode};

/// Resolver parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverSettings {
    /// Softmax temperature for win probabilities
    pub softmax_temperature: f64,
    /// Probability gap that maps to confidence 1.0
    pub confidence_denominator: f64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from(&DistrictModelConfig::default())
    }
}

impl From<&DistrictModelConfig> for ResolverSettings {
    fn from(config: &DistrictModelConfig) -> Self {
        Self {
            softmax_temperature: config.softmax_temperature,
            confidence_denominator: config.confidence_denominator,
        }
    }
}

/// How safe a district call is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    /// confidence ≥ 0.8
    Safe,
    /// confidence ≥ 0.5
    Leaning,
    /// confidence ≥ 0.3
    Slight,
    /// anything closer
    Tossup,
}

impl ConfidenceBand {
    pub const ALL: [ConfidenceBand; 4] = [Self::Safe, Self::Leaning, Self::Slight, Self::Tossup];

    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.8 {
            Self::Safe
        } else if confidence >= 0.5 {
            Self::Leaning
        } else if confidence >= 0.3 {
            Self::Slight
        } else {
            Self::Tossup
        }
    }
}

impl std::fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "安全圏"),
            Self::Leaning => write!(f, "優勢"),
            Self::Slight => write!(f, "やや優勢"),
            Self::Tossup => write!(f, "接戦"),
        }
    }
}

/// Resolved outcome of one district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictCall {
    pub district_id: String,
    pub prefecture: String,
    pub block_id: String,
    /// Winning party
    pub winner: PartyCode,
    /// Winning candidate's name, when known
    pub winner_name: Option<String>,
    /// Whether the winner holds the seat already
    pub winner_incumbent: bool,
    /// Second-placed party (none when uncontested)
    pub runner_up: Option<PartyCode>,
    /// Normalized share gap between the top two (share of the winner when uncontested)
    pub margin: f64,
    /// Softmax win probability of the winner
    pub win_probability: f64,
    /// Probability gap scaled into [0, 1]
    pub confidence: f64,
    pub band: ConfidenceBand,
    /// False for a single-candidate district
    pub contested: bool,
}

/// Resolve a district from the candidates' predicted vote shares.
pub fn resolve_district(district: &District, settings: &ResolverSettings) -> Result<DistrictCall> {
    let scores: Vec<f64> = district
        .candidates
        .iter()
        .map(|c| c.predicted_vote_share)
        .collect();
    resolve_scored(district, &scores, settings)
}

/// Resolve a district with per-candidate scores supplied by the caller.
///
/// `scores` is indexed like `district.candidates`.
pub(crate) fn resolve_scored(
    district: &District,
    scores: &[f64],
    settings: &ResolverSettings,
) -> Result<DistrictCall> {
    let malformed = |reason: String| EngineError::MalformedDistrict {
        district_id: district.id.clone(),
        reason,
    };

    if district.candidates.is_empty() {
        return Err(malformed("no candidates".into()));
    }
    if scores.len() != district.candidates.len() {
        return Err(malformed(format!(
            "{} scores for {} candidates",
            scores.len(),
            district.candidates.len()
        )));
    }
    if let Some((i, s)) = scores
        .iter()
        .enumerate()
        .find(|(_, s)| !s.is_finite() || **s < 0.0)
    {
        return Err(malformed(format!(
            "candidate {} ({}) has invalid share {}",
            i, district.candidates[i].party, s
        )));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .total_cmp(&scores[a])
            .then_with(|| district.candidates[a].party.cmp(&district.candidates[b].party))
            .then_with(|| a.cmp(&b))
    });

    let total: f64 = scores.iter().sum();
    let n = scores.len();
    let shares: Vec<f64> = if total > 0.0 {
        scores.iter().map(|s| s / total).collect()
    } else {
        vec![1.0 / n as f64; n]
    };
    let probs = softmax(&shares, settings.softmax_temperature);

    let first = order[0];
    let second = order.get(1).copied();
    let winner = &district.candidates[first];

    let (margin, gap) = match second {
        Some(j) => (shares[first] - shares[j], probs[first] - probs[j]),
        None => (shares[first], probs[first]),
    };
    let confidence = (gap / settings.confidence_denominator).clamp(0.0, 1.0);

    Ok(DistrictCall {
        district_id: district.id.clone(),
        prefecture: district.prefecture.clone(),
        block_id: district.block_id.clone(),
        winner: winner.party.clone(),
        winner_name: winner.name.clone(),
        winner_incumbent: winner.incumbent,
        runner_up: second.map(|j| district.candidates[j].party.clone()),
        margin,
        win_probability: probs[first],
        confidence,
        band: ConfidenceBand::from_confidence(confidence),
        contested: second.is_some(),
    })
}

/// Softmax with max subtraction for numerical stability.
fn softmax(values: &[f64], temperature: f64) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values
        .iter()
        .map(|v| ((v - max) / temperature).exp())
        .collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Resolve every district, failing on the first malformed one.
pub fn resolve_all(districts: &[District], settings: &ResolverSettings) -> Result<Vec<DistrictCall>> {
    districts
        .iter()
        .map(|d| resolve_district(d, settings).context(format!("resolving district {}", d.id)))
        .collect()
}

/// Count calls per confidence band. Every band is present.
pub fn band_summary(calls: &[DistrictCall]) -> BTreeMap<ConfidenceBand, usize> {
    let mut summary: BTreeMap<ConfidenceBand, usize> =
        ConfidenceBand::ALL.iter().map(|b| (*b, 0)).collect();
    for call in calls {
        *summary.entry(call.band).or_default() += 1;
    }
    summary
}

/// District seats won per party.
pub fn district_seats(calls: &[DistrictCall]) -> BTreeMap<PartyCode, u32> {
    let mut seats: BTreeMap<PartyCode, u32> = BTreeMap::new();
    for call in calls {
        *seats.entry(call.winner.clone()).or_default() += 1;
    }
    seats
}
