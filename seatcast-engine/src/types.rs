//! Core value types shared by every stage of the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};

/// Party identity as it appears in every table.
pub type PartyCode = String;

// ============================================================================
// Districts
// ============================================================================

/// A candidate standing in a single-member district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Party code
    pub party: PartyCode,
    /// Sitting member
    #[serde(default)]
    pub incumbent: bool,
    /// Estimated vote share, treated as a relative weight within the district
    pub predicted_vote_share: f64,
    /// Candidate-level engagement score
    #[serde(default)]
    pub engagement_score: f64,
    /// Candidate-level news mention count
    #[serde(default)]
    pub news_mentions: u64,
}

/// A single-member district electing exactly one seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    pub id: String,
    pub prefecture: String,
    pub block_id: String,
    pub candidates: Vec<Candidate>,
}

/// One row of the flat candidate/district input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub district_id: String,
    pub prefecture: String,
    pub block_id: String,
    #[serde(default)]
    pub candidate_name: Option<String>,
    pub party: PartyCode,
    #[serde(default)]
    pub incumbent: bool,
    pub predicted_vote_share: f64,
    #[serde(default)]
    pub engagement_score: f64,
    #[serde(default)]
    pub news_mentions: u64,
}

/// Group flat candidate rows into districts, keeping first-appearance order.
///
/// Rows of one district must agree on prefecture and block.
pub fn group_candidates(rows: &[CandidateRow]) -> Result<Vec<District>> {
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    let mut districts: Vec<District> = Vec::new();

    for row in rows {
        let candidate = Candidate {
            name: row.candidate_name.clone(),
            party: row.party.clone(),
            incumbent: row.incumbent,
            predicted_vote_share: row.predicted_vote_share,
            engagement_score: row.engagement_score,
            news_mentions: row.news_mentions,
        };

        match index.get(row.district_id.as_str()) {
            Some(&i) => {
                let district = &mut districts[i];
                if district.prefecture != row.prefecture || district.block_id != row.block_id {
                    return Err(EngineError::InvalidInput(format!(
                        "district {} has rows in both {}/{} and {}/{}",
                        row.district_id,
                        district.prefecture,
                        district.block_id,
                        row.prefecture,
                        row.block_id
                    )));
                }
                district.candidates.push(candidate);
            }
            None => {
                index.insert(row.district_id.as_str(), districts.len());
                districts.push(District {
                    id: row.district_id.clone(),
                    prefecture: row.prefecture.clone(),
                    block_id: row.block_id.clone(),
                    candidates: vec![candidate],
                });
            }
        }
    }

    Ok(districts)
}

// ============================================================================
// Proportional Blocks
// ============================================================================

/// A proportional block with a fixed seat count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProportionalBlock {
    pub id: String,
    pub seats: u32,
    /// Regional party support; empty means "use national shares"
    #[serde(default)]
    pub support: BTreeMap<PartyCode, f64>,
}

/// One row of the block table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRow {
    pub block_id: String,
    pub seats: u32,
}

/// One row of the optional block-level support table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSupportRow {
    pub block_id: String,
    pub party: PartyCode,
    pub support: f64,
}

// ============================================================================
// Signals
// ============================================================================

/// Source of a party-level signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// Normalized video engagement share
    Engagement,
    /// Net comment sentiment in [-1, 1]
    Sentiment,
    /// News coverage volume
    NewsCoverage,
    /// Mean article tone in [-1, 1]
    NewsTone,
    /// Polling support share
    Polling,
}

impl SignalSource {
    /// Net scores may be negative; share sources may not.
    pub const fn is_net_score(self) -> bool {
        matches!(self, Self::Sentiment | Self::NewsTone)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Engagement => "engagement",
            Self::Sentiment => "sentiment",
            Self::NewsCoverage => "news_coverage",
            Self::NewsTone => "news_tone",
            Self::Polling => "polling",
        }
    }
}

impl std::fmt::Display for SignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the party source-share table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartySignal {
    pub party: PartyCode,
    pub source: SignalSource,
    pub value: f64,
}

/// Party signals indexed by source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalTable {
    values: BTreeMap<SignalSource, BTreeMap<PartyCode, f64>>,
}

impl SignalTable {
    /// Build the table from rows, rejecting duplicates and out-of-range values.
    pub fn from_rows(rows: &[PartySignal]) -> Result<Self> {
        let mut values: BTreeMap<SignalSource, BTreeMap<PartyCode, f64>> = BTreeMap::new();

        for row in rows {
            if !row.value.is_finite() {
                return Err(EngineError::InvalidInput(format!(
                    "{} signal for {} is not finite",
                    row.source, row.party
                )));
            }
            if row.source.is_net_score() {
                if !(-1.0..=1.0).contains(&row.value) {
                    return Err(EngineError::InvalidInput(format!(
                        "{} signal for {} must be within [-1, 1], got {}",
                        row.source, row.party, row.value
                    )));
                }
            } else if row.value < 0.0 {
                return Err(EngineError::InvalidInput(format!(
                    "{} signal for {} must not be negative, got {}",
                    row.source, row.party, row.value
                )));
            }

            let by_party = values.entry(row.source).or_default();
            if by_party.insert(row.party.clone(), row.value).is_some() {
                return Err(EngineError::InvalidInput(format!(
                    "duplicate {} signal for {}",
                    row.source, row.party
                )));
            }
        }

        Ok(Self { values })
    }

    /// Values of one source, if any rows were given.
    pub fn source(&self, source: SignalSource) -> Option<&BTreeMap<PartyCode, f64>> {
        self.values.get(&source).filter(|m| !m.is_empty())
    }

    /// Whether the source carries at least one positive value.
    pub fn has_positive(&self, source: SignalSource) -> bool {
        self.source(source)
            .is_some_and(|m| m.values().any(|v| *v > 0.0))
    }

    /// Flatten back into rows (source order, then party order).
    pub fn rows(&self) -> Vec<PartySignal> {
        self.values
            .iter()
            .flat_map(|(source, by_party)| {
                by_party.iter().map(|(party, value)| PartySignal {
                    party: party.clone(),
                    source: *source,
                    value: *value,
                })
            })
            .collect()
    }
}

/// Party → non-negative weight. Normalized on construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceShare(BTreeMap<PartyCode, f64>);

impl SourceShare {
    /// Normalize non-negative weights to sum to 1. Returns `None` when nothing is positive.
    pub fn normalized(weights: BTreeMap<PartyCode, f64>) -> Option<Self> {
        let total: f64 = weights.values().filter(|v| **v > 0.0).sum();
        if !(total > 0.0 && total.is_finite()) {
            return None;
        }
        Some(Self(
            weights
                .into_iter()
                .map(|(party, v)| (party, v.max(0.0) / total))
                .collect(),
        ))
    }

    /// Share of a party (0 when absent).
    pub fn get(&self, party: &str) -> f64 {
        self.0.get(party).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PartyCode, &f64)> {
        self.0.iter()
    }

    pub fn parties(&self) -> impl Iterator<Item = &PartyCode> {
        self.0.keys()
    }

    pub fn as_map(&self) -> &BTreeMap<PartyCode, f64> {
        &self.0
    }
}

// ============================================================================
// Models and Results
// ============================================================================

/// The seven seat models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    PollingBaseline,
    Engagement,
    SentimentWeighted,
    PollingMomentum,
    VideoEnsemble,
    News,
    IntegratedEnsemble,
}

impl ModelId {
    pub const ALL: [ModelId; 7] = [
        Self::PollingBaseline,
        Self::Engagement,
        Self::SentimentWeighted,
        Self::PollingMomentum,
        Self::VideoEnsemble,
        Self::News,
        Self::IntegratedEnsemble,
    ];

    /// Numeric id 0-6.
    pub const fn index(self) -> u8 {
        match self {
            Self::PollingBaseline => 0,
            Self::Engagement => 1,
            Self::SentimentWeighted => 2,
            Self::PollingMomentum => 3,
            Self::VideoEnsemble => 4,
            Self::News => 5,
            Self::IntegratedEnsemble => 6,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PollingBaseline => "polling_baseline",
            Self::Engagement => "engagement",
            Self::SentimentWeighted => "sentiment_weighted",
            Self::PollingMomentum => "polling_momentum",
            Self::VideoEnsemble => "video_ensemble",
            Self::News => "news",
            Self::IntegratedEnsemble => "integrated_ensemble",
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "model {} ({})", self.index(), self.as_str())
    }
}

/// Seats per tier of the chamber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatTotals {
    pub district: u32,
    pub proportional: u32,
}

impl SeatTotals {
    pub const fn total(&self) -> u32 {
        self.district + self.proportional
    }
}

/// A party's seats split by tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatSplit {
    pub district: u32,
    pub proportional: u32,
}

impl SeatSplit {
    pub const fn total(&self) -> u32 {
        self.district + self.proportional
    }
}

/// One model's party → seat vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub model: ModelId,
    pub seats: BTreeMap<PartyCode, SeatSplit>,
}

impl ModelResult {
    /// Build a result from per-tier maps; parties missing from one tier get 0 there.
    pub fn from_tiers(
        model: ModelId,
        district: &BTreeMap<PartyCode, u32>,
        proportional: &BTreeMap<PartyCode, u32>,
    ) -> Self {
        let mut seats: BTreeMap<PartyCode, SeatSplit> = BTreeMap::new();
        for (party, n) in district {
            seats.entry(party.clone()).or_default().district += n;
        }
        for (party, n) in proportional {
            seats.entry(party.clone()).or_default().proportional += n;
        }
        Self { model, seats }
    }

    /// Make sure every listed party has a row, even with zero seats.
    pub fn with_parties<'a>(mut self, parties: impl IntoIterator<Item = &'a str>) -> Self {
        for party in parties {
            self.seats.entry(party.to_string()).or_default();
        }
        self
    }

    /// Total seats of one party (0 when absent).
    pub fn seats_for(&self, party: &str) -> u32 {
        self.seats.get(party).map_or(0, SeatSplit::total)
    }

    pub fn district_total(&self) -> u32 {
        self.seats.values().map(|s| s.district).sum()
    }

    pub fn proportional_total(&self) -> u32 {
        self.seats.values().map(|s| s.proportional).sum()
    }

    pub fn total_seats(&self) -> u32 {
        self.district_total() + self.proportional_total()
    }

    /// Tier totals actually held by this result.
    pub fn totals(&self) -> SeatTotals {
        SeatTotals {
            district: self.district_total(),
            proportional: self.proportional_total(),
        }
    }

    /// Check that every tier sums to its expected total. Never corrects.
    pub fn ensure_conserved(&self, expected: SeatTotals) -> Result<()> {
        let checks = [
            ("district", expected.district, self.district_total()),
            ("proportional", expected.proportional, self.proportional_total()),
            ("total", expected.total(), self.total_seats()),
        ];
        for (tier, expected, actual) in checks {
            if expected != actual {
                return Err(EngineError::SeatConservationViolation {
                    model: self.model,
                    tier,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(district: &str, block: &str, party: &str, share: f64) -> CandidateRow {
        CandidateRow {
            district_id: district.into(),
            prefecture: "東京都".into(),
            block_id: block.into(),
            candidate_name: None,
            party: party.into(),
            incumbent: false,
            predicted_vote_share: share,
            engagement_score: 0.0,
            news_mentions: 0,
        }
    }

    #[test]
    fn test_group_candidates_keeps_order() {
        let rows = vec![
            row("tokyo-2", "tokyo", "LDP", 0.4),
            row("tokyo-1", "tokyo", "CDP", 0.5),
            row("tokyo-2", "tokyo", "CDP", 0.3),
        ];
        let districts = group_candidates(&rows).unwrap();
        assert_eq!(districts.len(), 2);
        assert_eq!(districts[0].id, "tokyo-2");
        assert_eq!(districts[0].candidates.len(), 2);
        assert_eq!(districts[1].candidates[0].party, "CDP");
    }

    #[test]
    fn test_group_candidates_rejects_block_conflict() {
        let rows = vec![
            row("tokyo-1", "tokyo", "LDP", 0.4),
            row("tokyo-1", "minami_kanto", "CDP", 0.3),
        ];
        assert!(matches!(
            group_candidates(&rows),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_signal_table_validation() {
        let ok = SignalTable::from_rows(&[
            PartySignal { party: "LDP".into(), source: SignalSource::Sentiment, value: -0.4 },
            PartySignal { party: "LDP".into(), source: SignalSource::Polling, value: 0.4 },
        ])
        .unwrap();
        assert!(ok.has_positive(SignalSource::Polling));
        assert!(!ok.has_positive(SignalSource::Sentiment));
        assert!(ok.source(SignalSource::Engagement).is_none());
        assert_eq!(ok.rows().len(), 2);

        let negative_share = SignalTable::from_rows(&[PartySignal {
            party: "LDP".into(),
            source: SignalSource::Engagement,
            value: -0.1,
        }]);
        assert!(negative_share.is_err());

        let duplicate = SignalTable::from_rows(&[
            PartySignal { party: "LDP".into(), source: SignalSource::Polling, value: 0.1 },
            PartySignal { party: "LDP".into(), source: SignalSource::Polling, value: 0.2 },
        ]);
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_source_share_normalized() {
        let share = SourceShare::normalized(BTreeMap::from([
            ("A".to_string(), 3.0),
            ("B".to_string(), 1.0),
            ("C".to_string(), 0.0),
        ]))
        .unwrap();
        assert!((share.get("A") - 0.75).abs() < 1e-12);
        assert_eq!(share.get("C"), 0.0);
        assert_eq!(share.get("Z"), 0.0);

        assert!(SourceShare::normalized(BTreeMap::from([("A".to_string(), 0.0)])).is_none());
    }

    #[test]
    fn test_model_id_roundtrip() {
        for (i, id) in ModelId::ALL.iter().enumerate() {
            assert_eq!(usize::from(id.index()), i);
        }
        assert_eq!(ModelId::News.to_string(), "model 5 (news)");
    }

    #[test]
    fn test_ensure_conserved() {
        let result = ModelResult::from_tiers(
            ModelId::PollingBaseline,
            &BTreeMap::from([("A".to_string(), 2)]),
            &BTreeMap::from([("A".to_string(), 1), ("B".to_string(), 2)]),
        );
        assert_eq!(result.seats_for("A"), 3);
        result
            .ensure_conserved(SeatTotals { district: 2, proportional: 3 })
            .unwrap();

        let err = result
            .ensure_conserved(SeatTotals { district: 3, proportional: 3 })
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::SeatConservationViolation { tier: "district", expected: 3, actual: 2, .. }
        ));
    }
}
