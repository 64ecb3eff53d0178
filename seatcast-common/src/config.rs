//! Configuration management for the seatcast forecaster.
//!
//! The forecast configuration lives at `~/.seatcast/config.json`. It carries the
//! reference data the engine needs (party roster, proportional blocks, coalition
//! groupings) together with every model parameter, so one immutable value can be
//! handed to the engine entry point.
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values
//! 2. Environment variables (SEATCAST_* prefix)
//! 3. Default values (the 2026 House of Representatives election)
//!
//! # Environment Variable Mapping
//!
//! - `SEATCAST_LOG_LEVEL` → observability.log_level
//! - `SEATCAST_LOG_FORMAT` → observability.log_format
//! - `SEATCAST_CLOSEST_RACES` → analytics.closest_race_count

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".seatcast"),
        |dirs| dirs.home_dir().join(".seatcast"),
    )
}

// ============================================================================
// Election Shape
// ============================================================================

/// Seat totals for the chamber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Display name of the election
    #[serde(default = "default_election_name")]
    pub name: String,

    /// Total seats in the chamber
    #[serde(default = "default_total_seats")]
    pub total_seats: u32,

    /// Single-member district seats (one per district)
    #[serde(default = "default_district_seats")]
    pub district_seats: u32,

    /// Proportional representation seats (sum over all blocks)
    #[serde(default = "default_proportional_seats")]
    pub proportional_seats: u32,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            name: default_election_name(),
            total_seats: default_total_seats(),
            district_seats: default_district_seats(),
            proportional_seats: default_proportional_seats(),
        }
    }
}

fn default_election_name() -> String {
    "第51回衆議院議員総選挙".into()
}

fn default_total_seats() -> u32 {
    465
}

fn default_district_seats() -> u32 {
    289
}

fn default_proportional_seats() -> u32 {
    176
}

// ============================================================================
// Reference Data
// ============================================================================

/// A party in the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyConfig {
    /// Unique party code used in every input and output table
    pub code: String,
    /// Display name
    pub name: String,
    /// Display color (`#RRGGBB`)
    #[serde(default = "default_party_color")]
    pub color: String,
}

impl PartyConfig {
    fn new(code: &str, name: &str, color: &str) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            color: color.into(),
        }
    }
}

fn default_party_color() -> String {
    "#888888".into()
}

fn default_parties() -> Vec<PartyConfig> {
    vec![
        PartyConfig::new("LDP", "自由民主党", "#E3242B"),
        PartyConfig::new("ISHIN", "日本維新の会", "#3CB371"),
        PartyConfig::new("CDP", "立憲民主党", "#1E90FF"),
        PartyConfig::new("KOMEITO", "公明党", "#F39800"),
        PartyConfig::new("DPFP", "国民民主党", "#FF8C00"),
        PartyConfig::new("JCP", "日本共産党", "#DC143C"),
        PartyConfig::new("REIWA", "れいわ新選組", "#FF69B4"),
        PartyConfig::new("SANSEITO", "参政党", "#DAA520"),
        PartyConfig::new("MIRAI", "チームみらい", "#00B8D4"),
        PartyConfig::new("OTHER", "その他", "#888888"),
    ]
}

/// A proportional representation block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockConfig {
    /// Block identifier used in candidate and block tables
    pub id: String,
    /// Display name
    pub name: String,
    /// Fixed seat count
    pub seats: u32,
}

impl BlockConfig {
    fn new(id: &str, name: &str, seats: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            seats,
        }
    }
}

fn default_blocks() -> Vec<BlockConfig> {
    vec![
        BlockConfig::new("hokkaido", "北海道", 8),
        BlockConfig::new("tohoku", "東北", 12),
        BlockConfig::new("kita_kanto", "北関東", 19),
        BlockConfig::new("minami_kanto", "南関東", 23),
        BlockConfig::new("tokyo", "東京", 19),
        BlockConfig::new("hokuriku_shinetsu", "北陸信越", 10),
        BlockConfig::new("tokai", "東海", 21),
        BlockConfig::new("kinki", "近畿", 28),
        BlockConfig::new("chugoku", "中国", 10),
        BlockConfig::new("shikoku", "四国", 6),
        BlockConfig::new("kyushu", "九州", 20),
    ]
}

/// A named grouping of parties evaluated for majority control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoalitionConfig {
    /// Coalition display name
    pub name: String,
    /// Member party codes
    pub parties: Vec<String>,
}

impl CoalitionConfig {
    fn new(name: &str, parties: &[&str]) -> Self {
        Self {
            name: name.into(),
            parties: parties.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

fn default_coalitions() -> Vec<CoalitionConfig> {
    vec![
        CoalitionConfig::new("与党連合 (自民+維新)", &["LDP", "ISHIN"]),
        CoalitionConfig::new("中道改革連合 (立憲+公明)", &["CDP", "KOMEITO"]),
        CoalitionConfig::new("国民民主党", &["DPFP"]),
        CoalitionConfig::new("チームみらい", &["MIRAI"]),
        CoalitionConfig::new("その他野党 (共産+れいわ+参政)", &["JCP", "REIWA", "SANSEITO"]),
        CoalitionConfig::new("その他/無所属", &["OTHER"]),
    ]
}

// ============================================================================
// Model Parameters
// ============================================================================

/// Parameters for the seven seat models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Maximum relative adjustment applied by net comment sentiment (±30%)
    #[serde(default = "default_sentiment_weight")]
    pub sentiment_weight: f64,

    /// Polling + momentum blend
    #[serde(default)]
    pub momentum: MomentumConfig,

    /// Weights of the engagement, sentiment and momentum models in the video ensemble
    #[serde(default)]
    pub video_ensemble: EnsembleWeights,

    /// Weights of the video ensemble and news model in the integrated ensemble
    #[serde(default = "default_integrated_ensemble")]
    pub integrated_ensemble: EnsembleWeights,

    /// News model weights
    #[serde(default)]
    pub news: NewsWeights,

    /// Pull of a candidate's own engagement score or mention count on its
    /// district score, relative to the district mean (0 disables it)
    #[serde(default = "default_candidate_signal_weight")]
    pub candidate_signal_weight: f64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            sentiment_weight: default_sentiment_weight(),
            momentum: MomentumConfig::default(),
            video_ensemble: EnsembleWeights::default(),
            integrated_ensemble: default_integrated_ensemble(),
            news: NewsWeights::default(),
            candidate_signal_weight: default_candidate_signal_weight(),
        }
    }
}

fn default_sentiment_weight() -> f64 {
    0.3
}

fn default_candidate_signal_weight() -> f64 {
    0.2
}

/// Polling + momentum model parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumConfig {
    /// Weight on the plain polling share
    #[serde(default = "default_momentum_polling_weight")]
    pub polling_weight: f64,
    /// Weight on the momentum-shifted share
    #[serde(default = "default_momentum_signal_weight")]
    pub signal_weight: f64,
    /// Largest absolute share shift the momentum term may apply
    #[serde(default = "default_momentum_clamp")]
    pub clamp: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            polling_weight: default_momentum_polling_weight(),
            signal_weight: default_momentum_signal_weight(),
            clamp: default_momentum_clamp(),
        }
    }
}

fn default_momentum_polling_weight() -> f64 {
    0.70
}

fn default_momentum_signal_weight() -> f64 {
    0.30
}

fn default_momentum_clamp() -> f64 {
    0.15
}

/// Ordered member weights of an ensemble. Must be non-negative and sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights(pub Vec<f64>);

impl Default for EnsembleWeights {
    /// Video ensemble: engagement 0.20, sentiment 0.25, momentum 0.55.
    fn default() -> Self {
        Self(vec![0.20, 0.25, 0.55])
    }
}

impl EnsembleWeights {
    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

fn default_integrated_ensemble() -> EnsembleWeights {
    EnsembleWeights(vec![0.45, 0.55])
}

/// News model weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsWeights {
    /// Weight on max-normalized coverage volume
    #[serde(default = "default_news_coverage_weight")]
    pub coverage_weight: f64,
    /// Tone sensitivity (applied doubled, as a multiplicative factor)
    #[serde(default = "default_news_tone_weight")]
    pub tone_weight: f64,
    /// Weight on the polling prior
    #[serde(default = "default_news_polling_weight")]
    pub polling_weight: f64,
}

impl Default for NewsWeights {
    fn default() -> Self {
        Self {
            coverage_weight: default_news_coverage_weight(),
            tone_weight: default_news_tone_weight(),
            polling_weight: default_news_polling_weight(),
        }
    }
}

fn default_news_coverage_weight() -> f64 {
    0.30
}

fn default_news_tone_weight() -> f64 {
    0.15
}

fn default_news_polling_weight() -> f64 {
    0.55
}

/// District resolution parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistrictModelConfig {
    /// Softmax temperature turning vote shares into win probabilities
    #[serde(default = "default_softmax_temperature")]
    pub softmax_temperature: f64,

    /// Probability gap that maps to full confidence
    #[serde(default = "default_confidence_denominator")]
    pub confidence_denominator: f64,
}

impl Default for DistrictModelConfig {
    fn default() -> Self {
        Self {
            softmax_temperature: default_softmax_temperature(),
            confidence_denominator: default_confidence_denominator(),
        }
    }
}

fn default_softmax_temperature() -> f64 {
    0.35
}

fn default_confidence_denominator() -> f64 {
    0.20
}

/// Post-processing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// How many districts the closest-race ranking keeps
    #[serde(default = "default_closest_race_count")]
    pub closest_race_count: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            closest_race_count: default_closest_race_count(),
        }
    }
}

fn default_closest_race_count() -> usize {
    20
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets held at `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Immutable configuration handed to the forecast engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default)]
    pub election: ElectionConfig,

    #[serde(default = "default_parties")]
    pub parties: Vec<PartyConfig>,

    #[serde(default = "default_blocks")]
    pub blocks: Vec<BlockConfig>,

    #[serde(default = "default_coalitions")]
    pub coalitions: Vec<CoalitionConfig>,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub district: DistrictModelConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            election: ElectionConfig::default(),
            parties: default_parties(),
            blocks: default_blocks(),
            coalitions: default_coalitions(),
            models: ModelsConfig::default(),
            district: DistrictModelConfig::default(),
            analytics: AnalyticsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ForecastConfig {
    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("SEATCAST_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("SEATCAST_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(count) = std::env::var("SEATCAST_CLOSEST_RACES") {
            if let Ok(n) = count.parse() {
                self.analytics.closest_race_count = n;
            }
        }
    }

    /// Look up a party by code.
    pub fn party(&self, code: &str) -> Option<&PartyConfig> {
        self.parties.iter().find(|p| p.code == code)
    }

    /// Seats needed for a strict majority (233 of 465).
    pub fn majority_threshold(&self) -> u32 {
        self.election.total_seats / 2 + 1
    }

    /// Seats needed for a two-thirds supermajority (310 of 465).
    pub fn supermajority_threshold(&self) -> u32 {
        (2 * self.election.total_seats).div_ceil(3)
    }
}
