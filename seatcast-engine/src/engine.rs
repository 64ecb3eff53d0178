//! Forecast engine entry point.
//!
//! Validates the input tables against the configuration, resolves the base
//! district pass, runs the model bank and assembles the output tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use seatcast_common::config::ForecastConfig;
use seatcast_common::logging::RunContext;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::analytics::{
    closest_races, coalition_totals, seat_deltas, seat_ranges, ClosestRace, CoalitionTotal,
    SeatDelta, SeatRange,
};
use crate::district::{band_summary, resolve_all, ConfidenceBand, DistrictCall, ResolverSettings};
use crate::error::{EngineError, Result, ResultExt};
use crate::models::{ModelBank, ModelContext};
use crate::signals::{SignalAggregates, SignalTableBuilder};
use crate::types::{
    group_candidates, BlockRow, BlockSupportRow, CandidateRow, District, ModelId, ModelResult,
    PartyCode, PartySignal, ProportionalBlock, SeatTotals, SignalTable,
};

// ============================================================================
// Inputs
// ============================================================================

/// The input tables of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastInputs {
    /// Candidate/district rows
    pub candidates: Vec<CandidateRow>,
    /// Party signal rows
    #[serde(default)]
    pub signals: Vec<PartySignal>,
    /// Raw aggregates turned into additional signal rows
    #[serde(default)]
    pub aggregates: Option<SignalAggregates>,
    /// Block table; the configured blocks are used when empty
    #[serde(default)]
    pub blocks: Vec<BlockRow>,
    /// Optional regional support per block
    #[serde(default)]
    pub block_support: Vec<BlockSupportRow>,
}

/// Validated inputs ready for the models.
#[derive(Debug, Clone)]
pub struct PreparedInputs {
    pub districts: Vec<District>,
    pub blocks: Vec<ProportionalBlock>,
    pub signals: SignalTable,
}

// ============================================================================
// Output Tables
// ============================================================================

/// Metadata of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub run_id: String,
    pub election: String,
    pub generated_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub total_seats: u32,
    pub majority_threshold: u32,
    pub supermajority_threshold: u32,
}

/// One (model, party) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSeatRow {
    pub model: ModelId,
    pub model_index: u8,
    pub party: PartyCode,
    pub party_name: Option<String>,
    pub district: u32,
    pub proportional: u32,
    pub total: u32,
}

/// One (model, coalition) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoalitionRow {
    pub model: ModelId,
    #[serde(flatten)]
    pub total: CoalitionTotal,
}

/// One (model, party) change against the polling baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatDeltaRow {
    pub model: ModelId,
    #[serde(flatten)]
    pub delta: SeatDelta,
}

/// A model that did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRow {
    pub model: ModelId,
    pub kind: String,
    pub error: String,
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastOutput {
    pub run: RunInfo,
    pub model_seats: Vec<ModelSeatRow>,
    pub district_calls: Vec<DistrictCall>,
    pub coalitions: Vec<CoalitionRow>,
    pub closest_races: Vec<ClosestRace>,
    pub confidence_bands: BTreeMap<ConfidenceBand, usize>,
    pub seat_ranges: Vec<SeatRange>,
    pub seat_deltas: Vec<SeatDeltaRow>,
    pub failures: Vec<FailureRow>,
    #[serde(skip)]
    pub results: BTreeMap<ModelId, ModelResult>,
}

impl ForecastOutput {
    pub fn result(&self, model: ModelId) -> Option<&ModelResult> {
        self.results.get(&model)
    }

    /// Coalition rows of one model.
    pub fn coalitions_for(&self, model: ModelId) -> impl Iterator<Item = &CoalitionTotal> {
        self.coalitions
            .iter()
            .filter(move |row| row.model == model)
            .map(|row| &row.total)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Runs forecasts against one immutable configuration.
pub struct ForecastEngine {
    config: ForecastConfig,
    resolver: ResolverSettings,
    bank: ModelBank,
}

impl ForecastEngine {
    /// Create an engine. The configuration must validate.
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| EngineError::InvalidInput(format!("invalid configuration: {e}")))?;
        Ok(Self {
            resolver: ResolverSettings::from(&config.district),
            bank: ModelBank::from_config(&config.models),
            config,
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    fn totals(&self) -> SeatTotals {
        SeatTotals {
            district: self.config.election.district_seats,
            proportional: self.config.election.proportional_seats,
        }
    }

    /// Check the input tables against the configuration and index them.
    pub fn prepare(&self, inputs: &ForecastInputs) -> Result<PreparedInputs> {
        let election = &self.config.election;

        let districts = group_candidates(&inputs.candidates)?;
        if districts.len() != election.district_seats as usize {
            return Err(EngineError::InvalidInput(format!(
                "{} districts in the candidate table, expected {}",
                districts.len(),
                election.district_seats
            )));
        }

        let mut blocks: Vec<ProportionalBlock> = if inputs.blocks.is_empty() {
            self.config
                .blocks
                .iter()
                .map(|b| ProportionalBlock { id: b.id.clone(), seats: b.seats, support: BTreeMap::new() })
                .collect()
        } else {
            inputs
                .blocks
                .iter()
                .map(|b| ProportionalBlock { id: b.block_id.clone(), seats: b.seats, support: BTreeMap::new() })
                .collect()
        };

        let mut ids = HashSet::new();
        if let Some(dup) = blocks.iter().find(|b| !ids.insert(b.id.as_str())) {
            return Err(EngineError::InvalidInput(format!("duplicate block id {}", dup.id)));
        }
        let block_sum: u32 = blocks.iter().map(|b| b.seats).sum();
        if block_sum != election.proportional_seats {
            return Err(EngineError::InvalidInput(format!(
                "block seats sum to {block_sum}, expected {}",
                election.proportional_seats
            )));
        }

        for row in &inputs.block_support {
            if !row.support.is_finite() || row.support < 0.0 {
                return Err(EngineError::InvalidInput(format!(
                    "support {} for {} in block {} is not a non-negative number",
                    row.support, row.party, row.block_id
                )));
            }
            let block = blocks
                .iter_mut()
                .find(|b| b.id == row.block_id)
                .ok_or_else(|| {
                    EngineError::InvalidInput(format!("support row for unknown block {}", row.block_id))
                })?;
            if block.support.insert(row.party.clone(), row.support).is_some() {
                return Err(EngineError::InvalidInput(format!(
                    "duplicate support row for {} in block {}",
                    row.party, row.block_id
                )));
            }
        }

        let block_ids: HashSet<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
        if let Some(d) = districts.iter().find(|d| !block_ids.contains(d.block_id.as_str())) {
            return Err(EngineError::InvalidInput(format!(
                "district {} belongs to unknown block {}",
                d.id, d.block_id
            )));
        }

        let mut builder = SignalTableBuilder::new().rows(inputs.signals.iter().cloned());
        if let Some(aggregates) = &inputs.aggregates {
            builder = builder.rows(aggregates.rows());
        }
        let signals = builder.build()?;

        let roster: HashSet<&str> = self.config.parties.iter().map(|p| p.code.as_str()).collect();
        let unknown: BTreeSet<&str> = districts
            .iter()
            .flat_map(|d| d.candidates.iter().map(|c| c.party.as_str()))
            .filter(|p| !roster.contains(p))
            .collect();
        if !unknown.is_empty() {
            tracing::warn!(parties = ?unknown, "Candidates from parties outside the roster");
        }

        Ok(PreparedInputs { districts, blocks, signals })
    }

    /// Run every model and build the output tables.
    pub fn run(&self, inputs: &ForecastInputs) -> Result<ForecastOutput> {
        let run_ctx = RunContext::new("engine");
        let span = run_ctx.span();
        let _guard = span.enter();
        tracing::info!(run_id = %run_ctx.run_id, election = %self.config.election.name, "Forecast run started");

        let prepared = self.prepare(inputs).context("validating inputs")?;
        let calls = {
            let stage = run_ctx.child("districts");
            let _stage = stage.span().entered();
            let calls = resolve_all(&prepared.districts, &self.resolver)?;
            tracing::debug!(districts = calls.len(), elapsed_ms = stage.elapsed_ms(), "Districts resolved");
            calls
        };

        let ctx = ModelContext::new(
            &prepared.districts,
            &prepared.blocks,
            &prepared.signals,
            self.config.parties.iter().map(|p| p.code.clone()).collect(),
            self.totals(),
            self.resolver,
        )
        .with_candidate_weight(self.config.models.candidate_signal_weight);
        let bank = {
            let stage = run_ctx.child("models");
            let _stage = stage.span().entered();
            self.bank.run(&ctx)
        };

        let total_seats = self.config.election.total_seats;
        let output = ForecastOutput {
            run: RunInfo {
                run_id: run_ctx.run_id.clone(),
                election: self.config.election.name.clone(),
                generated_at: Utc::now(),
                elapsed_ms: run_ctx.elapsed_ms(),
                total_seats,
                majority_threshold: self.config.majority_threshold(),
                supermajority_threshold: self.config.supermajority_threshold(),
            },
            model_seats: self.model_seat_rows(&bank.results),
            coalitions: bank
                .results
                .values()
                .flat_map(|r| {
                    coalition_totals(r, &self.config.coalitions, total_seats)
                        .into_iter()
                        .map(move |total| CoalitionRow { model: r.model, total })
                })
                .collect(),
            closest_races: closest_races(&calls, self.config.analytics.closest_race_count),
            confidence_bands: band_summary(&calls),
            seat_ranges: seat_ranges(bank.results.values()),
            seat_deltas: match bank.results.get(&ModelId::PollingBaseline) {
                Some(baseline) => bank
                    .results
                    .values()
                    .filter(|r| r.model != ModelId::PollingBaseline)
                    .flat_map(|r| {
                        seat_deltas(r, baseline)
                            .into_iter()
                            .map(move |delta| SeatDeltaRow { model: r.model, delta })
                    })
                    .collect(),
                None => Vec::new(),
            },
            failures: bank
                .failures
                .iter()
                .map(|(model, e)| FailureRow {
                    model: *model,
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                })
                .collect(),
            district_calls: calls,
            results: bank.results,
        };

        tracing::info!(
            run_id = %output.run.run_id,
            models = output.results.len(),
            failed = output.failures.len(),
            elapsed_ms = run_ctx.elapsed_ms(),
            "Forecast run finished"
        );
        Ok(output)
    }

    fn model_seat_rows(&self, results: &BTreeMap<ModelId, ModelResult>) -> Vec<ModelSeatRow> {
        results
            .values()
            .flat_map(|r| {
                r.seats.iter().map(move |(party, split)| ModelSeatRow {
                    model: r.model,
                    model_index: r.model.index(),
                    party: party.clone(),
                    party_name: self.config.party(party).map(|p| p.name.clone()),
                    district: split.district,
                    proportional: split.proportional,
                    total: split.total(),
                })
            })
            .collect()
    }
}
