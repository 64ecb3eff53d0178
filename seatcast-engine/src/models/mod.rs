//! Model bank.
//!
//! Seven seat models share one mechanism. Each base model produces a national
//! party share vector; its swing against polling rescales candidate shares in
//! every district and party support in every block, which then go through the
//! district resolver and D'Hondt. The two ensembles combine finished seat
//! vectors.
//!
//! Models driven by engagement or news also read the matching candidate-level
//! value, which tilts each candidate's score against its district mean.
//!
//! ```text
//!   polling ─┬─▶ [0] baseline ───────────────────────────────┐
//!            ├─▶ [1] engagement ─┐                           │
//!            ├─▶ [2] sentiment ──┼─▶ [4] video ensemble ─┐   │
//!            ├─▶ [3] momentum ───┘                       ├─▶ [6] integrated
//!            └─▶ [5] news ───────────────────────────────┘
//! ```

mod baseline;
mod news;
pub(crate) mod shares;
mod video;

pub use baseline::PollingBaseline;
pub use news::NewsModel;
pub use video::{EngagementModel, MomentumModel, SentimentModel};

use rayon::prelude::*;
use seatcast_common::config::{EnsembleWeights, ModelsConfig};
use std::collections::BTreeMap;

use crate::apportionment::apportion_blocks;
use crate::district::{district_seats, resolve_scored, DistrictCall, ResolverSettings};
use crate::ensemble::combine;
use crate::error::{EngineError, Result, ResultExt};
use crate::types::{
    Candidate, District, ModelId, ModelResult, PartyCode, ProportionalBlock, SeatTotals, SignalSource,
    SignalTable, SourceShare,
};

// ============================================================================
// Context
// ============================================================================

/// Read-only inputs shared by every model of one run.
#[derive(Debug, Clone)]
pub struct ModelContext<'a> {
    pub districts: &'a [District],
    pub blocks: &'a [ProportionalBlock],
    pub signals: &'a SignalTable,
    /// Roster party codes; every result lists them
    pub parties: Vec<PartyCode>,
    pub totals: SeatTotals,
    pub resolver: ResolverSettings,
    /// Pull of candidate-level signals on district scores, in [0, 1]
    pub candidate_weight: f64,
    polling: Option<SourceShare>,
}

impl<'a> ModelContext<'a> {
    pub fn new(
        districts: &'a [District],
        blocks: &'a [ProportionalBlock],
        signals: &'a SignalTable,
        parties: Vec<PartyCode>,
        totals: SeatTotals,
        resolver: ResolverSettings,
    ) -> Self {
        let polling = signals
            .source(SignalSource::Polling)
            .and_then(|m| SourceShare::normalized(m.clone()));
        Self {
            districts,
            blocks,
            signals,
            parties,
            totals,
            resolver,
            candidate_weight: ModelsConfig::default().candidate_signal_weight,
            polling,
        }
    }

    pub fn with_candidate_weight(mut self, weight: f64) -> Self {
        self.candidate_weight = weight;
        self
    }

    /// National polling shares, the reference every swing is measured against.
    pub fn polling(&self, model: ModelId) -> Result<&SourceShare> {
        self.polling
            .as_ref()
            .ok_or_else(|| shares::missing(model, SignalSource::Polling.as_str()))
    }

    /// A share source with at least one positive value.
    pub fn share_source(
        &self,
        model: ModelId,
        source: SignalSource,
    ) -> Result<&'a BTreeMap<PartyCode, f64>> {
        match self.signals.source(source) {
            Some(values) if self.signals.has_positive(source) => Ok(values),
            _ => Err(shares::missing(model, source.as_str())),
        }
    }

    /// A net-score source with at least one row.
    pub fn net_source(&self, model: ModelId, source: SignalSource) -> Result<&'a BTreeMap<PartyCode, f64>> {
        self.signals
            .source(source)
            .ok_or_else(|| shares::missing(model, source.as_str()))
    }
}

// ============================================================================
// Model Trait
// ============================================================================

/// Candidate-level value a model reads inside each district.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSignal {
    Ignored,
    Engagement,
    NewsMentions,
}

impl CandidateSignal {
    pub fn value(self, candidate: &Candidate) -> f64 {
        match self {
            Self::Ignored => 0.0,
            Self::Engagement => candidate.engagement_score,
            Self::NewsMentions => candidate.news_mentions as f64,
        }
    }
}

/// A seat model driven by one national share vector.
pub trait SeatModel: Send + Sync {
    fn id(&self) -> ModelId;

    /// National party shares under this model.
    fn party_shares(&self, ctx: &ModelContext<'_>) -> Result<SourceShare>;

    fn candidate_signal(&self) -> CandidateSignal {
        CandidateSignal::Ignored
    }

    /// Seat vector under this model.
    fn compute(&self, ctx: &ModelContext<'_>) -> Result<ModelResult> {
        let shares = self.party_shares(ctx)?;
        build_from_shares(self.id(), self.candidate_signal(), ctx, &shares)
            .map(|outcome| outcome.result)
    }
}

/// Seats plus the district calls they were built from.
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    pub result: ModelResult,
    pub calls: Vec<DistrictCall>,
}

/// Turn a national share vector into district calls and block seats.
///
/// A candidate scores `predicted_vote_share × swing × tilt`, where the tilt
/// comes from `signal` and `ctx.candidate_weight`.
pub fn build_from_shares(
    model: ModelId,
    signal: CandidateSignal,
    ctx: &ModelContext<'_>,
    shares: &SourceShare,
) -> Result<ModelOutcome> {
    let polling = ctx.polling(model)?;
    let swing = |party: &str| shares::swing(shares, polling, party);

    let calls = ctx
        .districts
        .iter()
        .map(|d| {
            let tilt = shares::candidate_tilt(d, signal, ctx.candidate_weight);
            let scores: Vec<f64> = d
                .candidates
                .iter()
                .zip(tilt)
                .map(|(c, t)| c.predicted_vote_share * swing(&c.party) * t)
                .collect();
            resolve_scored(d, &scores, &ctx.resolver)
        })
        .collect::<Result<Vec<_>>>()
        .context(model.to_string())?;

    let blocks = apportion_blocks(ctx.blocks, |block| {
        if block.support.is_empty() {
            Ok(shares.as_map().clone())
        } else {
            Ok(block
                .support
                .iter()
                .map(|(party, v)| (party.clone(), v * swing(party)))
                .collect())
        }
    })
    .context(model.to_string())?;

    let result = ModelResult::from_tiers(model, &district_seats(&calls), &blocks.totals)
        .with_parties(ctx.parties.iter().map(String::as_str));
    result.ensure_conserved(ctx.totals)?;
    Ok(ModelOutcome { result, calls })
}

// ============================================================================
// Ensembles
// ============================================================================

/// A weighted combination of finished model results.
#[derive(Debug, Clone)]
pub struct EnsembleModel {
    pub id: ModelId,
    pub members: Vec<ModelId>,
    pub weights: EnsembleWeights,
}

impl EnsembleModel {
    /// Combine the member results. A member absent from `results` is a missing signal.
    pub fn compute(&self, results: &BTreeMap<ModelId, ModelResult>) -> Result<ModelResult> {
        let members = self
            .members
            .iter()
            .map(|m| {
                results.get(m).ok_or_else(|| EngineError::MissingSignal {
                    model: self.id,
                    signal: m.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        combine(self.id, &members, self.weights.as_slice())
    }
}

// ============================================================================
// Bank
// ============================================================================

/// Results of one bank run. Failures never abort the other models.
#[derive(Debug, Default)]
pub struct BankRun {
    pub results: BTreeMap<ModelId, ModelResult>,
    pub failures: BTreeMap<ModelId, EngineError>,
}

/// The five base models and the two ensembles.
pub struct ModelBank {
    base: Vec<Box<dyn SeatModel>>,
    ensembles: Vec<EnsembleModel>,
}

impl ModelBank {
    pub fn from_config(config: &ModelsConfig) -> Self {
        let base: Vec<Box<dyn SeatModel>> = vec![
            Box::new(PollingBaseline),
            Box::new(EngagementModel),
            Box::new(SentimentModel::new(config.sentiment_weight)),
            Box::new(MomentumModel::new(config.momentum.clone())),
            Box::new(NewsModel::new(config.news.clone())),
        ];
        let ensembles = vec![
            EnsembleModel {
                id: ModelId::VideoEnsemble,
                members: vec![
                    ModelId::Engagement,
                    ModelId::SentimentWeighted,
                    ModelId::PollingMomentum,
                ],
                weights: config.video_ensemble.clone(),
            },
            EnsembleModel {
                id: ModelId::IntegratedEnsemble,
                members: vec![ModelId::VideoEnsemble, ModelId::News],
                weights: config.integrated_ensemble.clone(),
            },
        ];
        Self { base, ensembles }
    }

    /// Run base models in parallel, then the ensembles in dependency order.
    pub fn run(&self, ctx: &ModelContext<'_>) -> BankRun {
        let computed: Vec<(ModelId, Result<ModelResult>)> = self
            .base
            .par_iter()
            .map(|model| (model.id(), model.compute(ctx)))
            .collect();

        let mut run = BankRun::default();
        for (id, outcome) in computed {
            run.record(id, outcome);
        }
        for ensemble in &self.ensembles {
            let outcome = ensemble.compute(&run.results);
            run.record(ensemble.id, outcome);
        }
        run
    }
}

impl BankRun {
    fn record(&mut self, id: ModelId, outcome: Result<ModelResult>) {
        match outcome {
            Ok(result) => {
                tracing::info!(
                    model = %id,
                    district = result.district_total(),
                    proportional = result.proportional_total(),
                    "Model computed"
                );
                self.results.insert(id, result);
            }
            Err(e) => {
                tracing::warn!(model = %id, error = %e, "Model failed");
                self.failures.insert(id, e);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_bank_runs_all_seven_models() {
        let (districts, blocks) = fixture();
        let signals = full_signals();
        let ctx = context(&districts, &blocks, &signals);

        let run = ModelBank::from_config(&ModelsConfig::default()).run(&ctx);
        assert!(run.failures.is_empty(), "{:?}", run.failures);
        assert_eq!(run.results.len(), 7);
        for (id, result) in &run.results {
            assert_eq!(result.model, *id);
            assert_eq!(result.district_total(), 4);
            assert_eq!(result.proportional_total(), 5);
            assert_eq!(result.seats.len(), 3);
        }
    }

    #[test]
    fn test_missing_sentiment_fails_only_dependents() {
        let (districts, blocks) = fixture();
        let signals = signals(&[
            ("A", SignalSource::Polling, 0.5),
            ("B", SignalSource::Polling, 0.5),
            ("A", SignalSource::Engagement, 0.7),
            ("B", SignalSource::Engagement, 0.3),
        ]);
        let ctx = context(&districts, &blocks, &signals);
        let run = ModelBank::from_config(&ModelsConfig::default()).run(&ctx);

        assert!(run.results.contains_key(&ModelId::PollingBaseline));
        assert!(run.results.contains_key(&ModelId::Engagement));
        assert!(run.results.contains_key(&ModelId::PollingMomentum));
        assert!(matches!(
            &run.failures[&ModelId::SentimentWeighted],
            EngineError::MissingSignal { signal, .. } if signal == "sentiment"
        ));
        assert!(matches!(
            &run.failures[&ModelId::VideoEnsemble],
            EngineError::MissingSignal { signal, .. } if signal == "model 2 (sentiment_weighted)"
        ));
        assert!(run.failures.contains_key(&ModelId::News));
        assert!(run.failures.contains_key(&ModelId::IntegratedEnsemble));
    }

    #[test]
    fn test_all_zero_engagement_is_missing() {
        let (districts, blocks) = fixture();
        let signals = signals(&[
            ("A", SignalSource::Polling, 0.5),
            ("B", SignalSource::Polling, 0.5),
            ("A", SignalSource::Engagement, 0.0),
            ("B", SignalSource::Engagement, 0.0),
        ]);
        let ctx = context(&districts, &blocks, &signals);
        let err = ctx.share_source(ModelId::Engagement, SignalSource::Engagement).unwrap_err();
        assert!(matches!(err, EngineError::MissingSignal { ref signal, .. } if signal == "engagement"));
        assert!(ctx.share_source(ModelId::PollingBaseline, SignalSource::Polling).is_ok());
    }

    #[test]
    fn test_no_polling_fails_everything() {
        let (districts, blocks) = fixture();
        let signals = signals(&[("A", SignalSource::Engagement, 1.0)]);
        let ctx = context(&districts, &blocks, &signals);
        let run = ModelBank::from_config(&ModelsConfig::default()).run(&ctx);
        assert!(run.results.is_empty());
        assert_eq!(run.failures.len(), 7);
        assert_eq!(run.failures[&ModelId::PollingBaseline].kind(), "missing_signal");
    }

    #[test]
    fn test_bank_is_deterministic() {
        let (districts, blocks) = fixture();
        let signals = full_signals();
        let ctx = context(&districts, &blocks, &signals);
        let bank = ModelBank::from_config(&ModelsConfig::default());
        let first = bank.run(&ctx);
        let second = bank.run(&ctx);
        assert_eq!(first.results, second.results);
    }

    #[test]
    fn test_block_without_support_uses_model_shares() {
        let (districts, blocks) = fixture();
        let signals = full_signals();
        let ctx = context(&districts, &blocks, &signals);
        let shares = EngagementModel.party_shares(&ctx).unwrap();
        let outcome = build_from_shares(ModelId::Engagement, CandidateSignal::Engagement, &ctx, &shares).unwrap();
        assert_eq!(outcome.calls.len(), 4);
        // north block: engagement shares A .2, B .5, C .3 over 3 seats → B, C, B
        let north = crate::apportionment::dhondt("north", 3, shares.as_map()).unwrap();
        assert_eq!(north["B"], 2);
        assert_eq!(north["C"], 1);
    }
}
