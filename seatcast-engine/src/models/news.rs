//! Model 5: news coverage and tone over a polling prior.

use seatcast_common::config::NewsWeights;
use std::collections::BTreeMap;

use super::shares::{floored, missing};
use super::{CandidateSignal, ModelContext, SeatModel};
use crate::error::Result;
use crate::types::{ModelId, PartyCode, SignalSource, SourceShare};

#[derive(Debug, Clone)]
pub struct NewsModel {
    pub weights: NewsWeights,
}

impl NewsModel {
    pub fn new(weights: NewsWeights) -> Self {
        Self { weights }
    }
}

impl SeatModel for NewsModel {
    fn id(&self) -> ModelId {
        ModelId::News
    }

    fn candidate_signal(&self) -> CandidateSignal {
        CandidateSignal::NewsMentions
    }

    fn party_shares(&self, ctx: &ModelContext<'_>) -> Result<SourceShare> {
        let model = self.id();
        let polling = ctx.polling(model)?;
        let coverage = ctx.share_source(model, SignalSource::NewsCoverage)?;
        let tone = ctx.signals.source(SignalSource::NewsTone);

        let max_coverage = coverage.values().copied().fold(0.0, f64::max);
        let w = &self.weights;

        let combined: BTreeMap<PartyCode, f64> = polling
            .parties()
            .chain(coverage.keys())
            .map(|party| {
                let volume = coverage.get(party).copied().unwrap_or(0.0) / max_coverage;
                let t = tone.and_then(|m| m.get(party)).copied().unwrap_or(0.0);
                let prior = w.polling_weight * polling.get(party) + w.coverage_weight * volume;
                (party.clone(), prior * (1.0 + t * w.tone_weight * 2.0))
            })
            .collect();

        floored(combined).ok_or_else(|| missing(model, SignalSource::NewsCoverage.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::build_from_shares;
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_news_shares() {
        let (districts, blocks) = fixture();
        let signals = full_signals();
        let ctx = context(&districts, &blocks, &signals);
        let shares = NewsModel::new(NewsWeights::default()).party_shares(&ctx).unwrap();

        // A: (.55*.4 + .30*1.0) * (1 - .2*.15*2) = .52 * .94 = .4888
        // B: .55*.4 + .30*.5 = .37
        // C: .55*.2 = .11
        let total = 0.4888 + 0.37 + 0.11;
        assert!((shares.get("A") - 0.4888 / total).abs() < 1e-9);
        assert!((shares.get("B") - 0.37 / total).abs() < 1e-9);
        assert!((shares.get("C") - 0.11 / total).abs() < 1e-9);
    }

    #[test]
    fn test_news_mentions_tilt_district() {
        let (mut districts, blocks) = fixture();
        let signals = full_signals();
        let model = NewsModel::new(NewsWeights::default());

        let ctx = context(&districts, &blocks, &signals);
        let shares = model.party_shares(&ctx).unwrap();
        let before = build_from_shares(ModelId::News, model.candidate_signal(), &ctx, &shares).unwrap();
        assert_eq!(before.calls[1].winner, "A");

        districts[1].candidates[0].news_mentions = 1;
        districts[1].candidates[1].news_mentions = 9;
        let ctx = context(&districts, &blocks, &signals).with_candidate_weight(1.0);
        let after = build_from_shares(ModelId::News, model.candidate_signal(), &ctx, &shares).unwrap();
        assert_eq!(after.calls[1].winner, "B");
        assert_eq!(after.result.district_total(), 4);
    }

    #[test]
    fn test_news_without_tone_rows() {
        let (districts, blocks) = fixture();
        let signals = signals(&[
            ("A", SignalSource::Polling, 0.5),
            ("B", SignalSource::Polling, 0.5),
            ("A", SignalSource::NewsCoverage, 10.0),
            ("B", SignalSource::NewsCoverage, 10.0),
        ]);
        let ctx = context(&districts, &blocks, &signals);
        let shares = NewsModel::new(NewsWeights::default()).party_shares(&ctx).unwrap();
        assert!((shares.get("A") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_news_requires_coverage() {
        let (districts, blocks) = fixture();
        let signals = signals(&[("A", SignalSource::Polling, 1.0)]);
        let ctx = context(&districts, &blocks, &signals);
        let err = NewsModel::new(NewsWeights::default()).compute(&ctx).unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingSignal { model: ModelId::News, ref signal } if signal == "news_coverage"
        ));
    }
}
