//! Models 1-3: video engagement, sentiment-weighted engagement and polling momentum.

use seatcast_common::config::MomentumConfig;
use std::collections::BTreeMap;

use super::shares::{coverage_shares, floored, missing};
use super::{CandidateSignal, ModelContext, SeatModel};
use crate::error::Result;
use crate::types::{ModelId, PartyCode, SignalSource, SourceShare};

/// Model 1: shares from normalized video engagement.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementModel;

impl SeatModel for EngagementModel {
    fn id(&self) -> ModelId {
        ModelId::Engagement
    }

    fn candidate_signal(&self) -> CandidateSignal {
        CandidateSignal::Engagement
    }

    fn party_shares(&self, ctx: &ModelContext<'_>) -> Result<SourceShare> {
        engagement_shares(self.id(), ctx)
    }
}

fn engagement_shares(model: ModelId, ctx: &ModelContext<'_>) -> Result<SourceShare> {
    let polling = ctx.polling(model)?;
    let engagement = ctx.share_source(model, SignalSource::Engagement)?;
    coverage_shares(model, SignalSource::Engagement.as_str(), engagement, polling)
}

/// Model 2: engagement scaled by net comment sentiment.
#[derive(Debug, Clone, Copy)]
pub struct SentimentModel {
    /// Largest relative adjustment at sentiment ±1
    pub weight: f64,
}

impl SentimentModel {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }

    /// Multiplier for a net sentiment score, never negative.
    pub fn factor(&self, sentiment: f64) -> f64 {
        (1.0 + sentiment * self.weight).max(0.0)
    }
}

impl SeatModel for SentimentModel {
    fn id(&self) -> ModelId {
        ModelId::SentimentWeighted
    }

    fn candidate_signal(&self) -> CandidateSignal {
        CandidateSignal::Engagement
    }

    fn party_shares(&self, ctx: &ModelContext<'_>) -> Result<SourceShare> {
        let model = self.id();
        let polling = ctx.polling(model)?;
        let engagement = ctx.share_source(model, SignalSource::Engagement)?;
        let sentiment = ctx.net_source(model, SignalSource::Sentiment)?;

        let adjusted: BTreeMap<PartyCode, f64> = engagement
            .iter()
            .map(|(party, e)| {
                let s = sentiment.get(party).copied().unwrap_or(0.0);
                (party.clone(), e * self.factor(s))
            })
            .collect();

        coverage_shares(model, SignalSource::Sentiment.as_str(), &adjusted, polling)
    }
}

/// Model 3: polling shifted by a clamped engagement momentum term.
#[derive(Debug, Clone)]
pub struct MomentumModel {
    pub config: MomentumConfig,
}

impl MomentumModel {
    pub fn new(config: MomentumConfig) -> Self {
        Self { config }
    }
}

impl SeatModel for MomentumModel {
    fn id(&self) -> ModelId {
        ModelId::PollingMomentum
    }

    fn candidate_signal(&self) -> CandidateSignal {
        CandidateSignal::Engagement
    }

    fn party_shares(&self, ctx: &ModelContext<'_>) -> Result<SourceShare> {
        let model = self.id();
        let polling = ctx.polling(model)?;
        let engagement = engagement_shares(model, ctx)?;
        let clamp = self.config.clamp;

        let blended: BTreeMap<PartyCode, f64> = polling
            .parties()
            .chain(engagement.parties())
            .map(|party| {
                let base = polling.get(party);
                let momentum = (engagement.get(party) - base).clamp(-clamp, clamp);
                let value =
                    self.config.polling_weight * base + self.config.signal_weight * (base + momentum);
                (party.clone(), value)
            })
            .collect();

        floored(blended).ok_or_else(|| missing(model, SignalSource::Polling.as_str()))
    }
}
