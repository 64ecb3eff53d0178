//! Signal aggregation.
//!
//! Turns already-collected per-party aggregates (channel metrics, comment
//! sentiment counts, news articles, opinion polls) into the rows of the party
//! signal table. No I/O happens here; rows arrive fully materialized.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{PartyCode, PartySignal, SignalSource, SignalTable};

/// Parties with fewer comments than this get a neutral sentiment.
pub const MIN_COMMENTS: u64 = 3;

/// Poll answer that names no party.
pub const NO_PARTY_LABEL: &str = "支持なし";

// ============================================================================
// Engagement
// ============================================================================

/// Channel and campaign-video metrics of one party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub party: PartyCode,
    #[serde(default)]
    pub subscribers: u64,
    #[serde(default)]
    pub channel_views: u64,
    #[serde(default)]
    pub campaign_views: u64,
    #[serde(default)]
    pub campaign_likes: u64,
    #[serde(default)]
    pub avg_views: f64,
}

/// Weights of each metric in the composite engagement score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementWeights {
    #[serde(default = "default_subscribers_weight")]
    pub subscribers: f64,
    #[serde(default = "default_channel_views_weight")]
    pub channel_views: f64,
    #[serde(default = "default_campaign_views_weight")]
    pub campaign_views: f64,
    #[serde(default = "default_campaign_likes_weight")]
    pub campaign_likes: f64,
    #[serde(default = "default_avg_views_weight")]
    pub avg_views: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            subscribers: default_subscribers_weight(),
            channel_views: default_channel_views_weight(),
            campaign_views: default_campaign_views_weight(),
            campaign_likes: default_campaign_likes_weight(),
            avg_views: default_avg_views_weight(),
        }
    }
}

fn default_subscribers_weight() -> f64 {
    0.15
}

fn default_channel_views_weight() -> f64 {
    0.15
}

fn default_campaign_views_weight() -> f64 {
    0.40
}

fn default_campaign_likes_weight() -> f64 {
    0.20
}

fn default_avg_views_weight() -> f64 {
    0.10
}

/// Composite engagement score per party.
///
/// Each metric is divided by its maximum over all parties before weighting.
pub fn engagement_scores(
    metrics: &[ChannelMetrics],
    weights: &EngagementWeights,
) -> BTreeMap<PartyCode, f64> {
    let max_of = |f: fn(&ChannelMetrics) -> f64| metrics.iter().map(f).fold(0.0, f64::max);
    let ratio = |v: f64, max: f64| if max > 0.0 { v / max } else { 0.0 };

    let max_subscribers = max_of(|m| m.subscribers as f64);
    let max_channel_views = max_of(|m| m.channel_views as f64);
    let max_campaign_views = max_of(|m| m.campaign_views as f64);
    let max_campaign_likes = max_of(|m| m.campaign_likes as f64);
    let max_avg_views = max_of(|m| m.avg_views);

    metrics
        .iter()
        .map(|m| {
            let score = weights.subscribers * ratio(m.subscribers as f64, max_subscribers)
                + weights.channel_views * ratio(m.channel_views as f64, max_channel_views)
                + weights.campaign_views * ratio(m.campaign_views as f64, max_campaign_views)
                + weights.campaign_likes * ratio(m.campaign_likes as f64, max_campaign_likes)
                + weights.avg_views * ratio(m.avg_views, max_avg_views);
            (m.party.clone(), score)
        })
        .collect()
}

// ============================================================================
// Sentiment
// ============================================================================

/// Classified comment counts for one party (several tallies per party are summed).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentTally {
    pub party: PartyCode,
    #[serde(default)]
    pub positive: u64,
    #[serde(default)]
    pub negative: u64,
    #[serde(default)]
    pub neutral: u64,
}

/// Net sentiment `(positive - negative) / total` per party.
///
/// Parties with fewer than `min_comments` comments score 0.
pub fn net_sentiment(tallies: &[CommentTally], min_comments: u64) -> BTreeMap<PartyCode, f64> {
    let mut totals: BTreeMap<PartyCode, CommentTally> = BTreeMap::new();
    for t in tallies {
        let entry = totals.entry(t.party.clone()).or_default();
        entry.positive += t.positive;
        entry.negative += t.negative;
        entry.neutral += t.neutral;
    }

    totals
        .into_iter()
        .map(|(party, t)| {
            let total = t.positive + t.negative + t.neutral;
            let score = if total < min_comments.max(1) {
                0.0
            } else {
                (t.positive as f64 - t.negative as f64) / total as f64
            };
            (party, score)
        })
        .collect()
}

// ============================================================================
// News
// ============================================================================

/// One news article with the parties it mentions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRow {
    pub mentioned_parties: Vec<PartyCode>,
    #[serde(default)]
    pub page_views: u64,
    /// Article tone in [-1, 1]
    #[serde(default)]
    pub tone: f64,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published: Option<NaiveDate>,
}

/// Coverage volume and mean tone per party.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsSignals {
    pub coverage: BTreeMap<PartyCode, f64>,
    pub tone: BTreeMap<PartyCode, f64>,
}

/// Sum page views and average tone over the articles mentioning each party.
pub fn news_signals(articles: &[ArticleRow]) -> NewsSignals {
    let mut coverage: BTreeMap<PartyCode, f64> = BTreeMap::new();
    let mut tones: BTreeMap<PartyCode, (f64, u32)> = BTreeMap::new();

    for article in articles {
        for party in article.mentioned_parties.iter().filter(|p| !p.is_empty()) {
            *coverage.entry(party.clone()).or_default() += article.page_views as f64;
            let (sum, n) = tones.entry(party.clone()).or_default();
            *sum += article.tone;
            *n += 1;
        }
    }

    NewsSignals {
        coverage,
        tone: tones
            .into_iter()
            .map(|(party, (sum, n))| (party, sum / f64::from(n)))
            .collect(),
    }
}

// ============================================================================
// Polling
// ============================================================================

/// One party's support rate in one survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollRow {
    pub survey_date: NaiveDate,
    pub party: String,
    pub support_rate: f64,
}

/// Mean support per party over the surveys of the latest date.
///
/// The "no party" answer is dropped.
pub fn latest_polling(polls: &[PollRow]) -> BTreeMap<PartyCode, f64> {
    let Some(latest) = polls.iter().map(|p| p.survey_date).max() else {
        return BTreeMap::new();
    };

    let mut sums: BTreeMap<PartyCode, (f64, u32)> = BTreeMap::new();
    for row in polls
        .iter()
        .filter(|p| p.survey_date == latest && p.party != NO_PARTY_LABEL)
    {
        let (sum, n) = sums.entry(row.party.clone()).or_default();
        *sum += row.support_rate;
        *n += 1;
    }

    sums.into_iter()
        .map(|(party, (sum, n))| (party, sum / f64::from(n)))
        .collect()
}

// ============================================================================
// Table Builder
// ============================================================================

/// Raw aggregates the engine can turn into signal rows itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalAggregates {
    #[serde(default)]
    pub channels: Vec<ChannelMetrics>,
    #[serde(default)]
    pub engagement_weights: EngagementWeights,
    #[serde(default)]
    pub comments: Vec<CommentTally>,
    #[serde(default)]
    pub articles: Vec<ArticleRow>,
    #[serde(default)]
    pub polls: Vec<PollRow>,
}

impl SignalAggregates {
    /// Rows for every source that has data.
    pub fn rows(&self) -> Vec<PartySignal> {
        let mut builder = SignalTableBuilder::new();
        if !self.channels.is_empty() {
            builder = builder.engagement(engagement_scores(&self.channels, &self.engagement_weights));
        }
        if !self.comments.is_empty() {
            builder = builder.sentiment(net_sentiment(&self.comments, MIN_COMMENTS));
        }
        if !self.articles.is_empty() {
            builder = builder.news(news_signals(&self.articles));
        }
        if !self.polls.is_empty() {
            builder = builder.polling(latest_polling(&self.polls));
        }
        builder.into_rows()
    }
}

/// Collects per-source maps into signal rows.
#[derive(Debug, Clone, Default)]
pub struct SignalTableBuilder {
    rows: Vec<PartySignal>,
}

impl SignalTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: SignalSource, values: BTreeMap<PartyCode, f64>) -> Self {
        self.rows.extend(
            values
                .into_iter()
                .map(|(party, value)| PartySignal { party, source, value }),
        );
        self
    }

    pub fn engagement(self, values: BTreeMap<PartyCode, f64>) -> Self {
        self.source(SignalSource::Engagement, values)
    }

    pub fn sentiment(self, values: BTreeMap<PartyCode, f64>) -> Self {
        self.source(SignalSource::Sentiment, values)
    }

    pub fn polling(self, values: BTreeMap<PartyCode, f64>) -> Self {
        self.source(SignalSource::Polling, values)
    }

    pub fn news(self, news: NewsSignals) -> Self {
        self.source(SignalSource::NewsCoverage, news.coverage)
            .source(SignalSource::NewsTone, news.tone)
    }

    /// Append rows given directly.
    pub fn rows(mut self, rows: impl IntoIterator<Item = PartySignal>) -> Self {
        self.rows.extend(rows);
        self
    }

    pub fn into_rows(self) -> Vec<PartySignal> {
        self.rows
    }

    /// Validate and index the collected rows.
    pub fn build(self) -> Result<SignalTable> {
        SignalTable::from_rows(&self.rows)
    }
}
