//! End-to-end runs against the default 465-seat configuration.

use seatcast_common::config::ForecastConfig;
use seatcast_engine::types::{CandidateRow, PartySignal, SignalSource};
use seatcast_engine::{ForecastEngine, ForecastInputs, ModelId};

const PARTIES: [(&str, f64); 10] = [
    ("LDP", 0.30),
    ("ISHIN", 0.10),
    ("CDP", 0.14),
    ("KOMEITO", 0.04),
    ("DPFP", 0.10),
    ("JCP", 0.04),
    ("REIWA", 0.04),
    ("SANSEITO", 0.07),
    ("MIRAI", 0.03),
    ("OTHER", 0.14),
];

fn candidate(district: usize, block: &str, party: &str, share: f64) -> CandidateRow {
    CandidateRow {
        district_id: format!("D{district:03}"),
        prefecture: format!("P{:02}", district % 47),
        block_id: block.into(),
        candidate_name: Some(format!("{party}-{district}")),
        party: party.into(),
        incumbent: party == "LDP",
        predicted_vote_share: share,
        engagement_score: 0.0,
        news_mentions: 0,
    }
}

/// 289 districts spread round-robin over the configured blocks.
fn national_inputs(config: &ForecastConfig) -> ForecastInputs {
    let mut candidates = Vec::new();
    for i in 0..config.election.district_seats as usize {
        let block = &config.blocks[i % config.blocks.len()].id;
        candidates.push(candidate(i, block, "LDP", 0.30 + ((i * 7) % 20) as f64 / 100.0));
        candidates.push(candidate(i, block, "CDP", 0.22 + ((i * 13) % 20) as f64 / 100.0));
        if block == "kinki" {
            candidates.push(candidate(i, block, "ISHIN", 0.35));
        } else {
            candidates.push(candidate(i, block, "DPFP", 0.10 + (i % 5) as f64 / 100.0));
        }
        candidates.push(candidate(i, block, "JCP", 0.06));
    }

    let mut signals = Vec::new();
    for (n, (party, polling)) in PARTIES.iter().enumerate() {
        let n = n as f64;
        signals.push(PartySignal { party: (*party).into(), source: SignalSource::Polling, value: *polling });
        signals.push(PartySignal {
            party: (*party).into(),
            source: SignalSource::Engagement,
            value: 100.0 + 37.0 * n,
        });
        signals.push(PartySignal {
            party: (*party).into(),
            source: SignalSource::Sentiment,
            value: (n - 4.5) / 10.0,
        });
        signals.push(PartySignal {
            party: (*party).into(),
            source: SignalSource::NewsCoverage,
            value: 500.0 - 40.0 * n,
        });
        signals.push(PartySignal {
            party: (*party).into(),
            source: SignalSource::NewsTone,
            value: if n < 5.0 { 0.1 } else { -0.1 },
        });
    }

    ForecastInputs { candidates, signals, ..Default::default() }
}

#[test]
fn test_all_models_conserve_seats() {
    let config = ForecastConfig::default();
    let inputs = national_inputs(&config);
    let engine = ForecastEngine::new(config).unwrap();
    let output = engine.run(&inputs).unwrap();

    assert!(output.failures.is_empty(), "{:?}", output.failures);
    assert_eq!(output.results.len(), 7);
    for model in ModelId::ALL {
        let result = output.result(model).unwrap();
        assert_eq!(result.total_seats(), 465, "{model}");
        assert_eq!(result.district_total(), 289, "{model}");
        assert_eq!(result.proportional_total(), 176, "{model}");
        assert_eq!(result.seats.len(), 10, "{model}");
    }
    assert_eq!(output.district_calls.len(), 289);
    // only LDP candidates are incumbents
    assert!(output
        .district_calls
        .iter()
        .all(|c| c.winner_incumbent == (c.winner == "LDP")));
    assert_eq!(output.confidence_bands.values().sum::<usize>(), 289);
    assert_eq!(output.model_seats.len(), 70);
}

#[test]
fn test_runs_are_deterministic() {
    let config = ForecastConfig::default();
    let inputs = national_inputs(&config);
    let engine = ForecastEngine::new(config).unwrap();

    let first = engine.run(&inputs).unwrap();
    let second = engine.run(&inputs).unwrap();

    assert_ne!(first.run.run_id, second.run.run_id);
    assert_eq!(first.results, second.results);
    assert_eq!(first.model_seats, second.model_seats);
    assert_eq!(first.district_calls, second.district_calls);
    assert_eq!(first.coalitions, second.coalitions);
}

#[test]
fn test_coalition_thresholds() {
    let config = ForecastConfig::default();
    let inputs = national_inputs(&config);
    let engine = ForecastEngine::new(config).unwrap();
    let output = engine.run(&inputs).unwrap();

    assert_eq!(output.run.majority_threshold, 233);
    assert_eq!(output.run.supermajority_threshold, 310);
    assert_eq!(output.coalitions.len(), 7 * 6);
    for row in &output.coalitions {
        let seats = row.total.seats;
        assert_eq!(row.total.majority, seats >= 233, "{}", row.total.coalition);
        assert_eq!(row.total.supermajority, seats >= 310, "{}", row.total.coalition);
    }

    for model in ModelId::ALL {
        let sum: u32 = output.coalitions_for(model).map(|c| c.seats).sum();
        // the default coalitions partition the roster
        assert_eq!(sum, 465, "{model}");
    }
}

#[test]
fn test_closest_races_ranked() {
    let config = ForecastConfig::default();
    let inputs = national_inputs(&config);
    let engine = ForecastEngine::new(config).unwrap();
    let output = engine.run(&inputs).unwrap();

    assert_eq!(output.closest_races.len(), 20);
    for (i, pair) in output.closest_races.windows(2).enumerate() {
        assert_eq!(pair[0].rank, i + 1);
        assert!(pair[0].margin <= pair[1].margin);
    }
    let tightest = output
        .district_calls
        .iter()
        .map(|c| c.margin)
        .fold(f64::INFINITY, f64::min);
    assert_eq!(output.closest_races[0].margin, tightest);
}

#[test]
fn test_seat_ranges_cover_every_model() {
    let config = ForecastConfig::default();
    let inputs = national_inputs(&config);
    let engine = ForecastEngine::new(config).unwrap();
    let output = engine.run(&inputs).unwrap();

    assert_eq!(output.seat_ranges.len(), 10);
    for range in &output.seat_ranges {
        for result in output.results.values() {
            let seats = result.seats_for(&range.party);
            assert!(range.min <= seats && seats <= range.max, "{}", range.party);
        }
    }
    // six models compared against the baseline, ten parties each
    assert_eq!(output.seat_deltas.len(), 60);
}

#[test]
fn test_missing_sentiment_fails_dependent_models() {
    let config = ForecastConfig::default();
    let mut inputs = national_inputs(&config);
    inputs.signals.retain(|s| s.source != SignalSource::Sentiment);
    let engine = ForecastEngine::new(config).unwrap();
    let output = engine.run(&inputs).unwrap();

    let failed: Vec<ModelId> = output.failures.iter().map(|f| f.model).collect();
    assert_eq!(
        failed,
        vec![ModelId::SentimentWeighted, ModelId::VideoEnsemble, ModelId::IntegratedEnsemble]
    );
    assert!(output.failures.iter().all(|f| f.kind == "missing_signal"));

    for model in [ModelId::PollingBaseline, ModelId::Engagement, ModelId::PollingMomentum, ModelId::News] {
        assert_eq!(output.result(model).unwrap().total_seats(), 465);
    }
}

#[test]
fn test_block_support_drives_proportional_tier() {
    let config = ForecastConfig::default();
    let mut inputs = national_inputs(&config);
    for block in &config.blocks {
        inputs.block_support.push(seatcast_engine::types::BlockSupportRow {
            block_id: block.id.clone(),
            party: "LDP".into(),
            support: 1.0,
        });
    }
    let engine = ForecastEngine::new(config).unwrap();
    let output = engine.run(&inputs).unwrap();

    // a block whose only supported party is LDP gives it every seat
    let baseline = output.result(ModelId::PollingBaseline).unwrap();
    assert_eq!(baseline.seats["LDP"].proportional, 176);
    assert_eq!(baseline.proportional_total(), 176);
}
