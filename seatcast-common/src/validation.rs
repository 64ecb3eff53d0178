//! Configuration validation.
//!
//! Checks that the reference data is internally consistent before any model runs:
//! seat tiers add up, block seats match the proportional total, party codes are
//! unique, coalitions only name known parties and ensemble weights are usable.

use std::collections::HashSet;
use thiserror::Error;

use crate::config::{
    DistrictModelConfig, EnsembleWeights, ForecastConfig, ModelsConfig, PartyConfig,
};

/// Tolerance on weight sums.
pub const WEIGHT_EPSILON: f64 = 1e-6;

const COLOR_PATTERN: &str = r"^#[0-9A-Fa-f]{6}$";

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl ForecastConfig {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.check_seat_totals() {
            errors.push(e);
        }
        if let Err(e) = validate_parties(&self.parties) {
            errors.push(e);
        }
        if let Err(e) = self.check_coalitions() {
            errors.push(e);
        }
        if let Err(e) = self.models.validate() {
            errors.push(e);
        }
        if let Err(e) = self.district.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    fn check_seat_totals(&self) -> ValidationResult<()> {
        let election = &self.election;
        if election.district_seats + election.proportional_seats != election.total_seats {
            return Err(ValidationError::Conflict {
                reason: format!(
                    "district seats {} + proportional seats {} != total seats {}",
                    election.district_seats, election.proportional_seats, election.total_seats
                ),
            });
        }

        if self.blocks.is_empty() {
            return Err(ValidationError::MissingField {
                field: "blocks".into(),
            });
        }

        let mut ids = HashSet::new();
        for block in &self.blocks {
            if !ids.insert(block.id.as_str()) {
                return Err(ValidationError::InvalidValue {
                    field: "blocks".into(),
                    reason: format!("duplicate block id '{}'", block.id),
                });
            }
        }

        let block_sum: u32 = self.blocks.iter().map(|b| b.seats).sum();
        if block_sum != election.proportional_seats {
            return Err(ValidationError::Conflict {
                reason: format!(
                    "block seats sum to {} but proportional seats is {}",
                    block_sum, election.proportional_seats
                ),
            });
        }

        Ok(())
    }

    fn check_coalitions(&self) -> ValidationResult<()> {
        let known: HashSet<&str> = self.parties.iter().map(|p| p.code.as_str()).collect();
        for coalition in &self.coalitions {
            if let Some(unknown) = coalition.parties.iter().find(|p| !known.contains(p.as_str())) {
                return Err(ValidationError::InvalidValue {
                    field: format!("coalitions.{}", coalition.name),
                    reason: format!("unknown party code '{unknown}'"),
                });
            }
        }
        Ok(())
    }
}

fn validate_parties(parties: &[PartyConfig]) -> ValidationResult<()> {
    if parties.is_empty() {
        return Err(ValidationError::MissingField {
            field: "parties".into(),
        });
    }

    let color = regex::Regex::new(COLOR_PATTERN).map_err(|e| ValidationError::InvalidValue {
        field: "parties.color".into(),
        reason: e.to_string(),
    })?;
    let mut codes = HashSet::new();
    for party in parties {
        if party.code.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "parties.code".into(),
                reason: "party code must not be empty".into(),
            });
        }
        if !codes.insert(party.code.as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "parties.code".into(),
                reason: format!("duplicate party code '{}'", party.code),
            });
        }
        if !color.is_match(&party.color) {
            return Err(ValidationError::InvalidValue {
                field: format!("parties.{}.color", party.code),
                reason: format!("'{}' is not a #RRGGBB color", party.color),
            });
        }
    }
    Ok(())
}

/// Check a weight vector for an ensemble of `members` models.
pub fn check_weights(field: &str, weights: &EnsembleWeights, members: usize) -> ValidationResult<()> {
    let w = weights.as_slice();
    if w.len() != members {
        return Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: format!("expected {members} weights, got {}", w.len()),
        });
    }
    if w.iter().any(|x| !x.is_finite() || *x < 0.0) {
        return Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: "weights must be finite and non-negative".into(),
        });
    }
    if (weights.total() - 1.0).abs() > WEIGHT_EPSILON {
        return Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: format!("weights sum to {}, expected 1", weights.total()),
        });
    }
    Ok(())
}

impl Validate for ModelsConfig {
    fn validate(&self) -> ValidationResult<()> {
        check_weights("models.video_ensemble", &self.video_ensemble, 3)?;
        check_weights("models.integrated_ensemble", &self.integrated_ensemble, 2)?;

        if !(0.0..=1.0).contains(&self.sentiment_weight) {
            return Err(ValidationError::InvalidValue {
                field: "models.sentiment_weight".into(),
                reason: "must be within [0, 1]".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.candidate_signal_weight) {
            return Err(ValidationError::InvalidValue {
                field: "models.candidate_signal_weight".into(),
                reason: "must be within [0, 1]".into(),
            });
        }
        if self.momentum.clamp < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "models.momentum.clamp".into(),
                reason: "must not be negative".into(),
            });
        }
        let blend = self.momentum.polling_weight + self.momentum.signal_weight;
        if (blend - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ValidationError::InvalidValue {
                field: "models.momentum".into(),
                reason: format!("polling_weight + signal_weight = {blend}, expected 1"),
            });
        }
        let news = &self.news;
        if news.coverage_weight < 0.0 || news.polling_weight < 0.0 || news.tone_weight < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "models.news".into(),
                reason: "news weights must not be negative".into(),
            });
        }
        Ok(())
    }
}

impl Validate for DistrictModelConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.softmax_temperature <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "district.softmax_temperature".into(),
                reason: "must be positive".into(),
            });
        }
        if self.confidence_denominator <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "district.confidence_denominator".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlockConfig, CoalitionConfig};
    use test_case::test_case;

    #[test]
    fn test_default_config_is_valid() {
        ForecastConfig::default().validate().unwrap();
    }

    #[test]
    fn test_block_sum_mismatch() {
        let mut config = ForecastConfig::default();
        config.blocks.push(BlockConfig {
            id: "extra".into(),
            name: "Extra".into(),
            seats: 1,
        });
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::Conflict { .. }));
    }

    #[test]
    fn test_duplicate_party_code() {
        let mut config = ForecastConfig::default();
        let first = config.parties[0].clone();
        config.parties.push(first);
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_unknown_coalition_member() {
        let mut config = ForecastConfig::default();
        config.coalitions.push(CoalitionConfig {
            name: "ghost".into(),
            parties: vec!["GHOST".into()],
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GHOST"));
    }

    #[test]
    fn test_multiple_errors_are_collected() {
        let mut config = ForecastConfig::default();
        config.election.total_seats = 400;
        config.district.softmax_temperature = 0.0;
        assert!(matches!(config.validate(), Err(ValidationError::Multiple(v)) if v.len() == 2));
    }

    #[test_case(vec![0.5, 0.5], 2 => true ; "balanced")]
    #[test_case(vec![1.0, 0.0], 2 => true ; "degenerate but valid")]
    #[test_case(vec![0.6, 0.6], 2 => false ; "sum above one")]
    #[test_case(vec![-0.5, 1.5], 2 => false ; "negative weight")]
    #[test_case(vec![0.5, 0.5], 3 => false ; "wrong arity")]
    #[test_case(vec![f64::NAN, 1.0], 2 => false ; "nan weight")]
    fn test_check_weights(weights: Vec<f64>, members: usize) -> bool {
        check_weights("w", &EnsembleWeights(weights), members).is_ok()
    }

    #[test_case(0.0 => true ; "disabled")]
    #[test_case(0.2 => true ; "default")]
    #[test_case(1.5 => false ; "above one")]
    #[test_case(f64::NAN => false ; "nan")]
    fn test_candidate_signal_weight(weight: f64) -> bool {
        let mut models = ModelsConfig::default();
        models.candidate_signal_weight = weight;
        models.validate().is_ok()
    }

    #[test]
    fn test_bad_color() {
        let mut config = ForecastConfig::default();
        config.parties[0].color = "red".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("#RRGGBB"));
    }
}
