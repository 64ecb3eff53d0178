//! Error types for the seat engine.

use thiserror::Error;

use crate::types::ModelId;

/// Result type alias using the engine error type.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while resolving districts, apportioning blocks and running models.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A district with no usable candidates
    #[error("Malformed district {district_id}: {reason}")]
    MalformedDistrict { district_id: String, reason: String },

    /// Apportionment input without any positive support
    #[error("No support in block {block_id}: {reason}")]
    NoSupport { block_id: String, reason: String },

    /// A model's required source data is absent
    #[error("{model} is missing signal '{signal}'")]
    MissingSignal { model: ModelId, signal: String },

    /// Ensemble weights are malformed
    #[error("Invalid ensemble weights: {reason}")]
    InvalidWeights { reason: String },

    /// A produced seat vector does not sum to the expected total. Always a defect.
    #[error("{model} allocated {actual} {tier} seats, expected {expected}")]
    SeatConservationViolation {
        model: ModelId,
        tier: &'static str,
        expected: u32,
        actual: u32,
    },

    /// Inconsistent input tables
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context layers.
    pub fn root(&self) -> &EngineError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Stable machine-readable kind for output tables.
    pub fn kind(&self) -> &'static str {
        match self.root() {
            Self::MalformedDistrict { .. } => "malformed_district",
            Self::NoSupport { .. } => "no_support",
            Self::MissingSignal { .. } => "missing_signal",
            Self::InvalidWeights { .. } => "invalid_weights",
            Self::SeatConservationViolation { .. } => "seat_conservation_violation",
            Self::InvalidInput(_) => "invalid_input",
            Self::WithContext { .. } => "unknown",
        }
    }

    /// Check if this error signals an engine defect rather than bad input.
    pub fn is_defect(&self) -> bool {
        matches!(self.root(), Self::SeatConservationViolation { .. })
    }
}

/// Extension trait for adding context to engine results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_looks_through_context() {
        let err = EngineError::NoSupport {
            block_id: "kinki".into(),
            reason: "all zero".into(),
        }
        .with_context("model 1 (engagement)");

        assert_eq!(err.kind(), "no_support");
        assert!(!err.is_defect());
        assert_eq!(
            err.to_string(),
            "model 1 (engagement): No support in block kinki: all zero"
        );
    }

    #[test]
    fn test_conservation_violation_is_defect() {
        let err = EngineError::SeatConservationViolation {
            model: ModelId::VideoEnsemble,
            tier: "total",
            expected: 465,
            actual: 464,
        };
        assert!(err.is_defect());
        assert_eq!(
            err.to_string(),
            "model 4 (video_ensemble) allocated 464 total seats, expected 465"
        );
    }

    #[test]
    fn test_result_ext() {
        let res: Result<()> = Err(EngineError::InvalidInput("bad".into()));
        let err = res.context("loading tables").unwrap_err();
        assert!(matches!(err.root(), EngineError::InvalidInput(_)));
    }
}
