//! Seatcast Common - Shared types and configuration for the seatcast forecaster.
//!
//! This crate provides:
//! - Forecast configuration types and loading (parties, blocks, coalitions, model weights)
//! - Configuration validation
//! - Logging setup and run context helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod logging;
pub mod validation;

pub use config::{
    AnalyticsConfig, BlockConfig, CoalitionConfig, DistrictModelConfig, ElectionConfig,
    EnsembleWeights, ForecastConfig, ModelsConfig, MomentumConfig, NewsWeights, ObservabilityConfig,
    PartyConfig,
};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{ForecastConfig, ModelsConfig, PartyConfig};
    pub use crate::logging::{init_logging, RunContext};
    pub use crate::validation::{Validate, ValidationError};
}
