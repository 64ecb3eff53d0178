//! Seatcast Engine Library
//!
//! Seat prediction and apportionment for a mixed-member chamber: single-member
//! districts decided by plurality plus proportional blocks apportioned by
//! D'Hondt.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          seatcast-engine                            │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐      │
//! │  │    Signals      │─▶│   Model Bank    │─▶│    Ensemble     │      │
//! │  │   Aggregator    │  │  (models 0-3,5) │  │  (models 4, 6)  │      │
//! │  └─────────────────┘  └────────┬────────┘  └────────┬────────┘      │
//! │                                │                    │               │
//! │  ┌─────────────────┐  ┌────────▼────────┐  ┌────────▼────────┐      │
//! │  │    District     │◀─│  Apportionment  │  │   Coalition &   │      │
//! │  │    Resolver     │  │    (D'Hondt)    │  │    Rankings     │      │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Seat conservation
//! - Every model result sums to the district count and the proportional total
//! - Ensembles reconcile each tier with largest remainders
//! - A result that does not conserve seats is rejected, never corrected
//!
//! ## Swing
//! - Each base model yields national party shares
//! - Their ratio to polling rescales candidate shares and block support
//!
//! ## Determinism
//! - District ties: party code, then candidate position
//! - D'Hondt ties: total support, then party code
//! - Parallel results merge in model id and block order

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analytics;
pub mod apportionment;
pub mod district;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod signals;
pub mod types;

pub use engine::{ForecastEngine, ForecastInputs, ForecastOutput};
pub use error::{EngineError, Result};
pub use types::{ModelId, ModelResult, PartyCode, SeatSplit};
