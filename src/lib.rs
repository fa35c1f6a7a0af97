//! Institutional flow overlay engine.
//!
//! Fuses partial, possibly-missing institutional-flow components (holdings
//! change, relative volume, accumulation/distribution slope, days-to-cover
//! improvement) into one bounded score per symbol per day, then overlays
//! that score onto an externally supplied bull probability and Kelly
//! fraction and classifies the result into a position action.
//!
//! The pipeline is deterministic: same bars, filings, estimates and config
//! produce bit-identical scores and actions, which is what makes the
//! decision records auditable after the fact.

pub mod config;
pub mod decision;
pub mod engine;
pub mod features;
pub mod providers;
pub mod score;
pub mod state;
pub mod types;

pub use config::EngineConfig;
pub use decision::{Action, DecisionRecord};
pub use engine::{FlowEngine, SymbolSeries};
pub use providers::{
    DisabledShortInterest, HoldingsProvider, ShortInterestProvider, TableHoldingsProvider,
};
pub use types::{Bar, ComponentFlags, FeatureSnapshot, RegimeEstimate};
