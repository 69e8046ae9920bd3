//! # TackleEngine
//!
//! Turns per-frame player-tracking records from NFL plays into a labeled table of
//! tackle opportunities.
//!
//! Data flows strictly downstream through the stages:
//! tracking + play metadata → carrier windows ([`carrier`]) → proximity table
//! ([`proximity`]) → physically enriched, labeled and featured defender frames
//! ([`physical`], [`features`]) → segmented, weighted opportunities
//! ([`segmentation`]). The [`pipeline`] module sequences the stages over tracking
//! partitions.

pub mod carrier;
pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod metrics;
pub mod physical;
pub mod pipeline;
pub mod proximity;
pub mod segmentation;
pub mod types;


#[cfg(test)]
mod integration_tests;

pub use carrier::CarrierWindowExtractor;
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use features::{TackleFeatures, FEATURE_COLUMNS};
pub use metrics::{LabelQuality, PipelineReport};
pub use physical::{OutcomeBook, PlayerDirectory};
pub use pipeline::{Pipeline, PipelineOutput};
pub use proximity::ProximityResolver;
pub use segmentation::{OpportunitySegmenter, OutcomeAttribution, TerminalOpportunityOnly};
pub use types::*;

/// Current version of the TackleEngine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default radius for counting nearby blockers and defenders (yards)
pub const DEFAULT_NEARBY_RADIUS: f64 = 5.0;

/// Default maximum carrier distance for a tackle opportunity (yards)
pub const DEFAULT_TACKLE_DIST: f64 = 1.5;

/// Reference mass used to keep momentum magnitudes order-1 (lb)
pub const DEFAULT_WEIGHT_NORM: f64 = 250.0;

/// Field width between sidelines (yards)
pub const DEFAULT_FIELD_WIDTH: f64 = 53.3;

/// Time between consecutive tracking frames (seconds)
pub const DEFAULT_FRAME_INTERVAL_SECS: f64 = 0.1;

/// Club tag of the ball marker rows
pub const FOOTBALL_CLUB: &str = "football";
