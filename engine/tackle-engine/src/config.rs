//! # Configuration Management
//!
//! Tunables for every pipeline stage. Defaults reproduce the reference feature
//! table; a TOML file and `TACKLE_*` environment variables can override them.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::{
    DEFAULT_FIELD_WIDTH, DEFAULT_FRAME_INTERVAL_SECS, DEFAULT_NEARBY_RADIUS, DEFAULT_TACKLE_DIST,
    DEFAULT_WEIGHT_NORM,
};

/// Main configuration for the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Support counting around the carrier
    pub proximity: ProximityConfig,
    /// Derived feature constants
    pub features: FeatureConfig,
    /// Opportunity segmentation
    pub segmentation: SegmentationConfig,
    /// Partition scheduling and failure handling
    pub execution: ExecutionConfig,
}

/// Proximity configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    /// Players strictly closer than this to the carrier count as nearby
    pub nearby_radius: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self { nearby_radius: DEFAULT_NEARBY_RADIUS }
    }
}

/// Feature derivation constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Reference mass dividing player weight in momentum terms
    pub weight_norm: f64,
    /// Sideline-to-sideline width
    pub field_width: f64,
    /// Seconds between consecutive frames
    pub frame_interval_secs: f64,
    /// Height conversion factor
    pub meters_per_foot: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            weight_norm: DEFAULT_WEIGHT_NORM,
            field_width: DEFAULT_FIELD_WIDTH,
            frame_interval_secs: DEFAULT_FRAME_INTERVAL_SECS,
            meters_per_foot: 0.3048,
        }
    }
}

/// Segmentation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Defenders at or inside this distance are in tackle range
    pub tackle_dist: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self { tackle_dist: DEFAULT_TACKLE_DIST }
    }
}

/// Execution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Process partitions on the rayon pool
    pub parallel: bool,
    /// What to do when a partition fails
    pub failure_policy: FailurePolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { parallel: true, failure_policy: FailurePolicy::Halt }
    }
}

/// Handling of partitions that fail in the per-play stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the whole run with the first failure
    Halt,
    /// Drop the failed partition's rows and report it
    Isolate,
}

impl std::str::FromStr for FailurePolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "halt" => Ok(FailurePolicy::Halt),
            "isolate" => Ok(FailurePolicy::Isolate),
            other => Err(PipelineError::config(format!("unknown failure policy {other:?}"))),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `TACKLE_*` environment overrides
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(radius) = std::env::var("TACKLE_NEARBY_RADIUS") {
            self.proximity.nearby_radius = parse_env("TACKLE_NEARBY_RADIUS", &radius)?;
        }

        if let Ok(dist) = std::env::var("TACKLE_DIST") {
            self.segmentation.tackle_dist = parse_env("TACKLE_DIST", &dist)?;
        }

        if let Ok(parallel) = std::env::var("TACKLE_PARALLEL") {
            self.execution.parallel = parse_env("TACKLE_PARALLEL", &parallel)?;
        }

        if let Ok(policy) = std::env::var("TACKLE_FAILURE_POLICY") {
            self.execution.failure_policy = policy.parse()?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject values that would make the derived columns meaningless
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("proximity.nearby_radius", self.proximity.nearby_radius),
            ("segmentation.tackle_dist", self.segmentation.tackle_dist),
            ("features.weight_norm", self.features.weight_norm),
            ("features.field_width", self.features.field_width),
            ("features.frame_interval_secs", self.features.frame_interval_secs),
            ("features.meters_per_foot", self.features.meters_per_foot),
        ];

        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PipelineError::config(format!("{name} must be positive, got {value}")));
            }
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| PipelineError::config(format!("{name} has invalid value {raw:?}")))
}
