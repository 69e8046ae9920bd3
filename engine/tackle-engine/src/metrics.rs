//! # Run Metrics
//!
//! Structured report of a pipeline run, including the label-quality diagnostic
//! computed during segmentation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::PlayKey;

/// How many defender/play pairings have an unambiguous label
///
/// A pairing is unambiguous when it has exactly one tackle opportunity and
/// exactly one recorded outcome flag. Computed before outcome attribution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelQuality {
    pub keys: usize,
    pub non_ambiguous_keys: usize,
}

impl LabelQuality {
    /// Fraction of unambiguous pairings; `None` when there are no candidates
    pub fn non_ambiguous_rate(&self) -> Option<f64> {
        (self.keys > 0).then(|| self.non_ambiguous_keys as f64 / self.keys as f64)
    }
}

/// A partition dropped under the isolate failure policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionFailure {
    pub partition: String,
    pub error: String,
}

/// Counts of what each stage produced
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StageCounts {
    pub plays_seen: usize,
    pub carrier_frames: usize,
    pub defender_frames: usize,
}

impl StageCounts {
    pub fn merge(&mut self, other: &StageCounts) {
        self.plays_seen += other.plays_seen;
        self.carrier_frames += other.carrier_frames;
        self.defender_frames += other.defender_frames;
    }
}

/// Summary of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub partitions_processed: usize,
    pub partitions_failed: Vec<PartitionFailure>,
    pub counts: StageCounts,
    /// Plays whose carrier never had a receipt event
    pub plays_without_receipt: Vec<PlayKey>,
    pub candidate_rows: usize,
    pub opportunities: usize,
    pub label_quality: LabelQuality,
    pub non_ambiguous_rate: Option<f64>,
    pub attribution_policy: String,
    pub completed_at: DateTime<Utc>,
}
