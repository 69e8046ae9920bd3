//! # Pipeline Orchestration
//!
//! Runs carrier extraction, proximity resolution and enrichment independently
//! per tracking partition, then segments the concatenated table once. Weighting
//! is scoped to (game, play, defender) pairings, so segmentation only starts
//! after every partition is assembled.

use chrono::Utc;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::carrier::CarrierWindowExtractor;
use crate::config::{FailurePolicy, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::io::TrackingPartition;
use crate::metrics::{PartitionFailure, PipelineReport, StageCounts};
use crate::physical::{OutcomeBook, PhysicalEnricher, PlayerDirectory};
use crate::proximity::ProximityResolver;
use crate::segmentation::{OpportunitySegmenter, OutcomeAttribution};
use crate::types::{
    FeatureFrame, Play, PlayKey, PlayerRecord, TackleOpportunity, TackleRecord, TrackingRecord,
};

/// Per-partition result of the per-play stages
#[derive(Debug, Clone, Default)]
pub struct PartitionOutput {
    pub frames: Vec<FeatureFrame>,
    pub counts: StageCounts,
    pub excluded: Vec<PlayKey>,
}

/// Final tables of a run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Every featured defender frame, sorted by game, play, frame, defender
    pub defenders: Vec<FeatureFrame>,
    /// Labeled, weighted opportunities in the same order
    pub opportunities: Vec<TackleOpportunity>,
    /// Feature columns for model fitting, in order
    pub feature_columns: Vec<String>,
    pub report: PipelineReport,
}

/// Tackle opportunity pipeline over shared play, player and outcome tables
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    plays: HashMap<PlayKey, Play>,
    players: PlayerDirectory,
    outcomes: OutcomeBook,
    segmenter: OpportunitySegmenter,
}

impl Pipeline {
    /// Index the shared tables; fails on malformed heights or duplicate keys
    pub fn new(
        config: PipelineConfig,
        plays: &[Play],
        players: &[PlayerRecord],
        tackles: &[TackleRecord],
    ) -> Result<Self> {
        config.validate()?;

        let plays_by_key: HashMap<PlayKey, Play> =
            plays.iter().map(|p| (p.key(), p.clone())).collect();
        PipelineError::check_rows("play metadata index", plays.len(), plays_by_key.len())?;

        let players = PlayerDirectory::from_records(players, &config.features)?;
        let outcomes = OutcomeBook::from_records(tackles)?;
        let segmenter = OpportunitySegmenter::new(config.segmentation.clone());

        info!(
            "Pipeline ready: {} plays, {} players, {} outcome rows",
            plays_by_key.len(),
            players.len(),
            outcomes.len()
        );

        Ok(Self { config, plays: plays_by_key, players, outcomes, segmenter })
    }

    /// Replace the outcome attribution policy
    pub fn with_attribution(mut self, attribution: Box<dyn OutcomeAttribution>) -> Self {
        self.segmenter =
            OpportunitySegmenter::with_attribution(self.config.segmentation.clone(), attribution);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Carrier windows, defender frames and features for one partition
    pub fn process_partition(&self, tracking: &[TrackingRecord]) -> Result<PartitionOutput> {
        let view = CarrierWindowExtractor::new().extract(&self.plays, tracking);
        let resolver = ProximityResolver::new(self.config.proximity.clone());
        let defenders = resolver.resolve(&view.frames, tracking)?;
        let defender_frames = defenders.len();

        let enricher = PhysicalEnricher::new(&self.players, &self.outcomes, &self.config.features);
        let frames = enricher.enrich(defenders)?;

        Ok(PartitionOutput {
            frames,
            counts: StageCounts {
                plays_seen: view.windows.len() + view.excluded.len(),
                carrier_frames: view.frames.len(),
                defender_frames,
            },
            excluded: view.excluded,
        })
    }

    fn load_and_process<P: TrackingPartition>(&self, partition: &P) -> Result<PartitionOutput> {
        let tracking = partition.load()?;
        let output = self.process_partition(&tracking)?;
        info!(
            "Partition {}: {} carrier frames, {} defender frames",
            partition.label(),
            output.counts.carrier_frames,
            output.counts.defender_frames
        );
        Ok(output)
    }

    /// Run every stage over the given partitions
    pub fn run<P: TrackingPartition>(&self, partitions: &[P]) -> Result<PipelineOutput> {
        let results: Vec<Result<PartitionOutput>> = if self.config.execution.parallel {
            partitions.par_iter().map(|p| self.load_and_process(p)).collect()
        } else {
            partitions.iter().map(|p| self.load_and_process(p)).collect()
        };

        let mut defenders = Vec::new();
        let mut counts = StageCounts::default();
        let mut excluded = Vec::new();
        let mut failures = Vec::new();

        for (partition, result) in partitions.iter().zip(results) {
            match result {
                Ok(output) => {
                    defenders.extend(output.frames);
                    counts.merge(&output.counts);
                    excluded.extend(output.excluded);
                }
                Err(e) => match self.config.execution.failure_policy {
                    FailurePolicy::Halt => {
                        return Err(PipelineError::partition(partition.label(), e));
                    }
                    FailurePolicy::Isolate => {
                        warn!("Dropping partition {}: {}", partition.label(), e);
                        failures.push(PartitionFailure {
                            partition: partition.label(),
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        defenders.sort_by_key(|f| f.frame.sort_key());
        excluded.sort();
        if !excluded.is_empty() {
            warn!("{} plays had no ball receipt event and were excluded", excluded.len());
        }

        let segmentation = self.segmenter.segment(&defenders);

        let report = PipelineReport {
            partitions_processed: partitions.len() - failures.len(),
            partitions_failed: failures,
            counts,
            plays_without_receipt: excluded,
            candidate_rows: segmentation.candidate_rows,
            opportunities: segmentation.opportunities.len(),
            label_quality: segmentation.label_quality,
            non_ambiguous_rate: segmentation.label_quality.non_ambiguous_rate(),
            attribution_policy: self.segmenter.attribution_name().to_string(),
            completed_at: Utc::now(),
        };

        info!(
            "Pipeline complete: {} defender frames, {} opportunities",
            defenders.len(),
            report.opportunities
        );

        Ok(PipelineOutput {
            defenders,
            opportunities: segmentation.opportunities,
            feature_columns: segmentation.feature_columns,
            report,
        })
    }
}
