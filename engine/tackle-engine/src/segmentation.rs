//! # Opportunity Segmentation
//!
//! Collapses each defender's time in tackle range into discrete tackle
//! opportunities, decides which opportunity a play-level outcome belongs to, and
//! weights missed-tackle opportunities.
//!
//! Outcome flags are recorded once per (game, play, defender), not per frame. A
//! defender that approaches, backs off and approaches again produces several
//! opportunities carrying the same flags; an [`OutcomeAttribution`] policy decides
//! which of them keep a tackle or assist.

use std::fmt::Debug;
use tracing::info;

use crate::config::SegmentationConfig;
use crate::features::feature_columns;
use crate::metrics::LabelQuality;
use crate::types::{FeatureFrame, OutcomeFlags, TackleOpportunity};

/// Position of a segment among its defender/play pairing's segments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentContext {
    pub tidx: u32,
    /// Highest segment index of the pairing
    pub tidx_max: u32,
    /// Number of segments of the pairing
    pub segment_count: usize,
}

impl SegmentContext {
    pub fn is_final(&self) -> bool {
        self.tidx == self.tidx_max
    }
}

/// Decides which outcomes a segment keeps from its pairing's recorded outcome
pub trait OutcomeAttribution: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn attribute(&self, recorded: OutcomeFlags, segment: &SegmentContext) -> OutcomeFlags;
}

/// Tackles and assists end the play, so only the final approach can own them
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalOpportunityOnly;

impl OutcomeAttribution for TerminalOpportunityOnly {
    fn name(&self) -> &'static str {
        "terminal_opportunity_only"
    }

    fn attribute(&self, recorded: OutcomeFlags, segment: &SegmentContext) -> OutcomeFlags {
        if segment.is_final() {
            recorded
        } else {
            OutcomeFlags { tackle: false, assist: false, ..recorded }
        }
    }
}

/// Labeled opportunities plus what downstream model code needs alongside them
#[derive(Debug, Clone)]
pub struct SegmentationOutput {
    pub opportunities: Vec<TackleOpportunity>,
    pub feature_columns: Vec<String>,
    pub label_quality: LabelQuality,
    pub candidate_rows: usize,
}

/// First frame of a contiguous in-range run
#[derive(Debug, Clone, Copy)]
struct Segment<'a> {
    tidx: u32,
    entry: &'a FeatureFrame,
}

/// Segments, labels and weights tackle opportunities
#[derive(Debug)]
pub struct OpportunitySegmenter {
    config: SegmentationConfig,
    attribution: Box<dyn OutcomeAttribution>,
}

impl OpportunitySegmenter {
    /// Segmenter using [`TerminalOpportunityOnly`]
    pub fn new(config: SegmentationConfig) -> Self {
        Self::with_attribution(config, Box::new(TerminalOpportunityOnly))
    }

    pub fn with_attribution(
        config: SegmentationConfig,
        attribution: Box<dyn OutcomeAttribution>,
    ) -> Self {
        Self { config, attribution }
    }

    pub fn attribution_name(&self) -> &'static str {
        self.attribution.name()
    }

    /// Run segmentation over the fully assembled defender table
    pub fn segment(&self, frames: &[FeatureFrame]) -> SegmentationOutput {
        let mut candidates: Vec<&FeatureFrame> = frames
            .iter()
            .filter(|f| f.frame.dist_to_carrier <= self.config.tackle_dist && f.outcome.any())
            .collect();
        candidates.sort_by_key(|f| (f.frame.key(), f.frame.frame_id));

        let segments = split_segments(&candidates);
        let label_quality = label_quality(&segments);
        if let Some(rate) = label_quality.non_ambiguous_rate() {
            info!(
                "Proportion of tackle opportunities that are non-ambiguous = {:.1}%",
                100.0 * rate
            );
        }

        let mut opportunities = Vec::with_capacity(segments.len());
        for group in segments.chunk_by(|a, b| a.entry.frame.key() == b.entry.frame.key()) {
            let tidx_max = group.iter().map(|s| s.tidx).max().unwrap_or_default();
            let attributed: Vec<(Segment<'_>, OutcomeFlags)> = group
                .iter()
                .map(|s| {
                    let ctx = SegmentContext { tidx: s.tidx, tidx_max, segment_count: group.len() };
                    (*s, self.attribution.attribute(s.entry.outcome, &ctx))
                })
                .filter(|(_, outcome)| outcome.any())
                .map(|(s, mut outcome)| {
                    if outcome.made_contact() {
                        outcome.missed_tackle = false;
                    }
                    (s, outcome)
                })
                .collect();

            let misses = attributed.iter().filter(|(_, o)| o.missed_tackle).count();
            opportunities.extend(attributed.into_iter().map(|(s, outcome)| TackleOpportunity {
                tidx: s.tidx,
                entry: s.entry.clone(),
                outcome,
                weight: miss_weight(outcome, misses),
            }));
        }

        opportunities.sort_by_key(|o| o.entry.frame.sort_key());

        info!(
            "Segmented {} candidate rows into {} tackle opportunities ({} policy)",
            candidates.len(),
            opportunities.len(),
            self.attribution.name()
        );

        SegmentationOutput {
            opportunities,
            feature_columns: feature_columns(),
            label_quality,
            candidate_rows: candidates.len(),
        }
    }
}

/// Keep the first row of every contiguous run of frames per defender/play pairing
///
/// Input must be sorted by pairing then frame. A new segment starts when the
/// pairing changes or the frame does not immediately follow the previous one.
fn split_segments<'a>(sorted: &[&'a FeatureFrame]) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    let mut tidx = 0u32;
    let mut prev = None;

    for &frame in sorted {
        let key = frame.frame.key();
        let starts_segment = match prev {
            Some((prev_key, prev_frame)) => {
                prev_key != key || frame.frame.frame_id != prev_frame + 1
            }
            None => true,
        };
        if starts_segment {
            tidx += 1;
            segments.push(Segment { tidx, entry: frame });
        }
        prev = Some((key, frame.frame.frame_id));
    }

    segments
}

fn label_quality(segments: &[Segment<'_>]) -> LabelQuality {
    let mut quality = LabelQuality::default();
    for group in segments.chunk_by(|a, b| a.entry.frame.key() == b.entry.frame.key()) {
        let recorded =
            group.iter().fold(OutcomeFlags::default(), |acc, s| acc.union(s.entry.outcome));
        quality.keys += 1;
        if group.len() == 1 && recorded.count() == 1 {
            quality.non_ambiguous_keys += 1;
        }
    }
    quality
}

/// Missed-tackle opportunities of a pairing share a total weight of one
fn miss_weight(outcome: OutcomeFlags, misses: usize) -> f64 {
    if outcome.missed_tackle && misses > 0 {
        1.0 / misses as f64
    } else {
        1.0
    }
}
