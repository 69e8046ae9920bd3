//! # Proximity & Support Resolution
//!
//! Pairs every carrier frame with all other rows in the same frame, keeps the
//! opposing players as defender frames, and attaches how many teammates and
//! opponents surround the carrier.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

use crate::config::ProximityConfig;
use crate::error::{PipelineError, Result};
use crate::types::{CarrierFrame, DefenderFrame, FrameKey, MotionState, NflId, TrackingRecord};

/// Carrier row joined with one other row of the same frame
#[derive(Debug, Clone)]
struct PairedRow<'a> {
    carrier: &'a CarrierFrame,
    other: MotionState,
    dist_to_carrier: f64,
}

impl PairedRow<'_> {
    fn frame_key(&self) -> FrameKey {
        self.carrier.record.frame_key()
    }

    fn is_teammate(&self) -> bool {
        self.other.club == self.carrier.record.club
    }

    fn is_self(&self) -> bool {
        Some(self.other.nfl_id) == self.carrier.record.nfl_id
    }

    fn is_opponent(&self) -> bool {
        !self.is_teammate() && self.other.club != crate::FOOTBALL_CLUB
    }
}

/// Resolves defender frames and support counts
#[derive(Debug, Clone)]
pub struct ProximityResolver {
    config: ProximityConfig,
}

impl ProximityResolver {
    pub fn new(config: ProximityConfig) -> Self {
        Self { config }
    }

    /// Build the defender table for the given carrier frames
    pub fn resolve(
        &self,
        carriers: &[CarrierFrame],
        tracking: &[TrackingRecord],
    ) -> Result<Vec<DefenderFrame>> {
        let wanted: HashSet<FrameKey> = carriers.iter().map(|c| c.record.frame_key()).collect();
        let mut by_frame: HashMap<FrameKey, Vec<&TrackingRecord>> = HashMap::new();
        for record in tracking {
            let key = record.frame_key();
            if wanted.contains(&key) {
                by_frame.entry(key).or_default().push(record);
            }
        }

        let others: Vec<PairedRow<'_>> = carriers
            .iter()
            .flat_map(|carrier| {
                let carrier_state = MotionState::from_record(&carrier.record);
                by_frame
                    .get(&carrier.record.frame_key())
                    .into_iter()
                    .flatten()
                    .map(move |record| {
                        let other = MotionState::from_record(record);
                        let dist_to_carrier = carrier_state.distance_to(&other);
                        PairedRow { carrier, other, dist_to_carrier }
                    })
            })
            .collect();

        let support =
            self.count_nearby(others.iter().filter(|p| p.is_teammate() && !p.is_self()));
        let others =
            attach_counts(others, &support, PairedRow::frame_key, "carrier support merge")?;

        let defenders: Vec<(PairedRow<'_>, u32)> =
            others.into_iter().filter(|(p, _)| p.is_opponent()).collect();
        let opposition = self.count_nearby(defenders.iter().map(|(p, _)| p));
        let defenders = attach_counts(
            defenders,
            &opposition,
            |(p, _)| p.frame_key(),
            "defender support merge",
        )?;

        debug!(
            "Resolved {} defender frames from {} carrier frames",
            defenders.len(),
            carriers.len()
        );

        Ok(defenders
            .into_iter()
            .map(|((pair, blockers_nearby), defenders_nearby)| DefenderFrame {
                frame_id: pair.carrier.record.frame_id,
                play_direction: pair.carrier.record.play_direction,
                window: pair.carrier.window.clone(),
                carrier: MotionState::from_record(&pair.carrier.record),
                s_downfield: pair.carrier.s_downfield,
                defender: pair.other,
                dist_to_carrier: pair.dist_to_carrier,
                blockers_nearby,
                defenders_nearby,
            })
            .collect())
    }

    /// Distinct players strictly inside the nearby radius, per frame
    fn count_nearby<'p, 'a: 'p>(
        &self,
        rows: impl Iterator<Item = &'p PairedRow<'a>>,
    ) -> Vec<(FrameKey, u32)> {
        let mut nearby: BTreeMap<FrameKey, BTreeSet<NflId>> = BTreeMap::new();
        for row in rows.filter(|r| r.dist_to_carrier < self.config.nearby_radius) {
            nearby.entry(row.frame_key()).or_default().insert(row.other.nfl_id);
        }
        nearby.into_iter().map(|(key, ids)| (key, ids.len() as u32)).collect()
    }
}

/// Left-join per-frame counts onto rows, defaulting to zero
///
/// The join must be 1:1 on the frame key: duplicate count groups or count groups
/// that match no row are integrity failures.
fn attach_counts<T>(
    rows: Vec<T>,
    counts: &[(FrameKey, u32)],
    key: impl Fn(&T) -> FrameKey,
    stage: &'static str,
) -> Result<Vec<(T, u32)>> {
    let lookup: HashMap<FrameKey, u32> = counts.iter().copied().collect();
    PipelineError::check_rows(stage, counts.len(), lookup.len())?;

    let n_pre_merge = rows.len();
    let mut matched: HashSet<FrameKey> = HashSet::with_capacity(lookup.len());
    let joined: Vec<(T, u32)> = rows
        .into_iter()
        .map(|row| {
            let k = key(&row);
            let count = match lookup.get(&k) {
                Some(&c) => {
                    matched.insert(k);
                    c
                }
                None => 0,
            };
            (row, count)
        })
        .collect();

    PipelineError::check_rows(stage, lookup.len(), matched.len())?;
    PipelineError::check_rows(stage, n_pre_merge, joined.len())?;
    Ok(joined)
}
