//! # Physical Enrichment
//!
//! Joins player attributes onto both sides of each defender frame, attaches the
//! recorded tackle outcomes, and derives the tackle features.

use std::collections::HashMap;

use crate::config::FeatureConfig;
use crate::error::{PipelineError, Result};
use crate::features::TackleFeatures;
use crate::types::{
    DefenderFrame, DefenderKey, FeatureFrame, NflId, OutcomeFlags, PhysicalProfile, PlayerRecord,
    TackleRecord,
};

/// Parse a "F-I" height into meters
pub fn parse_height(nfl_id: NflId, raw: &str, meters_per_foot: f64) -> Result<f64> {
    let malformed = || PipelineError::HeightFormat { nfl_id, raw: raw.to_string() };

    let (feet, inches) = raw.trim().split_once('-').ok_or_else(malformed)?;
    let feet: u32 = feet.parse().map_err(|_| malformed())?;
    let inches: u32 = inches.parse().map_err(|_| malformed())?;

    Ok((feet as f64 + inches as f64 / 12.0) * meters_per_foot)
}

/// Physical attributes by player id
#[derive(Debug, Clone, Default)]
pub struct PlayerDirectory {
    profiles: HashMap<NflId, PhysicalProfile>,
}

impl PlayerDirectory {
    /// Build the directory, failing on the first malformed height
    pub fn from_records(players: &[PlayerRecord], config: &FeatureConfig) -> Result<Self> {
        let profiles = players
            .iter()
            .map(|p| {
                let height_m = parse_height(p.nfl_id, &p.height, config.meters_per_foot)?;
                let profile =
                    PhysicalProfile { height_m, weight: p.weight, position: p.position.clone() };
                Ok((p.nfl_id, profile))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self { profiles })
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Look up a player; absent players are an error, never defaulted
    pub fn profile(&self, nfl_id: NflId) -> Result<&PhysicalProfile> {
        self.profiles.get(&nfl_id).ok_or(PipelineError::UnknownPlayer { nfl_id })
    }
}

/// Recorded outcomes by (game, play, defender)
#[derive(Debug, Clone, Default)]
pub struct OutcomeBook {
    outcomes: HashMap<DefenderKey, OutcomeFlags>,
}

impl OutcomeBook {
    /// Index the tackles table; a key may appear only once
    pub fn from_records(tackles: &[TackleRecord]) -> Result<Self> {
        let mut outcomes = HashMap::with_capacity(tackles.len());
        for record in tackles {
            if outcomes.insert(record.key(), record.flags()).is_some() {
                return Err(PipelineError::DuplicateOutcome { key: record.key() });
            }
        }
        Ok(Self { outcomes })
    }

    /// Outcome for a defender on a play; unrecorded pairings have no outcome
    pub fn outcome(&self, key: &DefenderKey) -> OutcomeFlags {
        self.outcomes.get(key).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Enriches defender frames into feature frames
#[derive(Debug, Clone, Copy)]
pub struct PhysicalEnricher<'a> {
    players: &'a PlayerDirectory,
    outcomes: &'a OutcomeBook,
    config: &'a FeatureConfig,
}

impl<'a> PhysicalEnricher<'a> {
    pub fn new(
        players: &'a PlayerDirectory,
        outcomes: &'a OutcomeBook,
        config: &'a FeatureConfig,
    ) -> Self {
        Self { players, outcomes, config }
    }

    pub fn enrich(&self, frames: Vec<DefenderFrame>) -> Result<Vec<FeatureFrame>> {
        let n_pre_merge = frames.len();
        let enriched = frames
            .into_iter()
            .map(|frame| self.enrich_one(frame))
            .collect::<Result<Vec<_>>>()?;
        PipelineError::check_rows("physical attribute merge", n_pre_merge, enriched.len())?;
        Ok(enriched)
    }

    fn enrich_one(&self, frame: DefenderFrame) -> Result<FeatureFrame> {
        let carrier_body = self.players.profile(frame.carrier.nfl_id)?.clone();
        let defender_body = self.players.profile(frame.defender.nfl_id)?.clone();
        let outcome = self.outcomes.outcome(&frame.key());
        let features = TackleFeatures::derive(&frame, &carrier_body, &defender_body, self.config);

        Ok(FeatureFrame { frame, carrier_body, defender_body, outcome, features })
    }
}
