//! # Core Types
//!
//! Source rows (plays, tracking, players, tackles) and the entities each stage
//! derives from them. Every derived entity is produced by exactly one stage and
//! only read afterwards.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::features::TackleFeatures;

pub type GameId = i64;
pub type PlayId = i64;
pub type NflId = i64;
pub type FrameId = i64;

/// Identifies a play
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayKey {
    pub game_id: GameId,
    pub play_id: PlayId,
}

/// Identifies one frame of one play
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameKey {
    pub game_id: GameId,
    pub play_id: PlayId,
    pub frame_id: FrameId,
}

/// Identifies a defender's involvement in a play
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DefenderKey {
    pub game_id: GameId,
    pub play_id: PlayId,
    pub defender_id: NflId,
}

impl fmt::Display for DefenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game {} play {} defender {}", self.game_id, self.play_id, self.defender_id)
    }
}

/// Which end zone the offense is attacking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayDirection {
    Left,
    Right,
}

impl PlayDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayDirection::Left => "left",
            PlayDirection::Right => "right",
        }
    }
}

/// Play metadata row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Play {
    pub game_id: GameId,
    pub play_id: PlayId,
    /// Player designated as the ball carrier for the play
    pub ball_carrier_id: NflId,
}

impl Play {
    pub fn key(&self) -> PlayKey {
        PlayKey { game_id: self.game_id, play_id: self.play_id }
    }
}

/// One tracking row: a player (or the ball) in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    pub game_id: GameId,
    pub play_id: PlayId,
    /// `None` for the ball marker
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub nfl_id: Option<NflId>,
    pub frame_id: FrameId,
    #[serde(default)]
    pub time: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub jersey_number: Option<u32>,
    pub club: String,
    pub play_direction: PlayDirection,
    pub x: f64,
    pub y: f64,
    /// Speed (yards/s)
    pub s: f64,
    /// Orientation (degrees)
    #[serde(deserialize_with = "na::float")]
    pub o: f64,
    /// Direction of motion (degrees)
    #[serde(deserialize_with = "na::float")]
    pub dir: f64,
    #[serde(default, deserialize_with = "na::string")]
    pub event: Option<String>,
}

impl TrackingRecord {
    pub fn play_key(&self) -> PlayKey {
        PlayKey { game_id: self.game_id, play_id: self.play_id }
    }

    pub fn frame_key(&self) -> FrameKey {
        FrameKey { game_id: self.game_id, play_id: self.play_id, frame_id: self.frame_id }
    }

    pub fn is_football(&self) -> bool {
        self.club == crate::FOOTBALL_CLUB
    }
}

/// Player attribute row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub nfl_id: NflId,
    /// Feet-inches, e.g. "6-2"
    pub height: String,
    /// Pounds
    pub weight: f64,
    pub position: String,
    #[serde(default)]
    pub display_name: String,
}

/// Outcome row for one defender on one play
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TackleRecord {
    pub game_id: GameId,
    pub play_id: PlayId,
    pub nfl_id: NflId,
    #[serde(deserialize_with = "na::flag")]
    pub tackle: bool,
    #[serde(deserialize_with = "na::flag")]
    pub assist: bool,
    #[serde(default, deserialize_with = "na::flag")]
    pub forced_fumble: bool,
    #[serde(rename = "pff_missedTackle", deserialize_with = "na::flag")]
    pub pff_missed_tackle: bool,
}

impl TackleRecord {
    pub fn key(&self) -> DefenderKey {
        DefenderKey { game_id: self.game_id, play_id: self.play_id, defender_id: self.nfl_id }
    }

    pub fn flags(&self) -> OutcomeFlags {
        OutcomeFlags {
            tackle: self.tackle,
            assist: self.assist,
            missed_tackle: self.pff_missed_tackle,
            forced_fumble: self.forced_fumble,
        }
    }
}

/// Outcome labels for a defender/play pairing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeFlags {
    pub tackle: bool,
    pub assist: bool,
    pub missed_tackle: bool,
    /// Carried through, never used for segmentation
    pub forced_fumble: bool,
}

impl OutcomeFlags {
    /// Whether any of tackle / assist / missed tackle is set
    pub fn any(&self) -> bool {
        self.tackle || self.assist || self.missed_tackle
    }

    /// Number of tackle / assist / missed tackle flags set
    pub fn count(&self) -> u32 {
        self.tackle as u32 + self.assist as u32 + self.missed_tackle as u32
    }

    /// Whether the defender completed (or assisted) the tackle
    pub fn made_contact(&self) -> bool {
        self.tackle || self.assist
    }

    /// Field-wise OR
    pub fn union(self, other: OutcomeFlags) -> OutcomeFlags {
        OutcomeFlags {
            tackle: self.tackle || other.tackle,
            assist: self.assist || other.assist,
            missed_tackle: self.missed_tackle || other.missed_tackle,
            forced_fumble: self.forced_fumble || other.forced_fumble,
        }
    }
}

/// Event tags that mark the carrier taking possession
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptEvent {
    Run,
    Handoff,
    PassOutcomeCaught,
    SnapDirect,
}

impl ReceiptEvent {
    pub const ALL: [ReceiptEvent; 4] = [
        ReceiptEvent::Run,
        ReceiptEvent::Handoff,
        ReceiptEvent::PassOutcomeCaught,
        ReceiptEvent::SnapDirect,
    ];

    /// Parse a tracking event tag
    pub fn from_event(event: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == event)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptEvent::Run => "run",
            ReceiptEvent::Handoff => "handoff",
            ReceiptEvent::PassOutcomeCaught => "pass_outcome_caught",
            ReceiptEvent::SnapDirect => "snap_direct",
        }
    }
}

impl fmt::Display for ReceiptEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame range during which the carrier holds the ball
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierWindow {
    pub game_id: GameId,
    pub play_id: PlayId,
    pub carrier_id: NflId,
    pub start_frame_id: FrameId,
    pub receipt_event: ReceiptEvent,
    pub end_frame_id: FrameId,
    pub end_event: String,
    pub x_final: f64,
}

impl CarrierWindow {
    pub fn contains(&self, frame_id: FrameId) -> bool {
        (self.start_frame_id..=self.end_frame_id).contains(&frame_id)
    }
}

/// A carrier tracking row inside its carrier window
#[derive(Debug, Clone, PartialEq)]
pub struct CarrierFrame {
    pub record: TrackingRecord,
    pub window: CarrierWindow,
    /// Speed projected onto the offense's forward direction
    pub s_downfield: f64,
}

/// Position and motion of one player in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    pub nfl_id: NflId,
    pub jersey_number: Option<u32>,
    pub club: String,
    pub x: f64,
    pub y: f64,
    pub s: f64,
    pub o: f64,
    pub dir: f64,
}

impl MotionState {
    /// Motion state of a player row; the ball marker maps to id 0
    pub fn from_record(record: &TrackingRecord) -> Self {
        Self {
            nfl_id: record.nfl_id.unwrap_or(0),
            jersey_number: record.jersey_number,
            club: record.club.clone(),
            x: record.x,
            y: record.y,
            s: record.s,
            o: record.o,
            dir: record.dir,
        }
    }

    pub fn distance_to(&self, other: &MotionState) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One opposing player relative to the carrier in one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DefenderFrame {
    pub frame_id: FrameId,
    pub play_direction: PlayDirection,
    pub window: CarrierWindow,
    pub carrier: MotionState,
    pub s_downfield: f64,
    pub defender: MotionState,
    pub dist_to_carrier: f64,
    /// Distinct carrier teammates within the nearby radius
    pub blockers_nearby: u32,
    /// Distinct opposing players within the nearby radius
    pub defenders_nearby: u32,
}

impl DefenderFrame {
    pub fn game_id(&self) -> GameId {
        self.window.game_id
    }

    pub fn play_id(&self) -> PlayId {
        self.window.play_id
    }

    pub fn key(&self) -> DefenderKey {
        DefenderKey {
            game_id: self.window.game_id,
            play_id: self.window.play_id,
            defender_id: self.defender.nfl_id,
        }
    }

    pub fn frame_key(&self) -> FrameKey {
        FrameKey {
            game_id: self.window.game_id,
            play_id: self.window.play_id,
            frame_id: self.frame_id,
        }
    }

    /// Output ordering: game, play, frame, defender
    pub fn sort_key(&self) -> (GameId, PlayId, FrameId, NflId) {
        (self.window.game_id, self.window.play_id, self.frame_id, self.defender.nfl_id)
    }
}

/// Physical attributes of a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalProfile {
    pub height_m: f64,
    pub weight: f64,
    pub position: String,
}

/// Defender frame with physical attributes, recorded outcomes and derived features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub frame: DefenderFrame,
    pub carrier_body: PhysicalProfile,
    pub defender_body: PhysicalProfile,
    /// Outcomes as recorded for the whole defender/play pairing
    pub outcome: OutcomeFlags,
    pub features: TackleFeatures,
}

/// One contiguous approach of a defender to the carrier, represented by its entry frame
#[derive(Debug, Clone, PartialEq)]
pub struct TackleOpportunity {
    /// Running segment index over the whole candidate set, starting at 1
    pub tidx: u32,
    pub entry: FeatureFrame,
    /// Outcome attributed to this opportunity
    pub outcome: OutcomeFlags,
    pub weight: f64,
}

impl TackleOpportunity {
    pub fn key(&self) -> DefenderKey {
        self.entry.frame.key()
    }
}

/// Lenient deserializers for "NA"-style cells
mod na {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
        Missing,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagValue {
        Bool(bool),
        Int(i64),
        Float(f64),
        Text(String),
    }

    /// Numeric cell where "NA" or empty becomes NaN
    pub fn float<'de, D>(de: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrText::deserialize(de)? {
            NumberOrText::Number(v) => Ok(v),
            NumberOrText::Text(t) => Ok(t.trim().parse().unwrap_or(f64::NAN)),
            NumberOrText::Missing => Ok(f64::NAN),
        }
    }

    /// Text cell where "NA" or empty becomes `None`
    pub fn string<'de, D>(de: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(de)?;
        Ok(value.filter(|v| !v.is_empty() && v != "NA"))
    }

    /// Boolean-like cell: 0/1, true/false, "NA" as false
    pub fn flag<'de, D>(de: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        match FlagValue::deserialize(de)? {
            FlagValue::Bool(b) => Ok(b),
            FlagValue::Int(i) => Ok(i != 0),
            FlagValue::Float(f) => Ok(f != 0.0 && !f.is_nan()),
            FlagValue::Text(t) => match t.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Ok(true),
                "" | "0" | "false" | "na" => Ok(false),
                other => Err(serde::de::Error::custom(format!("invalid flag value {other:?}"))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_events_parse_from_tags() {
        assert_eq!(ReceiptEvent::from_event("handoff"), Some(ReceiptEvent::Handoff));
        assert_eq!(
            ReceiptEvent::from_event("pass_outcome_caught"),
            Some(ReceiptEvent::PassOutcomeCaught)
        );
        assert_eq!(ReceiptEvent::from_event("tackle"), None);
        for event in ReceiptEvent::ALL {
            assert_eq!(ReceiptEvent::from_event(event.as_str()), Some(event));
        }
    }

    #[test]
    fn outcome_flags_ignore_forced_fumble() {
        let flags = OutcomeFlags { forced_fumble: true, ..Default::default() };
        assert!(!flags.any());
        assert_eq!(flags.count(), 0);

        let flags = OutcomeFlags { tackle: true, missed_tackle: true, ..Default::default() };
        assert!(flags.any());
        assert!(flags.made_contact());
        assert_eq!(flags.count(), 2);
    }

    #[test]
    fn window_contains_is_inclusive() {
        let window = CarrierWindow {
            game_id: 1,
            play_id: 2,
            carrier_id: 3,
            start_frame_id: 10,
            receipt_event: ReceiptEvent::Run,
            end_frame_id: 12,
            end_event: "tackle".to_string(),
            x_final: 40.0,
        };
        assert!(!window.contains(9));
        assert!(window.contains(10));
        assert!(window.contains(12));
        assert!(!window.contains(13));
    }

    #[test]
    fn tackle_record_flags_accept_json_numbers_and_bools() {
        let json = concat!(
            r#"{"gameId":1,"playId":2,"nflId":3,"#,
            r#""tackle":1,"assist":false,"pff_missedTackle":0}"#
        );
        let record: TackleRecord = serde_json::from_str(json).unwrap();
        assert!(record.tackle);
        assert!(!record.assist);
        assert!(!record.pff_missed_tackle);
        assert!(!record.forced_fumble);
        assert_eq!(record.key(), DefenderKey { game_id: 1, play_id: 2, defender_id: 3 });
    }
}
