//! # Carrier Window Extraction
//!
//! Finds, per play, the frames during which the designated ball carrier holds
//! the ball and projects the carrier's speed onto the downfield direction.

use std::collections::HashMap;
use std::f64::consts::PI;
use tracing::debug;

use crate::types::{
    CarrierFrame, CarrierWindow, Play, PlayDirection, PlayKey, ReceiptEvent, TrackingRecord,
};

/// Carrier frames for a batch of plays, plus the plays that had no receipt event
#[derive(Debug, Clone, Default)]
pub struct CarrierView {
    pub frames: Vec<CarrierFrame>,
    pub windows: Vec<CarrierWindow>,
    /// Plays whose carrier never received the ball; excluded from the view
    pub excluded: Vec<PlayKey>,
}

/// Extracts carrier windows and frames
#[derive(Debug, Clone, Default)]
pub struct CarrierWindowExtractor;

impl CarrierWindowExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Determine the possession window from one carrier's rows
    ///
    /// The end of play is the last row carrying any event tag. Possession starts at
    /// the last receipt event at or before it, so a later handoff or lateral
    /// overrides an earlier one. Returns `None` when either is missing.
    pub fn find_window(
        &self,
        play: &Play,
        carrier_rows: &[&TrackingRecord],
    ) -> Option<CarrierWindow> {
        let end = carrier_rows.iter().rev().find(|r| r.event.is_some())?;
        let end_event = end.event.clone()?;

        let (start, receipt_event) = carrier_rows
            .iter()
            .filter(|r| r.frame_id <= end.frame_id)
            .filter_map(|r| {
                r.event.as_deref().and_then(ReceiptEvent::from_event).map(|e| (*r, e))
            })
            .last()?;

        Some(CarrierWindow {
            game_id: play.game_id,
            play_id: play.play_id,
            carrier_id: play.ball_carrier_id,
            start_frame_id: start.frame_id,
            receipt_event,
            end_frame_id: end.frame_id,
            end_event,
            x_final: end.x,
        })
    }

    /// Build the carrier view for every play present in `tracking`
    ///
    /// Tracking rows of plays missing from `plays` are ignored.
    pub fn extract(
        &self,
        plays: &HashMap<PlayKey, Play>,
        tracking: &[TrackingRecord],
    ) -> CarrierView {
        let mut by_play: HashMap<PlayKey, Vec<&TrackingRecord>> = HashMap::new();
        for record in tracking {
            let Some(play) = plays.get(&record.play_key()) else { continue };
            if record.nfl_id == Some(play.ball_carrier_id) {
                by_play.entry(play.key()).or_default().push(record);
            }
        }

        let mut keys: Vec<PlayKey> = by_play.keys().copied().collect();
        keys.sort();

        let mut view = CarrierView::default();
        for key in keys {
            let play = &plays[&key];
            let mut rows = by_play.remove(&key).unwrap_or_default();
            rows.sort_by_key(|r| r.frame_id);

            let Some(window) = self.find_window(play, &rows) else {
                debug!(
                    "Play {}/{} has no receipt event for carrier {}",
                    key.game_id, key.play_id, play.ball_carrier_id
                );
                view.excluded.push(key);
                continue;
            };

            view.frames.extend(
                rows.into_iter()
                    .filter(|r| window.contains(r.frame_id))
                    .map(|r| CarrierFrame {
                        record: r.clone(),
                        window: window.clone(),
                        s_downfield: downfield_speed(r.s, r.dir, r.play_direction),
                    }),
            );
            view.windows.push(window);
        }

        view
    }
}

/// Speed component along the direction the offense is attacking
pub fn downfield_speed(s: f64, dir: f64, direction: PlayDirection) -> f64 {
    let offset = match direction {
        PlayDirection::Right => 90.0,
        PlayDirection::Left => 270.0,
    };
    s * ((dir - offset) * PI / 180.0).cos()
}
