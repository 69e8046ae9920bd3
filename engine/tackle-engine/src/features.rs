//! # Tackle Features
//!
//! Kinematic and contextual features of a carrier/defender pair, in the order
//! downstream model code consumes them.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::config::FeatureConfig;
use crate::types::{DefenderFrame, PhysicalProfile, ReceiptEvent};

/// Feature columns, in model order
pub const FEATURE_COLUMNS: [&str; 11] = [
    "s_carrier",
    "p_carrier",
    "p_rel",
    "o_rel",
    "rel_height",
    "time_since_receipt",
    "sideline_dist",
    "is_caught_pass",
    "is_qb",
    "net_defenders_nearby",
    "congestion",
];

/// Angle between two headings (degrees), folded onto the shorter arc and scaled to [0, 1]
///
/// NaN in either heading gives NaN.
pub fn relative_angle(theta_carrier: f64, theta_defender: f64) -> f64 {
    let diff = (theta_defender - theta_carrier).rem_euclid(360.0);
    let folded = if diff > 180.0 { 360.0 - diff } else { diff };
    folded / 180.0
}

/// Magnitude of the difference of two vectors at relative angle `theta_rel` (in half-turns)
pub fn relative_vector_magnitude(a: f64, b: f64, theta_rel: f64) -> f64 {
    (a.powi(2) + b.powi(2) - 2.0 * a * b * (PI * theta_rel).cos()).sqrt()
}

/// Derived features for one defender frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TackleFeatures {
    pub s_carrier: f64,
    /// Carrier momentum, weight normalized
    pub p_carrier: f64,
    /// Magnitude of the relative momentum
    pub p_rel: f64,
    /// Relative body orientation
    pub o_rel: f64,
    pub rel_height: f64,
    pub time_since_receipt: f64,
    /// 1 at midfield, 0 on a sideline
    pub sideline_dist: f64,
    pub is_caught_pass: u8,
    pub is_qb: u8,
    pub net_defenders_nearby: i64,
    pub congestion: u32,
}

impl TackleFeatures {
    pub fn derive(
        frame: &DefenderFrame,
        carrier_body: &PhysicalProfile,
        defender_body: &PhysicalProfile,
        config: &FeatureConfig,
    ) -> Self {
        let carrier = &frame.carrier;
        let defender = &frame.defender;

        let p_carrier = carrier.s * (carrier_body.weight / config.weight_norm);
        let p_defender = defender.s * (defender_body.weight / config.weight_norm);
        let dir_rel = relative_angle(carrier.dir, defender.dir);

        let width = config.field_width;
        let sideline_dist = carrier.y.min(width - carrier.y) / width * 2.0;

        Self {
            s_carrier: carrier.s,
            p_carrier,
            p_rel: relative_vector_magnitude(p_carrier, p_defender, dir_rel),
            o_rel: relative_angle(carrier.o, defender.o),
            rel_height: defender_body.height_m / carrier_body.height_m,
            time_since_receipt: config.frame_interval_secs
                * (frame.frame_id - frame.window.start_frame_id) as f64,
            sideline_dist,
            is_caught_pass: (frame.window.receipt_event == ReceiptEvent::PassOutcomeCaught) as u8,
            is_qb: (carrier_body.position == "QB") as u8,
            net_defenders_nearby: frame.defenders_nearby as i64 - frame.blockers_nearby as i64,
            congestion: frame.defenders_nearby + frame.blockers_nearby,
        }
    }

    /// Feature values ordered as [`FEATURE_COLUMNS`]
    pub fn values(&self) -> [f64; FEATURE_COLUMNS.len()] {
        [
            self.s_carrier,
            self.p_carrier,
            self.p_rel,
            self.o_rel,
            self.rel_height,
            self.time_since_receipt,
            self.sideline_dist,
            self.is_caught_pass as f64,
            self.is_qb as f64,
            self.net_defenders_nearby as f64,
            self.congestion as f64,
        ]
    }

    /// Feature value by column name
    pub fn value(&self, column: &str) -> Option<f64> {
        FEATURE_COLUMNS.iter().position(|c| *c == column).map(|i| self.values()[i])
    }
}

/// Ordered feature column names as owned strings
pub fn feature_columns() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()
}
