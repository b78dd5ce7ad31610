// src/control/lane.rs

use crate::types::{BandMidpoints, LaneConfig};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneEstimate {
    /// Reference x minus frame center (px). Positive = track right of center.
    pub error: f64,
    pub is_straight: bool,
    /// X the error was computed from
    pub reference_x: f64,
    /// False when the reference band had no midpoint and the default x was used
    pub reference_found: bool,
}

pub struct LaneEstimator {
    straight_threshold_px: f64,
    default_x: Option<f64>,
}

impl LaneEstimator {
    pub fn new(config: &LaneConfig) -> Self {
        Self {
            straight_threshold_px: config.straight_threshold_px,
            default_x: config.default_x,
        }
    }

    /// The reference band is the bottom-most active band (highest index).
    pub fn estimate(&self, midpoints: &BandMidpoints, frame_width: usize) -> LaneEstimate {
        let center = frame_width as f64 / 2.0;

        let reference = midpoints
            .iter()
            .next_back()
            .and_then(|(_, m)| m.as_ref());

        let (reference_x, reference_found) = match reference {
            Some(m) => (m.x as f64, true),
            None => (self.default_x.unwrap_or(center), false),
        };

        let estimate = LaneEstimate {
            error: reference_x - center,
            is_straight: self.is_straight(midpoints),
            reference_x,
            reference_found,
        };
        debug!(
            "Lane: error={:+.1}px straight={} (reference {})",
            estimate.error,
            estimate.is_straight,
            if reference_found { "found" } else { "default" }
        );
        estimate
    }

    fn is_straight(&self, midpoints: &BandMidpoints) -> bool {
        let xs: Vec<f64> = midpoints.values().flatten().map(|m| m.x as f64).collect();
        if xs.len() < 2 {
            return true;
        }

        let first = xs[0];
        let max_dev = xs
            .iter()
            .map(|x| (x - first).abs())
            .fold(0.0f64, f64::max);
        max_dev <= self.straight_threshold_px
    }
}
