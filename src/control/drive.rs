// src/control/drive.rs

use crate::types::{DriveConfig, MotorCommand};

/// Differential drive: right = base + correction, left = base - correction,
/// both saturated to [min, max].
pub struct DriveMapper {
    base_speed: i32,
    curve_speed: Option<i32>,
    min_speed: i32,
    max_speed: i32,
    invert_steering: bool,
}

impl DriveMapper {
    pub fn new(config: &DriveConfig) -> Self {
        Self {
            base_speed: config.base_speed,
            curve_speed: config.curve_speed,
            min_speed: config.min_speed,
            max_speed: config.max_speed,
            invert_steering: config.invert_steering,
        }
    }

    /// Map a correction to motor speeds. `is_straight == false` swaps in the
    /// curve speed when one is configured.
    pub fn command(&self, correction: f64, is_straight: bool) -> MotorCommand {
        let base = match (is_straight, self.curve_speed) {
            (false, Some(curve)) => curve,
            _ => self.base_speed,
        };
        let correction = if self.invert_steering {
            -correction
        } else {
            correction
        };
        map(base, correction, self.min_speed, self.max_speed)
    }
}

pub fn map(base_speed: i32, correction: f64, min: i32, max: i32) -> MotorCommand {
    let base = base_speed as f64;
    let (lo, hi) = (min as f64, max as f64);
    MotorCommand {
        left_speed: (base - correction).clamp(lo, hi).round() as i32,
        right_speed: (base + correction).clamp(lo, hi).round() as i32,
    }
}
