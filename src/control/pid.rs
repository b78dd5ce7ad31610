// src/control/pid.rs

use crate::types::PidConfig;

/// Mutable controller memory. One per controller, never shared.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlState {
    pub integral_accumulator: f64,
    pub previous_error: f64,
    /// Unset until the first step
    pub previous_timestamp: Option<f64>,
}

/// Terms of the last step, for logging
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidOutput {
    pub correction: f64,
    pub derivative: f64,
    pub dt: f64,
}

pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    integral_limit: Option<f64>,
    state: ControlState,
}

impl PidController {
    pub fn new(config: &PidConfig) -> Self {
        Self {
            kp: config.kp,
            ki: config.ki,
            kd: config.kd,
            integral_limit: config.integral_limit,
            state: ControlState::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = ControlState::default();
    }

    /// Advance the controller to `now` (seconds). The first call behaves as
    /// `dt = 0`. A non-increasing timestamp contributes no derivative; the
    /// integral still takes `error * dt`, so a clock step backwards subtracts.
    pub fn step(&mut self, error: f64, now: f64) -> PidOutput {
        let dt = self.state.previous_timestamp.map_or(0.0, |prev| now - prev);

        self.state.integral_accumulator += error * dt;
        if let Some(limit) = self.integral_limit {
            self.state.integral_accumulator = self.state.integral_accumulator.clamp(-limit, limit);
        }

        let derivative = if dt > 0.0 {
            (error - self.state.previous_error) / dt
        } else {
            0.0
        };

        let correction =
            self.kp * error + self.ki * self.state.integral_accumulator + self.kd * derivative;

        self.state.previous_error = error;
        self.state.previous_timestamp = Some(now);

        PidOutput {
            correction,
            derivative,
            dt,
        }
    }
}
