// src/control/mod.rs

pub mod drive;
pub mod lane;
pub mod pid;

pub use drive::DriveMapper;
pub use lane::{LaneEstimate, LaneEstimator};
pub use pid::{PidController, PidOutput};
