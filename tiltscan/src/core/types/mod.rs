//! Core value types.

mod pose;
mod scan;
mod timestamped;
mod vector;

pub use pose::VehiclePose;
pub use scan::{
    bearing_angle, AveragingWindow, ScanLine, ANGLE_STEP, INVALID_RANGE, RANGE_SCALE,
    SAMPLES_FULL, SAMPLES_HALF_STEP, START_ANGLE,
};
pub use timestamped::Timestamped;
pub use vector::Vec3;
