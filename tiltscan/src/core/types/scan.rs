//! Scan line value type and the sweep geometry of one line.

use std::f64::consts::{FRAC_PI_2, TAU};

use crate::error::{Error, Result};

/// Range samples at or above this value carry no return.
pub const INVALID_RANGE: u16 = 8183;

/// Range sample units to meters.
pub const RANGE_SCALE: f64 = 0.01;

/// Bearing of the first sample of a full (181 sample) line.
pub const START_ANGLE: f64 = -FRAC_PI_2;

/// Bearing increment between samples (1 degree).
pub const ANGLE_STEP: f64 = TAU / 360.0;

/// Sample count of a line whose first sample sits exactly at [`START_ANGLE`].
pub const SAMPLES_FULL: usize = 181;

/// Sample count of a line whose sweep is offset by half a step.
pub const SAMPLES_HALF_STEP: usize = 180;

/// Bearing of sample `index` in a line of `count` samples.
///
/// # Example
/// ```
/// use tiltscan::core::types::{bearing_angle, START_ANGLE, ANGLE_STEP};
///
/// assert_eq!(bearing_angle(181, 0), START_ANGLE);
/// assert_eq!(bearing_angle(180, 0), START_ANGLE + ANGLE_STEP / 2.0);
/// ```
#[inline]
pub fn bearing_angle(count: usize, index: usize) -> f64 {
    let first = if count == SAMPLES_HALF_STEP {
        START_ANGLE + ANGLE_STEP / 2.0
    } else {
        START_ANGLE
    };
    first + index as f64 * ANGLE_STEP
}

/// One sweep of range samples at a single tilt angle.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanLine {
    /// Seconds since epoch
    pub timestamp: f64,
    /// Raw tilt in radians (0 = straight down, π/2 = straight ahead)
    pub tilt: f64,
    /// Range samples in centimeters
    pub ranges: Vec<u16>,
}

impl ScanLine {
    /// Build a line, rejecting sample counts other than 180 or 181.
    pub fn new(timestamp: f64, tilt: f64, ranges: Vec<u16>) -> Result<Self> {
        match ranges.len() {
            SAMPLES_HALF_STEP | SAMPLES_FULL => Ok(Self {
                timestamp,
                tilt,
                ranges,
            }),
            n => Err(Error::InvalidScanLine(n as u16)),
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.ranges.len()
    }

    /// Bearing of sample `index` of this line.
    #[inline]
    pub fn bearing(&self, index: usize) -> f64 {
        bearing_angle(self.count(), index)
    }

    /// Tilt re-expressed with "down" as reference, as used for projection.
    #[inline]
    pub fn projection_tilt(&self) -> f64 {
        std::f64::consts::PI - self.tilt
    }
}

/// Angular sub-range of a line used for per-line average ranges.
///
/// Angles are degrees relative to straight ahead, negative to the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AveragingWindow {
    start: usize,
    end: usize,
}

impl AveragingWindow {
    pub fn new(left_deg: i32, right_deg: i32) -> Result<Self> {
        let start_angle = 90 + left_deg;
        let end_angle = 90 + right_deg;
        let start = if start_angle > 1 { (start_angle - 1) as usize } else { 0 };
        let end = if end_angle < 180 { end_angle.max(0) as usize } else { 179 };

        if start >= end {
            return Err(Error::InvalidAngleRange {
                left: left_deg,
                right: right_deg,
            });
        }
        Ok(Self { start, end })
    }

    /// Sample index range `[start, end)`.
    #[inline]
    pub fn indices(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    /// Mean of the samples in the window. Invalid returns are included as-is.
    pub fn average(&self, ranges: &[u16]) -> f64 {
        let end = self.end.min(ranges.len());
        if end <= self.start {
            return 0.0;
        }
        let sum: f64 = ranges[self.start..end].iter().map(|&r| r as f64).sum();
        sum / (end - self.start) as f64
    }
}

impl Default for AveragingWindow {
    /// ±20° about straight ahead.
    fn default() -> Self {
        Self { start: 69, end: 110 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scan_line_rejects_bad_counts() {
        assert!(ScanLine::new(0.0, 0.0, vec![0; 181]).is_ok());
        assert!(ScanLine::new(0.0, 0.0, vec![0; 180]).is_ok());
        assert!(matches!(
            ScanLine::new(0.0, 0.0, vec![0; 179]),
            Err(Error::InvalidScanLine(179))
        ));
    }

    #[test]
    fn test_bearing_sweep() {
        assert_eq!(bearing_angle(181, 0), -FRAC_PI_2);
        assert_eq!(bearing_angle(180, 0), -FRAC_PI_2 + std::f64::consts::PI / 360.0);
        assert_relative_eq!(bearing_angle(181, 180), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_averaging_window_indices() {
        assert_eq!(AveragingWindow::new(-20, 20).unwrap().indices(), 69..110);
        assert_eq!(AveragingWindow::default(), AveragingWindow::new(-20, 20).unwrap());
        assert_eq!(AveragingWindow::new(-90, 90).unwrap().indices(), 0..179);
        assert!(AveragingWindow::new(10, -10).is_err());
    }

    #[test]
    fn test_average_over_window() {
        let window = AveragingWindow::new(-1, 1).unwrap();
        let mut ranges = vec![0u16; 181];
        ranges[88] = 300;
        ranges[89] = 600;
        ranges[90] = 1000;
        assert_relative_eq!(window.average(&ranges), 1900.0 / 3.0);
    }
}
