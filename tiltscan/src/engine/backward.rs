//! Backward-overlap filter.
//!
//! The vehicle is assumed to drive forward while the scanner nods up and
//! down. The samples in the averaging window are projected through a shared
//! reference pose, so lines taken at different vehicle positions land in the
//! same frame. Their distances to the reference position are compared with
//! the previous valid line, sample by sample.
//!
//! # Vote
//!
//! `s1` counts the first run of samples (negative: not farther than the
//! previous line, positive: farther); `s2` counts a second run in the
//! opposite direction. A third direction change means the lines cross.
//!
//! | s1  | s2  | Class      | Valid |
//! |-----|-----|------------|-------|
//! | ≥ 0 | 0   | Forward    | yes   |
//! | < 0 | > 0 | Right turn | yes   |
//! | > 0 | < 0 | Left turn  | yes   |
//! | < 0 | 0   | Backward   | no    |
//! | crossing  || Crossing   | no    |
//!
//! The reference pose is re-anchored to the current pose at the first valid
//! line after the tilt turns from moving down to moving up.

use crate::core::types::{AveragingWindow, ScanLine, VehiclePose};
use crate::error::Result;
use crate::sensors::gps::PoseSource;
use crate::sensors::projection::{ProjectedLine, RayProjector};
use crate::sensors::source::{RangeAverage, ScanLineStream};

/// Classification of a line against the previous valid line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// First line or all samples farther from the reference
    Forward,
    /// Samples first behind, then ahead of the previous line
    RightTurn,
    /// Samples first ahead, then behind the previous line
    LeftTurn,
    /// Every sample behind the previous line
    Backward,
    /// Direction changed more than once
    Crossing,
}

impl LineClass {
    #[inline]
    pub fn is_valid(&self) -> bool {
        !matches!(self, LineClass::Backward | LineClass::Crossing)
    }
}

/// Result of the two-counter vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vote {
    pub s1: i32,
    pub s2: i32,
    pub class: LineClass,
    /// Tally states that should never occur
    pub impossible: u32,
}

/// Compare per-sample distances of the previous and current line.
pub fn vote(previous: &[f64], current: &[f64]) -> Vote {
    let (mut s1, mut s2) = (0i32, 0i32);
    let mut impossible = 0;

    for (&d1, &d2) in previous.iter().zip(current) {
        debug_assert!(
            s2 == 0 || s1.signum() == -s2.signum(),
            "vote tally ({}, {}) lost sign alternation",
            s1,
            s2
        );

        let behind = d1 >= d2;
        let crossing = if behind {
            match (s1 <= 0, s2) {
                (true, 0) => {
                    s1 -= 1;
                    false
                }
                (true, s) if s > 0 => true,
                (false, s) if s <= 0 => {
                    s2 -= 1;
                    false
                }
                _ => {
                    impossible += 1;
                    false
                }
            }
        } else {
            match (s1 >= 0, s2) {
                (true, 0) => {
                    s1 += 1;
                    false
                }
                (true, s) if s < 0 => true,
                (false, s) if s >= 0 => {
                    s2 += 1;
                    false
                }
                _ => {
                    impossible += 1;
                    false
                }
            }
        };

        if crossing {
            return Vote {
                s1,
                s2,
                class: LineClass::Crossing,
                impossible,
            };
        }
    }

    if impossible > 0 {
        log::warn!("Backward vote reached {} impossible tally states ({}, {})", impossible, s1, s2);
    }

    let class = match (s1.signum(), s2.signum()) {
        (-1, 0) => LineClass::Backward,
        (-1, 1) => LineClass::RightTurn,
        (1, -1) => LineClass::LeftTurn,
        _ => LineClass::Forward,
    };
    Vote {
        s1,
        s2,
        class,
        impossible,
    }
}

/// Line counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackwardStats {
    /// Lines examined
    pub lines: u64,
    /// Lines rejected
    pub invalid: u64,
    pub backward: u64,
    pub crossing: u64,
    pub left_turns: u64,
    pub right_turns: u64,
    pub reference_resets: u64,
    pub impossible_votes: u64,
}

/// Drops lines that sweep back over the previous valid line.
pub struct BackwardOverlapFilter<S, P> {
    inner: S,
    poses: P,
    projector: RayProjector,
    window: AveragingWindow,
    reference: Option<VehiclePose>,
    /// Tilt two lines back
    tilt1: f64,
    /// Tilt of the previous line
    tilt2: f64,
    /// Distances of the last valid line
    previous: Vec<f64>,
    /// Distances of the line just examined
    current: Vec<f64>,
    last_valid: bool,
    reset_reference: bool,
    stats: BackwardStats,
}

impl<S: ScanLineStream, P: PoseSource> BackwardOverlapFilter<S, P> {
    pub fn new(inner: S, poses: P, projector: RayProjector, window: AveragingWindow) -> Self {
        Self {
            inner,
            poses,
            projector,
            window,
            reference: None,
            tilt1: 0.0,
            tilt2: 0.0,
            previous: Vec::new(),
            current: Vec::new(),
            last_valid: false,
            reset_reference: false,
            stats: BackwardStats::default(),
        }
    }

    pub fn stats(&self) -> BackwardStats {
        self.stats
    }

    pub fn reference(&self) -> Option<VehiclePose> {
        self.reference
    }

    pub fn poses(&self) -> &P {
        &self.poses
    }

    pub fn poses_mut(&mut self) -> &mut P {
        &mut self.poses
    }

    /// Next valid line with its pose and projected samples.
    pub fn next_projected(&mut self) -> Result<Option<ProjectedLine>> {
        while let Some(line) = self.inner.next_line()? {
            self.stats.lines += 1;
            let pose = self.poses.pose_at(line.timestamp)?;
            let vertices = self.projector.project_line(&line, &pose);

            let class = self.classify(&line, &pose);
            if class.is_valid() {
                return Ok(Some(ProjectedLine {
                    line,
                    pose,
                    vertices,
                }));
            }
            self.stats.invalid += 1;
            log::trace!("Scan line {} at {:.3} is {:?}", self.stats.lines, line.timestamp, class);
        }
        Ok(None)
    }

    /// Distances of the window samples, projected through `frame`, to its position.
    fn distances(&self, line: &ScanLine, frame: &VehiclePose) -> Vec<f64> {
        self.projector
            .project_samples(line, frame, self.window.indices())
            .iter()
            .map(|v| v.point.distance(&frame.position))
            .collect()
    }

    fn classify(&mut self, line: &ScanLine, pose: &VehiclePose) -> LineClass {
        if self.last_valid {
            self.previous = std::mem::take(&mut self.current);
        }
        self.last_valid = true;

        let Some(reference) = self.reference else {
            self.reference = Some(*pose);
            self.current = self.distances(line, pose);
            self.tilt1 = line.tilt;
            self.tilt2 = line.tilt;
            return LineClass::Forward;
        };
        self.current = self.distances(line, &reference);

        let tilt = line.tilt;
        if self.tilt1 >= self.tilt2 && self.tilt2 < tilt {
            log::trace!("Tilt turn-up at {:.3}", line.timestamp);
            self.reset_reference = true;
        } else if self.tilt1 <= self.tilt2 && self.tilt2 > tilt {
            log::trace!("Tilt turn-down at {:.3}", line.timestamp);
        }

        let vote = vote(&self.previous, &self.current);
        self.stats.impossible_votes += vote.impossible as u64;
        match vote.class {
            LineClass::Backward => self.stats.backward += 1,
            LineClass::Crossing => self.stats.crossing += 1,
            LineClass::LeftTurn => self.stats.left_turns += 1,
            LineClass::RightTurn => self.stats.right_turns += 1,
            LineClass::Forward => {}
        }
        self.last_valid = vote.class.is_valid();

        self.tilt1 = self.tilt2;
        self.tilt2 = tilt;

        if self.last_valid && self.reset_reference {
            log::debug!("Reference reset at {:.3}", line.timestamp);
            self.reference = Some(*pose);
            self.current = self.distances(line, pose);
            self.reset_reference = false;
            self.stats.reference_resets += 1;
        }

        vote.class
    }
}

impl<S: ScanLineStream, P: PoseSource> ScanLineStream for BackwardOverlapFilter<S, P> {
    fn next_line(&mut self) -> Result<Option<ScanLine>> {
        Ok(self.next_projected()?.map(|projected| projected.line))
    }

    fn name(&self) -> &'static str {
        "backward-overlap"
    }

    fn last_average(&self) -> Option<RangeAverage> {
        self.inner.last_average()
    }
}
