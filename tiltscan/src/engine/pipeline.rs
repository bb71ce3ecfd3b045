//! Stage composition from a log pair to projected lines.
//!
//! ```text
//! ScanLineSource ─► [SymmetricLowPass | RecursiveLowPass] ─┬─► BackwardOverlapFilter ─► ProjectedLine
//!                                                          └─► RayProjector ──────────► ProjectedLine
//! ```

use crate::config::PipelineConfig;
use crate::core::types::{AveragingWindow, ScanLine, VehiclePose};
use crate::engine::backward::{BackwardOverlapFilter, BackwardStats};
use crate::error::Result;
use crate::sensors::gps::{PoseSource, PoseTrack};
use crate::sensors::projection::{ProjectedLine, RayProjector};
use crate::sensors::source::{RangeAverage, ScanLineSource, ScanLineStream};
use crate::sensors::tilt::{RecursiveFilter, RecursiveLowPass, SymmetricLowPass, TiltFilterKind};

/// Boxed line stage.
pub type DynLines = Box<dyn ScanLineStream>;
/// Boxed pose source.
pub type DynPoses = Box<dyn PoseSource>;

enum Stage {
    Backward(BackwardOverlapFilter<DynLines, DynPoses>),
    Direct {
        lines: DynLines,
        poses: DynPoses,
        projector: RayProjector,
    },
}

/// Line counts of a pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Lines reaching the last stage
    pub lines: u64,
    /// Lines dropped by the backward filter
    pub invalid: u64,
    /// Lines handed out
    pub emitted: u64,
}

/// Source, optional tilt filter, optional backward filter, projection.
pub struct ScanPipeline {
    stage: Stage,
    max_lines: Option<u64>,
    emitted: u64,
}

impl ScanPipeline {
    pub fn new(
        lines: DynLines,
        poses: DynPoses,
        projector: RayProjector,
        averaging: AveragingWindow,
        backward: bool,
        max_lines: Option<u64>,
    ) -> Self {
        let stage = if backward {
            Stage::Backward(BackwardOverlapFilter::new(lines, poses, projector, averaging))
        } else {
            Stage::Direct {
                lines,
                poses,
                projector,
            }
        };
        Self {
            stage,
            max_lines,
            emitted: 0,
        }
    }

    /// Open the configured logs and chain the configured stages.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let window = config.resolve_window()?;
        let averaging = config.averaging_window()?;
        let source = ScanLineSource::open(&config.input.lidar_log, config.source_config(window))?;

        let lines = tilt_stage(Box::new(source), config, averaging)?;
        let poses: DynPoses = match &config.input.gps_log {
            Some(path) => Box::new(PoseTrack::open(path, config.pose_track_config())?),
            None => Box::new(VehiclePose::identity()),
        };

        log::info!(
            "Pipeline: {}{}",
            lines.name(),
            if config.filter.backward { " -> backward-overlap" } else { "" }
        );

        let mut pipeline = Self::new(
            lines,
            poses,
            config.projector(),
            averaging,
            config.filter.backward,
            config.max_lines(),
        );
        if config.filter.backward && window.start.is_finite() {
            pipeline.poses_mut().skip_to(window.start)?;
        }
        Ok(pipeline)
    }

    fn poses_mut(&mut self) -> &mut DynPoses {
        match &mut self.stage {
            Stage::Backward(filter) => filter.poses_mut(),
            Stage::Direct { poses, .. } => poses,
        }
    }

    fn limit_reached(&self) -> bool {
        self.max_lines.is_some_and(|max| self.emitted >= max)
    }

    /// Next line with its pose and projected samples.
    pub fn next_projected(&mut self) -> Result<Option<ProjectedLine>> {
        if self.limit_reached() {
            return Ok(None);
        }

        let projected = match &mut self.stage {
            Stage::Backward(filter) => filter.next_projected()?,
            Stage::Direct {
                lines,
                poses,
                projector,
            } => match lines.next_line()? {
                Some(line) => {
                    let pose = poses.pose_at(line.timestamp)?;
                    let vertices = projector.project_line(&line, &pose);
                    Some(ProjectedLine { line, pose, vertices })
                }
                None => None,
            },
        };

        if projected.is_some() {
            self.emitted += 1;
        } else {
            log::debug!("Pipeline drained after {} lines", self.emitted);
        }
        Ok(projected)
    }

    /// Next line without projection, when no stage needs poses.
    pub fn next_line(&mut self) -> Result<Option<ScanLine>> {
        let limit_reached = self.limit_reached();
        match &mut self.stage {
            Stage::Direct { lines, .. } => {
                if limit_reached {
                    return Ok(None);
                }
                let line = lines.next_line()?;
                if line.is_some() {
                    self.emitted += 1;
                }
                Ok(line)
            }
            Stage::Backward(_) => Ok(self.next_projected()?.map(|projected| projected.line)),
        }
    }

    /// Range averages of the most recent line, if a tilt filter computed them.
    pub fn last_average(&self) -> Option<RangeAverage> {
        match &self.stage {
            Stage::Backward(filter) => filter.last_average(),
            Stage::Direct { lines, .. } => lines.last_average(),
        }
    }

    pub fn gps_error(&self) -> Option<f64> {
        match &self.stage {
            Stage::Backward(filter) => filter.poses().gps_error(),
            Stage::Direct { poses, .. } => poses.gps_error(),
        }
    }

    pub fn backward_stats(&self) -> Option<BackwardStats> {
        match &self.stage {
            Stage::Backward(filter) => Some(filter.stats()),
            Stage::Direct { .. } => None,
        }
    }

    pub fn stats(&self) -> PipelineStats {
        match self.backward_stats() {
            Some(backward) => PipelineStats {
                lines: backward.lines,
                invalid: backward.invalid,
                emitted: self.emitted,
            },
            None => PipelineStats {
                lines: self.emitted,
                invalid: 0,
                emitted: self.emitted,
            },
        }
    }
}

/// Wrap `lines` in the configured tilt filter.
pub fn tilt_stage(lines: DynLines, config: &PipelineConfig, averaging: AveragingWindow) -> Result<DynLines> {
    let filter = &config.filter;
    Ok(match filter.tilt {
        TiltFilterKind::None => lines,
        TiltFilterKind::Symmetric => Box::new(SymmetricLowPass::new(lines, filter.window_size, averaging)?),
        TiltFilterKind::Recursive => {
            let recursive = RecursiveFilter::with_order(filter.order, filter.cutoff)?;
            Box::new(RecursiveLowPass::new(lines, recursive, averaging))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeSpec;
    use crate::io::log::test_fixtures::{LogFixture, LINE_RATE_HZ};

    fn config_for(fixture: &LogFixture) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.input.lidar_log = fixture.lidar_path().to_path_buf();
        config.input.gps_log = Some(fixture.gps_path().to_path_buf());
        // fixture tilts start at 0.4 rad
        config.window.tilt_ignore_deg = 0.0;
        config
    }

    fn drain(pipeline: &mut ScanPipeline) -> Vec<ProjectedLine> {
        let mut out = Vec::new();
        while let Some(p) = pipeline.next_projected().unwrap() {
            out.push(p);
        }
        out
    }

    #[test]
    fn test_direct_projection_with_gps() {
        let fixture = LogFixture::with_gps(150, 1000.0);
        let mut pipeline = ScanPipeline::from_config(&config_for(&fixture)).unwrap();
        let lines = drain(&mut pipeline);

        assert_eq!(lines.len(), 150);
        assert_eq!(pipeline.stats().invalid, 0);
        // northbound at 1 m/s
        let last = lines.last().unwrap();
        assert!((last.pose.position.y - lines[0].pose.position.y - 149.0 / LINE_RATE_HZ).abs() < 1e-3);
        assert!(pipeline.gps_error().is_some());
    }

    #[test]
    fn test_max_lines() {
        let fixture = LogFixture::with_gps(100, 1000.0);
        let mut config = config_for(&fixture);
        config.output.max_lines = 10;
        config.filter.tilt = TiltFilterKind::Symmetric;

        let mut pipeline = ScanPipeline::from_config(&config).unwrap();
        assert_eq!(drain(&mut pipeline).len(), 10);
        assert_eq!(pipeline.stats().emitted, 10);
    }

    #[test]
    fn test_without_gps_uses_origin() {
        let fixture = LogFixture::lidar_sweep(20, 1000.0);
        let mut config = config_for(&fixture);
        config.input.gps_log = None;

        let mut pipeline = ScanPipeline::from_config(&config).unwrap();
        let lines = drain(&mut pipeline);
        assert_eq!(lines.len(), 20);
        assert!(lines.iter().all(|p| p.pose == VehiclePose::identity()));
        assert_eq!(pipeline.gps_error(), None);
    }

    #[test]
    fn test_backward_filter_counts() {
        let fixture = LogFixture::with_gps(300, 1000.0);
        let mut config = config_for(&fixture);
        config.filter.backward = true;
        config.filter.tilt = TiltFilterKind::Recursive;
        config.window.start_time = Some(TimeSpec::Epoch(1001.0));

        let mut pipeline = ScanPipeline::from_config(&config).unwrap();
        let lines = drain(&mut pipeline);
        let stats = pipeline.stats();

        assert!(stats.lines > 0);
        assert_eq!(stats.lines, stats.invalid + lines.len() as u64);
        assert!(lines.iter().all(|p| p.line.timestamp >= 1001.0));
        assert!(pipeline.backward_stats().is_some());
    }

    #[test]
    fn test_next_line_skips_projection() {
        let fixture = LogFixture::lidar_sweep(30, 1000.0);
        let mut config = config_for(&fixture);
        config.input.gps_log = None;
        config.output.max_lines = 5;

        let mut pipeline = ScanPipeline::from_config(&config).unwrap();
        let mut count = 0;
        while pipeline.next_line().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
    }
}
