//! Pipeline configuration.
//!
//! Loaded from TOML; every section is optional. Command-line flags override
//! individual values after loading.
//!
//! ```toml
//! [input]
//! lidar_log = "lidar.log"
//! gps_log = "gps.log"
//!
//! [window]
//! start_time = "2005-10-08 09:12:30"
//! end_time = 1128788000.5
//! tilt_ignore_deg = 20.0
//!
//! [filter]
//! tilt = "recursive"
//! order = 4
//! cutoff = 0.02
//! backward = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, TimeZone};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::core::types::{AveragingWindow, Vec3};
use crate::error::{Error, Result};
use crate::io::log::{log_time_range, LidarRecord, TimeRange};
use crate::sensors::gps::PoseTrackConfig;
use crate::sensors::projection::RayProjector;
use crate::sensors::source::SourceConfig;
use crate::sensors::tilt::TiltFilterKind;

/// Local time format accepted for window bounds.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub window: WindowConfig,
    pub filter: FilterConfig,
    pub gps: GpsConfig,
    pub projection: ProjectionConfig,
    pub output: OutputConfig,
}

/// Log file locations
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub lidar_log: PathBuf,
    /// Without a GPS log lines are projected from a fixed pose at the origin
    pub gps_log: Option<PathBuf>,
}

/// A window bound: local time string or epoch seconds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TimeSpec {
    Epoch(f64),
    Local(String),
}

impl TimeSpec {
    pub fn to_epoch(&self) -> Result<f64> {
        match self {
            TimeSpec::Epoch(t) => Ok(*t),
            TimeSpec::Local(text) => parse_time(text),
        }
    }
}

/// Parse `YYYY-MM-DD hh:mm:ss` in local time, or a plain number of epoch
/// seconds.
pub fn parse_time(text: &str) -> Result<f64> {
    let text = text.trim();
    if let Ok(t) = text.parse::<f64>() {
        return Ok(t);
    }

    let naive = NaiveDateTime::parse_from_str(text, TIME_FORMAT)
        .map_err(|_| Error::InvalidTime(text.to_string()))?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| Error::InvalidTime(text.to_string()))?;
    Ok(local.timestamp() as f64)
}

/// Time window and line selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub start_time: Option<TimeSpec>,
    pub end_time: Option<TimeSpec>,
    /// Lines tilted below this are dropped (default: 20)
    pub tilt_ignore_deg: f64,
    /// Averaging window left edge, degrees from straight ahead (default: -15)
    pub left_angle_deg: i32,
    /// Averaging window right edge (default: 15)
    pub right_angle_deg: i32,
    /// Cycles tilt lags range; negative: range lags tilt (default: 0)
    pub lag_cycles: i32,
    /// Replace timestamps by a nominal 75 Hz clock (default: false)
    pub smooth_lidar_time: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start_time: None,
            end_time: None,
            tilt_ignore_deg: 20.0,
            left_angle_deg: -15,
            right_angle_deg: 15,
            lag_cycles: 0,
            smooth_lidar_time: false,
        }
    }
}

/// Tilt filtering
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    pub tilt: TiltFilterKind,
    /// Hamming window size, odd (default: 7)
    pub window_size: usize,
    /// Recursive filter order (default: 4)
    pub order: usize,
    /// Cutoff as a fraction of the line rate (default: 0.02)
    pub cutoff: f64,
    /// Drop lines sweeping back over the previous line (default: false)
    pub backward: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            tilt: TiltFilterKind::None,
            window_size: 7,
            order: 4,
            cutoff: 0.02,
            backward: false,
        }
    }
}

/// GPS pose track options
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GpsConfig {
    pub force_zero_z: bool,
    pub check_status: bool,
    pub heading_from_motion: bool,
    /// Size vehicle markers by the GPS error instead of a fixed width
    pub show_error: bool,
}

impl Default for GpsConfig {
    fn default() -> Self {
        let track = PoseTrackConfig::default();
        Self {
            force_zero_z: track.force_zero_z,
            check_status: track.check_status,
            heading_from_motion: track.heading_from_motion,
            show_error: false,
        }
    }
}

/// Projection and meshing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Scanner position relative to the antenna, meters
    pub scanner_offset: [f64; 3],
    /// Longest triangle edge kept in meshes, meters (default: 2.0)
    pub max_edge_length: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            scanner_offset: [0.0; 3],
            max_edge_length: crate::engine::mesh::DEFAULT_MAX_EDGE,
        }
    }
}

/// Per-line fields printed by the `lines` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputField {
    Line,
    Timestamp,
    Tilt,
    Angle,
    DeltaTimestamp,
    DeltaTilt,
    DeltaAngle,
    Count,
    Ranges,
    Avg,
    FilteredAvg,
}

/// Output selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub fields: Vec<OutputField>,
    /// Stop after this many lines; 0 = no limit
    pub max_lines: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fields: vec![OutputField::Timestamp, OutputField::Tilt, OutputField::Count],
            max_lines: 0,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::file_open(path, e))?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.averaging_window()?;
        if !self.window.tilt_ignore_deg.is_finite() {
            return Err(Error::Config(format!(
                "tilt_ignore_deg must be finite, got {}",
                self.window.tilt_ignore_deg
            )));
        }
        if self.projection.max_edge_length <= 0.0 {
            return Err(Error::Config("max_edge_length must be positive".into()));
        }
        Ok(())
    }

    pub fn averaging_window(&self) -> Result<AveragingWindow> {
        AveragingWindow::new(self.window.left_angle_deg, self.window.right_angle_deg)
    }

    pub fn max_lines(&self) -> Option<u64> {
        (self.output.max_lines > 0).then_some(self.output.max_lines)
    }

    /// Configured window with unset bounds open.
    pub fn requested_window(&self) -> Result<TimeRange> {
        let start = match &self.window.start_time {
            Some(bound) => bound.to_epoch()?,
            None => f64::NEG_INFINITY,
        };
        let end = match &self.window.end_time {
            Some(bound) => bound.to_epoch()?,
            None => f64::INFINITY,
        };
        Ok(TimeRange { start, end })
    }

    /// Configured window clamped to the lidar log's time range.
    pub fn resolve_window(&self) -> Result<TimeRange> {
        let requested = self.requested_window()?;
        let Some(log_range) = log_time_range::<LidarRecord>(&self.input.lidar_log)? else {
            log::info!("Lidar log {} is empty", self.input.lidar_log.display());
            return Ok(requested);
        };
        Ok(clamp_window(requested, log_range))
    }

    pub fn source_config(&self, window: TimeRange) -> SourceConfig {
        SourceConfig {
            start_time: window.start,
            end_time: window.end,
            tilt_ignore: self.window.tilt_ignore_deg.to_radians(),
            lag_cycles: self.window.lag_cycles,
            smooth_time: self.window.smooth_lidar_time,
        }
    }

    pub fn pose_track_config(&self) -> PoseTrackConfig {
        PoseTrackConfig {
            force_zero_z: self.gps.force_zero_z,
            check_status: self.gps.check_status,
            heading_from_motion: self.gps.heading_from_motion,
        }
    }

    pub fn projector(&self) -> RayProjector {
        RayProjector::new(Vec3::from_array(self.projection.scanner_offset))
    }
}

/// Fit `requested` to `log_range`. A bound outside the log falls back to the
/// log bound on the same side, so a start after the end of the log still
/// covers the whole log.
pub fn clamp_window(requested: TimeRange, log_range: TimeRange) -> TimeRange {
    let mut window = requested;
    if !log_range.contains(window.start) {
        window.start = log_range.start;
        if requested.start.is_finite() {
            log::info!("Start time {:.3} outside log, using {:.3}", requested.start, window.start);
        }
    }
    if !log_range.contains(window.end) {
        window.end = log_range.end;
        if requested.end.is_finite() {
            log::info!("End time {:.3} outside log, using {:.3}", requested.end, window.end);
        }
    }
    window
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::log::test_fixtures::LogFixture;

    #[test]
    fn test_defaults_from_empty_file() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config.window.tilt_ignore_deg, 20.0);
        assert_eq!(config.filter.window_size, 7);
        assert_eq!(config.filter.order, 4);
        assert_eq!(config.filter.tilt, TiltFilterKind::None);
        assert!(config.gps.force_zero_z);
        assert_eq!(config.max_lines(), None);
        assert_eq!(config.averaging_window().unwrap(), AveragingWindow::new(-15, 15).unwrap());
    }

    #[test]
    fn test_parse_sections() {
        let text = r#"
            [input]
            lidar_log = "a.log"
            gps_log = "b.log"

            [window]
            start_time = 1000.5
            end_time = "2005-10-08 09:12:30"
            lag_cycles = -3

            [filter]
            tilt = "recursive"
            cutoff = 0.05

            [output]
            fields = ["timestamp", "filtered-avg"]
            max_lines = 10
        "#;
        let config: PipelineConfig = toml::from_str(text).unwrap();
        assert_eq!(config.input.gps_log, Some(PathBuf::from("b.log")));
        assert_eq!(config.window.start_time, Some(TimeSpec::Epoch(1000.5)));
        assert_eq!(config.window.end_time, Some(TimeSpec::Local("2005-10-08 09:12:30".into())));
        assert_eq!(config.window.lag_cycles, -3);
        assert_eq!(config.filter.tilt, TiltFilterKind::Recursive);
        assert_eq!(config.output.fields, vec![OutputField::Timestamp, OutputField::FilteredAvg]);
        assert_eq!(config.max_lines(), Some(10));
    }

    #[test]
    fn test_parse_time() {
        let expected = Local.with_ymd_and_hms(2005, 7, 15, 16, 21, 1).unwrap().timestamp() as f64;
        assert_eq!(parse_time("2005-07-15 16:21:01").unwrap(), expected);
        assert_eq!(parse_time("1121444461.25").unwrap(), 1121444461.25);
        assert!(matches!(parse_time("yesterday"), Err(Error::InvalidTime(_))));
    }

    #[test]
    fn test_invalid_angles_rejected() {
        let mut config = PipelineConfig::default();
        config.window.left_angle_deg = 10;
        config.window.right_angle_deg = -10;
        assert!(matches!(config.validate(), Err(Error::InvalidAngleRange { .. })));
    }

    #[test]
    fn test_clamp_window() {
        let log = TimeRange { start: 100.0, end: 200.0 };
        let w = clamp_window(TimeRange { start: 50.0, end: 150.0 }, log);
        assert_eq!((w.start, w.end), (100.0, 150.0));

        let w = clamp_window(TimeRange { start: f64::NEG_INFINITY, end: f64::INFINITY }, log);
        assert_eq!((w.start, w.end), (100.0, 200.0));
    }

    #[test]
    fn test_clamp_window_resets_bounds_past_the_log() {
        let log = TimeRange { start: 100.0, end: 200.0 };
        let w = clamp_window(TimeRange { start: 250.0, end: 300.0 }, log);
        assert_eq!((w.start, w.end), (100.0, 200.0));

        let w = clamp_window(TimeRange { start: 120.0, end: 50.0 }, log);
        assert_eq!((w.start, w.end), (120.0, 200.0));
    }

    #[test]
    fn test_resolve_window_against_log() {
        let fixture = LogFixture::lidar_sweep(75, 1000.0);
        let mut config = PipelineConfig::default();
        config.input.lidar_log = fixture.lidar_path().to_path_buf();
        config.window.end_time = Some(TimeSpec::Epoch(5000.0));

        let window = config.resolve_window().unwrap();
        assert!((window.start - 1000.0).abs() < 1e-6);
        assert!((window.end - (1000.0 + 74.0 / 75.0)).abs() < 1e-6);
    }

    #[test]
    fn test_source_config_in_radians() {
        let config = PipelineConfig::default();
        let source = config.source_config(TimeRange { start: 1.0, end: 2.0 });
        assert!((source.tilt_ignore - 20f64.to_radians()).abs() < 1e-12);
        assert_eq!(source.start_time, 1.0);
    }
}
