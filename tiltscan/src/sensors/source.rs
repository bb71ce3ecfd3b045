//! Scan-line source: decoding, time window, tilt-ignore and lag adjustment.
//!
//! Every stage of the pipeline implements [`ScanLineStream`], so the tilt
//! filters and the backward-overlap filter wrap a source (or each other)
//! and are interchangeable behind a `Box<dyn ScanLineStream>`.
//!
//! # Filtering order
//!
//! | Step | Condition                         | Action          |
//! |------|-----------------------------------|-----------------|
//! | 1    | timestamp < start                 | skip            |
//! | 2    | timestamp > end                   | end of stream   |
//! | 3    | range count not 180/181           | skip            |
//! | 4    | lag adjustment (tilt re-paired)   |                 |
//! | 5    | tilt < tilt-ignore                | skip            |
//!
//! The tilt check runs after lag adjustment so it sees the tilt that is
//! actually emitted.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::core::types::ScanLine;
use crate::error::{Error, Result};
use crate::io::log::{LidarRecord, RecordReader};

/// Nominal scan-line rate used when timestamps are synthesized.
pub const LIDAR_LINE_RATE_HZ: f64 = 75.0;

/// Raw and filtered average range of the most recent line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeAverage {
    pub raw: f64,
    pub filtered: f64,
}

/// Pull-based producer of scan lines.
pub trait ScanLineStream {
    /// Next line, or `None` at end of stream.
    fn next_line(&mut self) -> Result<Option<ScanLine>>;

    /// Stage name for logs.
    fn name(&self) -> &'static str;

    /// Average ranges behind the last emitted line, for stages that compute them.
    fn last_average(&self) -> Option<RangeAverage> {
        None
    }
}

impl<S: ScanLineStream + ?Sized> ScanLineStream for Box<S> {
    fn next_line(&mut self) -> Result<Option<ScanLine>> {
        (**self).next_line()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn last_average(&self) -> Option<RangeAverage> {
        (**self).last_average()
    }
}

/// Source configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceConfig {
    /// Lines before this time (seconds since epoch) are skipped.
    /// Default: -inf
    pub start_time: f64,
    /// The stream ends at the first line after this time.
    /// Default: +inf
    pub end_time: f64,
    /// Lines with a smaller tilt (radians) are skipped.
    /// Default: 20°
    pub tilt_ignore: f64,
    /// Signed tilt/range skew in lines. Negative pairs each line's ranges
    /// with the tilt `|N|` lines earlier; positive pairs each line's ranges
    /// with the tilt `N` lines later.
    /// Default: 0
    pub lag_cycles: i32,
    /// Replace timestamps after the first line with previous + 1/75 s.
    /// Default: false
    pub smooth_time: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            start_time: f64::NEG_INFINITY,
            end_time: f64::INFINITY,
            tilt_ignore: 20f64.to_radians(),
            lag_cycles: 0,
            smooth_time: false,
        }
    }
}

/// Counters for every line the source decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Complete records read
    pub decoded: u64,
    /// Skipped for preceding the start time
    pub before_start: u64,
    /// Skipped for a range count other than 180/181
    pub invalid_count: u64,
    /// Skipped for a tilt under the ignore threshold
    pub below_tilt_ignore: u64,
    /// Lines handed downstream
    pub emitted: u64,
    /// The log ended in the middle of a record
    pub truncated: bool,
}

/// Buffer pairing tilt and range data across lines.
#[derive(Debug)]
enum LagBuffer {
    None,
    /// Tilts of the last `|N|` lines (negative lag)
    Tilts(VecDeque<f64>),
    /// The last `N` lines awaiting a later tilt (positive lag)
    Lines(VecDeque<ScanLine>),
}

/// Scan-line source over a LIDAR log.
///
/// # Example
///
/// ```ignore
/// use tiltscan::sensors::{ScanLineSource, ScanLineStream, SourceConfig};
///
/// let mut source = ScanLineSource::open("lidar.log", SourceConfig::default())?;
/// while let Some(line) = source.next_line()? {
///     println!("{:.3} {:.4} {}", line.timestamp, line.tilt, line.count());
/// }
/// ```
pub struct ScanLineSource<R> {
    reader: RecordReader<R, LidarRecord>,
    config: SourceConfig,
    lag: LagBuffer,
    last_timestamp: Option<f64>,
    finished: bool,
    stats: SourceStats,
}

impl ScanLineSource<BufReader<File>> {
    /// Open a LIDAR log.
    pub fn open(path: impl AsRef<Path>, config: SourceConfig) -> Result<Self> {
        Self::new(RecordReader::open(path)?, config)
    }
}

impl<R: Read> ScanLineSource<R> {
    /// Wrap a record reader, pre-filling the lag buffer.
    pub fn new(reader: RecordReader<R, LidarRecord>, config: SourceConfig) -> Result<Self> {
        let depth = config.lag_cycles.unsigned_abs() as usize;
        let lag = match config.lag_cycles {
            0 => LagBuffer::None,
            n if n < 0 => LagBuffer::Tilts(VecDeque::with_capacity(depth + 1)),
            _ => LagBuffer::Lines(VecDeque::with_capacity(depth + 1)),
        };

        let mut source = Self {
            reader,
            config,
            lag,
            last_timestamp: None,
            finished: false,
            stats: SourceStats::default(),
        };

        for _ in 0..depth {
            let Some(line) = source.next_decoded()? else {
                break;
            };
            match &mut source.lag {
                LagBuffer::Tilts(tilts) => tilts.push_back(line.tilt),
                LagBuffer::Lines(lines) => lines.push_back(line),
                LagBuffer::None => {}
            }
        }

        Ok(source)
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn stats(&self) -> SourceStats {
        self.stats
    }

    /// Next line inside the time window with a valid range count.
    fn next_decoded(&mut self) -> Result<Option<ScanLine>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let record = match self.reader.read_record() {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(Error::IncompleteRecord { expected, actual }) => {
                    log::debug!("Lidar log truncated: {} of {} bytes", actual, expected);
                    self.stats.truncated = true;
                    self.finished = true;
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };
            self.stats.decoded += 1;

            let timestamp = match self.last_timestamp {
                Some(prev) if self.config.smooth_time => prev + 1.0 / LIDAR_LINE_RATE_HZ,
                _ => record.timestamp_ns as f64 * 1e-9,
            };

            if timestamp < self.config.start_time {
                self.stats.before_start += 1;
                continue;
            }
            if timestamp > self.config.end_time {
                log::debug!("Reached end time at {:.3}", timestamp);
                self.finished = true;
                return Ok(None);
            }

            match record.into_scan_line() {
                Ok(mut line) => {
                    line.timestamp = timestamp;
                    self.last_timestamp = Some(timestamp);
                    return Ok(Some(line));
                }
                Err(Error::InvalidScanLine(count)) => {
                    log::trace!("Skipping line at {:.3} with {} samples", timestamp, count);
                    self.stats.invalid_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Re-pair tilt and range data according to the configured lag.
    fn apply_lag(&mut self, line: ScanLine) -> ScanLine {
        match &mut self.lag {
            LagBuffer::None => line,
            LagBuffer::Tilts(tilts) => {
                let earlier = tilts.pop_front().unwrap_or(line.tilt);
                tilts.push_back(line.tilt);
                ScanLine {
                    tilt: earlier,
                    ..line
                }
            }
            LagBuffer::Lines(lines) => {
                let tilt = line.tilt;
                let mut earlier = match lines.pop_front() {
                    Some(front) => {
                        lines.push_back(line);
                        front
                    }
                    None => line,
                };
                earlier.tilt = tilt;
                earlier
            }
        }
    }
}

impl<R: Read> ScanLineStream for ScanLineSource<R> {
    fn next_line(&mut self) -> Result<Option<ScanLine>> {
        while let Some(line) = self.next_decoded()? {
            let line = self.apply_lag(line);
            if line.tilt < self.config.tilt_ignore {
                self.stats.below_tilt_ignore += 1;
                continue;
            }
            self.stats.emitted += 1;
            return Ok(Some(line));
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "source"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::log::test_fixtures::{sweep_record, LogFixture, LINE_RATE_HZ};
    use crate::io::log::{FixedRecord, LidarRecord};
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn no_ignore() -> SourceConfig {
        SourceConfig {
            tilt_ignore: 0.0,
            ..Default::default()
        }
    }

    fn source_from(records: &[LidarRecord], config: SourceConfig) -> ScanLineSource<Cursor<Vec<u8>>> {
        let mut bytes = Vec::new();
        for rec in records {
            rec.encode(&mut bytes);
        }
        ScanLineSource::new(RecordReader::new(Cursor::new(bytes)), config).unwrap()
    }

    fn drain<S: ScanLineStream>(stream: &mut S) -> Vec<ScanLine> {
        let mut out = Vec::new();
        while let Some(line) = stream.next_line().unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn test_passes_all_lines_without_filters() {
        let fixture = LogFixture::lidar_sweep(40, 10.0);
        let mut source = ScanLineSource::open(fixture.lidar_path(), no_ignore()).unwrap();
        let lines = drain(&mut source);

        assert_eq!(lines.len(), 40);
        assert_eq!(source.stats().decoded, 40);
        assert_eq!(source.stats().emitted, 40);
        assert!(lines.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_invalid_counts_are_skipped_and_counted() {
        let records = vec![
            LidarRecord::new(1_000_000_000, 0.5, vec![100; 181]),
            LidarRecord::new(1_010_000_000, 0.5, vec![100; 179]),
            LidarRecord::new(1_020_000_000, 0.5, vec![100; 180]),
            LidarRecord::new(1_030_000_000, 0.5, vec![]),
        ];
        let mut source = source_from(&records, no_ignore());
        let lines = drain(&mut source);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].count(), 181);
        assert_eq!(lines[1].count(), 180);
        assert_eq!(source.stats().invalid_count, 2);
    }

    #[test]
    fn test_tilt_ignore_threshold() {
        let records: Vec<_> = [0.1f32, 0.5, 0.2, 0.9]
            .iter()
            .enumerate()
            .map(|(i, &tilt)| LidarRecord::new(i as u64 * 10_000_000, tilt, vec![0; 181]))
            .collect();
        let config = SourceConfig {
            tilt_ignore: 0.3,
            ..Default::default()
        };
        let mut source = source_from(&records, config);
        let tilts: Vec<f64> = drain(&mut source).iter().map(|l| l.tilt).collect();

        assert_eq!(tilts, vec![0.5f32 as f64, 0.9f32 as f64]);
        assert_eq!(source.stats().below_tilt_ignore, 2);
    }

    #[test]
    fn test_end_time_stops_iteration() {
        let records: Vec<_> = (0..10).map(|i| sweep_record(i, 0.0, 500)).collect();
        let config = SourceConfig {
            end_time: 4.5 / LINE_RATE_HZ,
            ..no_ignore()
        };
        let mut source = source_from(&records, config);
        assert_eq!(drain(&mut source).len(), 5);
        assert_eq!(source.stats().decoded, 6);
    }

    #[test]
    fn test_negative_lag_pairs_earlier_tilt() {
        let records: Vec<_> = (0..6)
            .map(|i| {
                let mut ranges = vec![0u16; 181];
                ranges[0] = i as u16;
                LidarRecord::new(i * 10_000_000, 0.5 + 0.1 * i as f32, ranges)
            })
            .collect();
        let config = SourceConfig {
            lag_cycles: -2,
            ..no_ignore()
        };
        let lines = drain(&mut source_from(&records, config));

        assert_eq!(lines.len(), 4);
        // ranges of line k+2 with the tilt of line k
        assert_eq!(lines[0].ranges[0], 2);
        assert_relative_eq!(lines[0].tilt, 0.5f32 as f64);
        assert_relative_eq!(lines[0].timestamp, 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_positive_lag_pairs_later_tilt() {
        let records: Vec<_> = (0..6)
            .map(|i| {
                let mut ranges = vec![0u16; 181];
                ranges[0] = i as u16;
                LidarRecord::new(i * 10_000_000, 0.5 + 0.1 * i as f32, ranges)
            })
            .collect();
        let config = SourceConfig {
            lag_cycles: 2,
            ..no_ignore()
        };
        let lines = drain(&mut source_from(&records, config));

        assert_eq!(lines.len(), 4);
        // ranges and time of line k with the tilt of line k+2
        assert_eq!(lines[0].ranges[0], 0);
        assert_relative_eq!(lines[0].tilt, (0.5f32 + 0.2f32) as f64, epsilon = 1e-6);
        assert_relative_eq!(lines[0].timestamp, 0.0);
    }

    #[test]
    fn test_smooth_time_synthesizes_timestamps() {
        let records = vec![
            LidarRecord::new(1_000_000_000, 0.5, vec![0; 181]),
            LidarRecord::new(1_005_000_000, 0.5, vec![0; 181]),
            LidarRecord::new(1_050_000_000, 0.5, vec![0; 181]),
        ];
        let config = SourceConfig {
            smooth_time: true,
            ..no_ignore()
        };
        let lines = drain(&mut source_from(&records, config));

        assert_relative_eq!(lines[0].timestamp, 1.0, epsilon = 1e-12);
        assert_relative_eq!(lines[1].timestamp, 1.0 + 1.0 / 75.0, epsilon = 1e-12);
        assert_relative_eq!(lines[2].timestamp, 1.0 + 2.0 / 75.0, epsilon = 1e-12);
    }

    #[test]
    fn test_truncated_log_ends_stream() {
        let mut bytes = Vec::new();
        LidarRecord::new(0, 0.5, vec![1; 181]).encode(&mut bytes);
        bytes.extend_from_slice(&[7u8; 30]);
        let mut source =
            ScanLineSource::new(RecordReader::new(Cursor::new(bytes)), no_ignore()).unwrap();

        assert_eq!(drain(&mut source).len(), 1);
        assert!(source.stats().truncated);
    }
}
