//! Test fixtures for generating synthetic LIDAR and GPS logs.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::types::{GpsRecord, LidarRecord, PositionType};
use super::writer::LogWriter;

/// Nominal scan-line rate of the synthetic logs.
pub const LINE_RATE_HZ: f64 = 75.0;

/// Temporary directory holding synthetic logs.
///
/// Files are removed when the fixture is dropped.
pub struct LogFixture {
    temp_dir: TempDir,
    lidar_path: PathBuf,
    gps_path: PathBuf,
}

impl LogFixture {
    fn empty() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let lidar_path = temp_dir.path().join("lidar.log");
        let gps_path = temp_dir.path().join("gps.log");
        Self {
            temp_dir,
            lidar_path,
            gps_path,
        }
    }

    /// `count` lines at 75 Hz starting at `start` seconds.
    ///
    /// Tilt follows a triangle wave between 0.4 and 1.2 rad with a period
    /// of 20 lines. Every sample reads 10 m.
    pub fn lidar_sweep(count: usize, start: f64) -> Self {
        let fixture = Self::empty();
        fixture.write_lidar((0..count).map(|i| sweep_record(i, start, 1000)));
        fixture
    }

    /// Lidar sweep plus a vehicle driving north at 1 m/s, GPS at 20 Hz.
    pub fn with_gps(count: usize, start: f64) -> Self {
        let fixture = Self::lidar_sweep(count, start);
        let duration = count as f64 / LINE_RATE_HZ + 1.0;
        let gps_count = (duration * 20.0) as usize + 1;
        fixture.write_gps((0..gps_count).map(|i| {
            let t = start - 0.5 + i as f64 * 0.05;
            northbound_record(t, t - start)
        }));
        fixture
    }

    /// Overwrite the lidar log.
    pub fn write_lidar(&self, records: impl IntoIterator<Item = LidarRecord>) {
        let mut writer = LogWriter::create(&self.lidar_path).expect("Failed to create lidar log");
        for rec in records {
            writer.write(&rec).expect("Failed to write lidar record");
        }
        writer.finish().expect("Failed to finish lidar log");
    }

    /// Overwrite the GPS log.
    pub fn write_gps(&self, records: impl IntoIterator<Item = GpsRecord>) {
        let mut writer = LogWriter::create(&self.gps_path).expect("Failed to create GPS log");
        for rec in records {
            writer.write(&rec).expect("Failed to write GPS record");
        }
        writer.finish().expect("Failed to finish GPS log");
    }

    pub fn lidar_path(&self) -> &Path {
        &self.lidar_path
    }

    pub fn gps_path(&self) -> &Path {
        &self.gps_path
    }

    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Line `i` of the synthetic sweep with constant range `range_cm`.
pub fn sweep_record(i: usize, start: f64, range_cm: u16) -> LidarRecord {
    let phase = (i % 20) as f64;
    let tilt = if phase < 10.0 {
        0.4 + 0.08 * phase
    } else {
        1.2 - 0.08 * (phase - 10.0)
    };
    let t = start + i as f64 / LINE_RATE_HZ;
    let mut rec = LidarRecord::new(secs_to_ns(t), tilt as f32, vec![range_cm; 181]);
    rec.scan_index = (i % 256) as u8;
    rec
}

/// Level vehicle at `north` meters heading north.
pub fn northbound_record(t: f64, north: f64) -> GpsRecord {
    GpsRecord {
        timestamp_ns: secs_to_ns(t),
        position_type: 64,
        ned: [north, 0.0, 0.0],
        uncertainty: [0.03, 0.04, 0.1],
        roll_pitch_yaw: [0.0, -180.0, -90.0],
        ..Default::default()
    }
}

pub fn secs_to_ns(t: f64) -> u64 {
    (t * 1e9).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_northbound_record_is_precise() {
        let rec = northbound_record(0.0, 0.0);
        assert_eq!(rec.position_type(), PositionType::OmnistarHp);
        assert!(rec.is_precise());
    }
}
