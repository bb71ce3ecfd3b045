//! Binary LIDAR and GPS logs.
//!
//! Both logs are flat sequences of fixed-size little-endian records with
//! no file header, so the record at index `k` starts at `k * SIZE` and a
//! log's time range can be read from its first and last record alone.
//!
//! ```text
//! LIDAR (392 bytes)                     GPS (128 bytes)
//! ┌──────────────────────────────┐      ┌──────────────────────────────┐
//! │ header (24)                  │      │ timestamp, status, type (20) │
//! │  timestamp ns, tilt, ids,    │      │ lat/long/height (24)         │
//! │  value count                 │      │ north/east/down (24)         │
//! ├──────────────────────────────┤      │ std dev, vel, acc (36)       │
//! │ ranges u16 cm (368)          │      │ roll/pitch/yaw, rates (24)   │
//! └──────────────────────────────┘      └──────────────────────────────┘
//! ```

mod reader;
mod types;
mod writer;

pub use reader::{last_record_offset, log_time_range, read_record_at, RecordReader, TimeRange};
pub use types::{
    FixedRecord, GpsRecord, LidarRecord, PositionType, GPS_RECORD_SIZE, LIDAR_DATA_SIZE,
    LIDAR_HEADER_SIZE, LIDAR_MAX_SAMPLES, LIDAR_RECORD_SIZE,
};
pub use writer::LogWriter;

#[cfg(test)]
pub(crate) mod test_fixtures;
