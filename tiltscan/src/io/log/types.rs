//! Fixed-size record layouts of the LIDAR and GPS logs.

use crate::core::types::ScanLine;
use crate::error::Result;

/// Total size of one LIDAR record in bytes.
pub const LIDAR_RECORD_SIZE: usize = 392;

/// Size of the LIDAR record header in bytes.
pub const LIDAR_HEADER_SIZE: usize = 24;

/// Size of the LIDAR data block in bytes.
pub const LIDAR_DATA_SIZE: usize = LIDAR_RECORD_SIZE - LIDAR_HEADER_SIZE;

/// Maximum number of range samples the data block can hold.
pub const LIDAR_MAX_SAMPLES: usize = LIDAR_DATA_SIZE / 2;

/// Total size of one GPS record in bytes.
pub const GPS_RECORD_SIZE: usize = 128;

/// Nanoseconds to seconds.
const NS_TO_SECS: f64 = 1e-9;

/// A record with a fixed on-disk length.
pub trait FixedRecord: Sized {
    /// Encoded length in bytes.
    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes.
    fn decode(buf: &[u8]) -> Self;

    /// Append the `SIZE`-byte encoding to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Record timestamp in seconds since epoch.
    fn timestamp(&self) -> f64;
}

/// Little-endian cursor over a record buffer.
struct LeCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> LeCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }

    fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.take())
    }

    fn f32x3(&mut self) -> [f32; 3] {
        [self.f32(), self.f32(), self.f32()]
    }

    fn f64x3(&mut self) -> [f64; 3] {
        [self.f64(), self.f64(), self.f64()]
    }
}

// ============================================================================
// LIDAR
// ============================================================================

/// One raw LIDAR scan-line record.
///
/// ```text
/// offset  size  field
///      0     8  timestamp (ns, u64)
///      8     4  tilt (rad, f32)
///     12     1  sensor id
///     13     1  status
///     14     1  scan index (cyclic)
///     15     3  reserved
///     18     2  value count (u16)
///     20     4  padding
///     24   368  range samples (u16 cm), zero padded
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LidarRecord {
    pub timestamp_ns: u64,
    pub tilt: f32,
    pub sensor_id: u8,
    pub status: u8,
    pub scan_index: u8,
    /// Declared sample count; may disagree with `ranges.len()` when corrupt
    pub value_count: u16,
    pub ranges: Vec<u16>,
}

impl LidarRecord {
    pub fn new(timestamp_ns: u64, tilt: f32, ranges: Vec<u16>) -> Self {
        Self {
            timestamp_ns,
            tilt,
            sensor_id: 0,
            status: 0,
            scan_index: 0,
            value_count: ranges.len() as u16,
            ranges,
        }
    }

    /// Convert into a validated scan line.
    ///
    /// Fails with `InvalidScanLine` unless the count is 180 or 181.
    pub fn into_scan_line(self) -> Result<ScanLine> {
        let timestamp = self.timestamp();
        ScanLine::new(timestamp, self.tilt as f64, self.ranges)
    }
}

impl FixedRecord for LidarRecord {
    const SIZE: usize = LIDAR_RECORD_SIZE;

    fn decode(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= Self::SIZE);
        let mut cur = LeCursor::new(buf);
        let timestamp_ns = cur.u64();
        let tilt = cur.f32();
        let sensor_id = cur.u8();
        let status = cur.u8();
        let scan_index = cur.u8();
        let _reserved = cur.u8();
        let _reserved = cur.u16();
        let value_count = cur.u16();
        let _padding = cur.u32();

        let n = (value_count as usize).min(LIDAR_MAX_SAMPLES);
        let ranges = (0..n).map(|_| cur.u16()).collect();

        Self {
            timestamp_ns,
            tilt,
            sensor_id,
            status,
            scan_index,
            value_count,
            ranges,
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        let start = out.len();
        out.extend_from_slice(&self.timestamp_ns.to_le_bytes());
        out.extend_from_slice(&self.tilt.to_le_bytes());
        out.extend_from_slice(&[self.sensor_id, self.status, self.scan_index, 0, 0, 0]);
        out.extend_from_slice(&self.value_count.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        for r in self.ranges.iter().take(LIDAR_MAX_SAMPLES) {
            out.extend_from_slice(&r.to_le_bytes());
        }
        out.resize(start + Self::SIZE, 0);
    }

    fn timestamp(&self) -> f64 {
        self.timestamp_ns as f64 * NS_TO_SECS
    }
}

// ============================================================================
// GPS
// ============================================================================

/// Receiver position solution type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionType {
    FixedPos,
    FixedHeight,
    FixedVel,
    DopplerVelocity,
    Single,
    PsrDiff,
    Waas,
    Omnistar,
    L1Float,
    IonoFreeFloat,
    NarrowFloat,
    L1Int,
    WideInt,
    NarrowInt,
    RtkDirectIns,
    Ins,
    OmnistarHp,
    Unknown(u32),
}

impl From<u32> for PositionType {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::FixedPos,
            2 => Self::FixedHeight,
            3 => Self::FixedVel,
            8 => Self::DopplerVelocity,
            16 => Self::Single,
            17 => Self::PsrDiff,
            18 => Self::Waas,
            20 => Self::Omnistar,
            32 => Self::L1Float,
            33 => Self::IonoFreeFloat,
            34 => Self::NarrowFloat,
            48 => Self::L1Int,
            49 => Self::WideInt,
            50 => Self::NarrowInt,
            51 => Self::RtkDirectIns,
            52 => Self::Ins,
            64 => Self::OmnistarHp,
            other => Self::Unknown(other),
        }
    }
}

/// One raw GPS/INS record.
///
/// ```text
/// offset  size  field
///      0     8  timestamp (ns, u64)
///      8     4  error code
///     12     4  solution status (0 = solution computed)
///     16     4  position type
///     20    24  latitude/longitude/height (f64 x3)
///     44    24  local north/east/down (m, f64 x3)
///     68    12  position std dev north/east/down (f32 x3)
///     80    12  velocity (f32 x3)
///     92    12  acceleration (f32 x3)
///    104    12  roll/pitch/yaw (deg, f32 x3)
///    116    12  angular rates (f32 x3)
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GpsRecord {
    pub timestamp_ns: u64,
    pub error_code: u32,
    pub solution_status: u32,
    pub position_type: u32,
    pub llh: [f64; 3],
    pub ned: [f64; 3],
    pub uncertainty: [f32; 3],
    pub velocity: [f32; 3],
    pub acceleration: [f32; 3],
    pub roll_pitch_yaw: [f32; 3],
    pub rates: [f32; 3],
}

impl GpsRecord {
    #[inline]
    pub fn position_type(&self) -> PositionType {
        PositionType::from(self.position_type)
    }

    /// Horizontal position error (DRMS) in meters.
    #[inline]
    pub fn horizontal_error(&self) -> f64 {
        let n = self.uncertainty[0] as f64;
        let e = self.uncertainty[1] as f64;
        (n * n + e * e).sqrt()
    }

    /// Solution computed and OmniSTAR HP corrected.
    #[inline]
    pub fn is_precise(&self) -> bool {
        self.solution_status == 0 && self.position_type() == PositionType::OmnistarHp
    }
}

impl FixedRecord for GpsRecord {
    const SIZE: usize = GPS_RECORD_SIZE;

    fn decode(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= Self::SIZE);
        let mut cur = LeCursor::new(buf);
        Self {
            timestamp_ns: cur.u64(),
            error_code: cur.u32(),
            solution_status: cur.u32(),
            position_type: cur.u32(),
            llh: cur.f64x3(),
            ned: cur.f64x3(),
            uncertainty: cur.f32x3(),
            velocity: cur.f32x3(),
            acceleration: cur.f32x3(),
            roll_pitch_yaw: cur.f32x3(),
            rates: cur.f32x3(),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.timestamp_ns.to_le_bytes());
        out.extend_from_slice(&self.error_code.to_le_bytes());
        out.extend_from_slice(&self.solution_status.to_le_bytes());
        out.extend_from_slice(&self.position_type.to_le_bytes());
        for v in self.llh.iter().chain(&self.ned) {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for group in [
            &self.uncertainty,
            &self.velocity,
            &self.acceleration,
            &self.roll_pitch_yaw,
            &self.rates,
        ] {
            for v in group {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    fn timestamp(&self) -> f64 {
        self.timestamp_ns as f64 * NS_TO_SECS
    }
}
