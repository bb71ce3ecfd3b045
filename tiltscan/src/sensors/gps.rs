//! GPS pose track: the two most recent GPS/INS fixes and time interpolation
//! between them.
//!
//! # Coordinate conversion
//!
//! The receiver reports north/east/down positions and roll/pitch/yaw in
//! degrees (yaw clockwise from north). Poses are expressed in a local
//! east/north/up frame:
//!
//! | Local      | From record                      |
//! |------------|----------------------------------|
//! | x          | east − origin.x                  |
//! | y          | north − origin.y                 |
//! | z          | −down − origin.z (or 0)          |
//! | roll       | roll                             |
//! | pitch      | pitch + 180°                     |
//! | yaw        | yaw + 90° (or heading of motion) |

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::core::math::heading_from_displacement;
use crate::core::types::{Timestamped, Vec3, VehiclePose};
use crate::error::{Error, Result};
use crate::io::log::{FixedRecord, GpsRecord, RecordReader};

/// Records not newer than the latest fix by this margin are dropped.
const DUPLICATE_MARGIN_SECS: f64 = 1e-4;

/// Pose track configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoseTrackConfig {
    /// Flatten the track onto z = 0.
    /// Default: true
    pub force_zero_z: bool,
    /// Only accept computed OmniSTAR HP solutions.
    /// Default: false
    pub check_status: bool,
    /// Take yaw from the direction of travel instead of the INS heading.
    /// Default: false
    pub heading_from_motion: bool,
}

impl Default for PoseTrackConfig {
    fn default() -> Self {
        Self {
            force_zero_z: true,
            check_status: false,
            heading_from_motion: false,
        }
    }
}

/// Record and query counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoseTrackStats {
    /// Records accepted as the newest fix
    pub consumed: u64,
    /// Records dropped as duplicate or out of order
    pub duplicates: u64,
    /// Records dropped by the solution status check
    pub rejected_status: u64,
    /// Queries before the older fix
    pub underruns: u64,
    /// Queries after the newer fix with no more records
    pub overruns: u64,
}

/// Outcome of a pose query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseLookup {
    /// Query time within the buffered fixes
    Interpolated(VehiclePose),
    /// Query time precedes the older fix; clamped to it
    Underrun(VehiclePose),
    /// Query time follows the newer fix; clamped to it
    Overrun(VehiclePose),
}

impl PoseLookup {
    #[inline]
    pub fn pose(&self) -> VehiclePose {
        match *self {
            PoseLookup::Interpolated(p) | PoseLookup::Underrun(p) | PoseLookup::Overrun(p) => p,
        }
    }

    #[inline]
    pub fn is_clamped(&self) -> bool {
        !matches!(self, PoseLookup::Interpolated(_))
    }
}

/// Anything that can answer "where was the vehicle at time t".
pub trait PoseSource {
    /// Pose at `t`, seconds since epoch.
    fn pose_at(&mut self, t: f64) -> Result<VehiclePose>;

    /// Advance past everything before `t`.
    fn skip_to(&mut self, _t: f64) -> Result<()> {
        Ok(())
    }

    /// Horizontal error of the current fix, when known.
    fn gps_error(&self) -> Option<f64> {
        None
    }
}

/// A fixed pose, for scans without a GPS log.
impl PoseSource for VehiclePose {
    fn pose_at(&mut self, _t: f64) -> Result<VehiclePose> {
        Ok(*self)
    }
}

impl<P: PoseSource + ?Sized> PoseSource for Box<P> {
    fn pose_at(&mut self, t: f64) -> Result<VehiclePose> {
        (**self).pose_at(t)
    }

    fn skip_to(&mut self, t: f64) -> Result<()> {
        (**self).skip_to(t)
    }

    fn gps_error(&self) -> Option<f64> {
        (**self).gps_error()
    }
}

/// Pose track over a GPS log.
///
/// # Example
///
/// ```ignore
/// use tiltscan::sensors::{PoseTrack, PoseTrackConfig};
///
/// let mut track = PoseTrack::open("gps.log", PoseTrackConfig::default())?;
/// track.skip(start_time)?;
/// let pose = track.pose_at(line.timestamp)?;
/// ```
pub struct PoseTrack<R> {
    reader: RecordReader<R, GpsRecord>,
    config: PoseTrackConfig,
    origin: Vec3,
    older: Timestamped<VehiclePose>,
    newer: Timestamped<VehiclePose>,
    raw_older: Option<GpsRecord>,
    raw_newer: Option<GpsRecord>,
    heading: f64,
    gps_error: f64,
    exhausted: bool,
    stats: PoseTrackStats,
}

impl PoseTrack<BufReader<File>> {
    /// Open a GPS log.
    pub fn open(path: impl AsRef<Path>, config: PoseTrackConfig) -> Result<Self> {
        Ok(Self::new(RecordReader::open(path)?, config))
    }
}

impl<R: Read> PoseTrack<R> {
    pub fn new(reader: RecordReader<R, GpsRecord>, config: PoseTrackConfig) -> Self {
        let start = Timestamped::new(VehiclePose::identity(), 0.0);
        Self {
            reader,
            config,
            origin: Vec3::ZERO,
            older: start,
            newer: start,
            raw_older: None,
            raw_newer: None,
            heading: 0.0,
            gps_error: 0.0,
            exhausted: false,
            stats: PoseTrackStats::default(),
        }
    }

    pub fn config(&self) -> &PoseTrackConfig {
        &self.config
    }

    pub fn stats(&self) -> PoseTrackStats {
        self.stats
    }

    /// The buffered fixes, older first.
    pub fn poses(&self) -> (&Timestamped<VehiclePose>, &Timestamped<VehiclePose>) {
        (&self.older, &self.newer)
    }

    /// The raw records behind the buffered fixes, older first.
    pub fn raw_records(&self) -> (Option<&GpsRecord>, Option<&GpsRecord>) {
        (self.raw_older.as_ref(), self.raw_newer.as_ref())
    }

    /// Horizontal error (DRMS, meters) of the newest fix.
    pub fn gps_error(&self) -> f64 {
        self.gps_error
    }

    /// Heading of travel in degrees, when derived from motion.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Whether at least one fix has been consumed.
    #[inline]
    pub fn is_primed(&self) -> bool {
        self.raw_newer.is_some()
    }

    /// Consume the next acceptable record as the newest fix.
    ///
    /// Returns `false` once the log is exhausted.
    pub fn consume(&mut self) -> Result<bool> {
        let record = loop {
            if self.exhausted {
                return Ok(false);
            }
            let record = match self.reader.read_record() {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.exhausted = true;
                    return Ok(false);
                }
                Err(Error::IncompleteRecord { actual, .. }) => {
                    log::debug!("GPS log truncated ({} trailing bytes)", actual);
                    self.exhausted = true;
                    return Ok(false);
                }
                Err(e) => return Err(e),
            };

            if self.is_primed() && self.newer.timestamp >= record.timestamp() - DUPLICATE_MARGIN_SECS {
                self.stats.duplicates += 1;
                continue;
            }
            if self.config.check_status && !record.is_precise() {
                log::debug!(
                    "Dropping GPS fix at {:.3}: status {} type {:?}",
                    record.timestamp(),
                    record.solution_status,
                    record.position_type()
                );
                self.stats.rejected_status += 1;
                continue;
            }
            break record;
        };

        let pose = self.record_pose(&record);
        let fix = Timestamped::new(pose, record.timestamp());
        self.gps_error = record.horizontal_error();

        if self.is_primed() {
            self.older = self.newer;
            self.raw_older = self.raw_newer.take();
        } else {
            self.older = fix;
            self.raw_older = Some(record.clone());
        }
        self.newer = fix;
        self.raw_newer = Some(record);
        self.stats.consumed += 1;
        Ok(true)
    }

    fn record_pose(&mut self, record: &GpsRecord) -> VehiclePose {
        let [north, east, down] = record.ned;
        let z = if self.config.force_zero_z {
            0.0
        } else {
            -down - self.origin.z
        };
        let position = Vec3::new(east - self.origin.x, north - self.origin.y, z);

        let [roll, pitch, yaw] = record.roll_pitch_yaw.map(|v| v as f64);
        let yaw = if self.config.heading_from_motion {
            let previous = self.newer.data.position;
            self.heading = heading_from_displacement(
                position.y - previous.y,
                position.x - previous.x,
                self.heading,
            );
            self.heading
        } else {
            yaw
        };

        VehiclePose::from_attitude(
            position,
            roll.to_radians(),
            (pitch + 180.0).to_radians(),
            (yaw + 90.0).to_radians(),
        )
    }

    /// Consume until the newest fix is at or after `t`.
    pub fn skip(&mut self, t: f64) -> Result<()> {
        while !(self.is_primed() && self.newer.timestamp >= t) {
            if !self.consume()? {
                break;
            }
        }
        Ok(())
    }

    /// Pose at time `t`.
    ///
    /// Consumes records until the newest fix covers `t`, then blends the
    /// two buffered fixes. Times outside them are clamped to the nearest
    /// fix.
    pub fn lookup(&mut self, t: f64) -> Result<PoseLookup> {
        while t > self.newer.timestamp {
            if !self.consume()? {
                break;
            }
        }

        let (t1, t2) = (self.older.timestamp, self.newer.timestamp);
        let lookup = if t < t1 {
            PoseLookup::Underrun(self.older.data)
        } else if t > t2 {
            PoseLookup::Overrun(self.newer.data)
        } else if t == t1 {
            PoseLookup::Interpolated(self.older.data)
        } else if t == t2 {
            PoseLookup::Interpolated(self.newer.data)
        } else {
            let f = 1.0 - (t - t1) / (t2 - t1);
            PoseLookup::Interpolated(self.older.data.interpolate(&self.newer.data, f))
        };
        Ok(lookup)
    }

    /// Pose at time `t`, clamping with a warning outside the buffered fixes.
    pub fn pose_at(&mut self, t: f64) -> Result<VehiclePose> {
        let lookup = self.lookup(t)?;
        match lookup {
            PoseLookup::Underrun(_) => {
                self.stats.underruns += 1;
                log::warn!("Pose underrun at {:.3} (oldest fix {:.3})", t, self.older.timestamp);
            }
            PoseLookup::Overrun(_) => {
                self.stats.overruns += 1;
                log::warn!("Pose overrun at {:.3} (newest fix {:.3})", t, self.newer.timestamp);
            }
            PoseLookup::Interpolated(_) => {}
        }
        Ok(lookup.pose())
    }

    /// Re-anchor local coordinates at the older fix's position.
    pub fn set_origin(&mut self) {
        let shift = self.older.data.position;
        self.origin = self.origin + shift;
        self.older.data = self.older.data.relative_to(shift);
        self.newer.data = self.newer.data.relative_to(shift);
        log::debug!("GPS origin set to {:?}", self.origin);
    }
}

impl<R: Read> PoseSource for PoseTrack<R> {
    fn pose_at(&mut self, t: f64) -> Result<VehiclePose> {
        PoseTrack::pose_at(self, t)
    }

    fn skip_to(&mut self, t: f64) -> Result<()> {
        self.skip(t)
    }

    fn gps_error(&self) -> Option<f64> {
        self.is_primed().then_some(self.gps_error)
    }
}
