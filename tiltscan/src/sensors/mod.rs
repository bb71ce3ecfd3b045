//! Sensor processing layer.
//!
//! - [`source`]: decoded, windowed and lag-compensated scan lines
//! - [`tilt`]: symmetric (FIR) and recursive (IIR) tilt smoothing
//! - [`gps`]: GPS pose track with time interpolation
//! - [`projection`]: scan samples to 3D points

pub mod gps;
pub mod projection;
pub mod source;
pub mod tilt;

pub use gps::{PoseLookup, PoseSource, PoseTrack, PoseTrackConfig, PoseTrackStats};
pub use projection::{LidarVertex, ProjectedLine, RayProjector};
pub use source::{RangeAverage, ScanLineSource, ScanLineStream, SourceConfig, SourceStats};
