//! Ray projection of range samples into the local frame.

use std::ops::Range;

use crate::core::types::{ScanLine, Vec3, VehiclePose, INVALID_RANGE, RANGE_SCALE};

/// Projected sample: a point and whether the sample carried a return.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LidarVertex {
    pub valid: bool,
    pub point: Vec3,
}

/// A scan line with the pose it was taken at and its projected samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedLine {
    pub line: ScanLine,
    pub pose: VehiclePose,
    pub vertices: Vec<LidarVertex>,
}

/// Projects `(tilt, bearing, range)` samples through a vehicle pose.
///
/// In the scanner frame a sample points along
/// `(cos β · sin τ, sin β, cos β · cos τ)` for tilt `τ` and bearing `β`;
/// the pose axes rotate that direction into the local frame and the range
/// (centimeters) scales it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RayProjector {
    /// Scanner position relative to the GPS antenna, in the local frame
    pub sensor_offset: Vec3,
}

impl RayProjector {
    pub fn new(sensor_offset: Vec3) -> Self {
        Self { sensor_offset }
    }

    /// Project one sample. `tilt` is in the projection convention (π − raw).
    #[inline]
    pub fn project(&self, tilt: f64, bearing: f64, range: u16, pose: &VehiclePose) -> LidarVertex {
        let (sa, ca) = tilt.sin_cos();
        let (sb, cb) = bearing.sin_cos();
        let direction = pose.rotate(Vec3::new(cb * sa, sb, cb * ca));
        let k = range as f64 * RANGE_SCALE;

        LidarVertex {
            valid: range < INVALID_RANGE,
            point: pose.position + self.sensor_offset + direction * k,
        }
    }

    /// Project every sample of a line.
    pub fn project_line(&self, line: &ScanLine, pose: &VehiclePose) -> Vec<LidarVertex> {
        self.project_samples(line, pose, 0..line.count())
    }

    /// Project the samples of `line` with indices in `indices`.
    pub fn project_samples(&self, line: &ScanLine, pose: &VehiclePose, indices: Range<usize>) -> Vec<LidarVertex> {
        let tilt = line.projection_tilt();
        let end = indices.end.min(line.count());
        (indices.start..end)
            .map(|i| self.project(tilt, line.bearing(i), line.ranges[i], pose))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_invalid_sentinel() {
        let projector = RayProjector::default();
        let pose = VehiclePose::identity();
        assert!(!projector.project(0.3, 0.1, INVALID_RANGE, &pose).valid);
        assert!(!projector.project(0.3, 0.1, u16::MAX, &pose).valid);
        assert!(projector.project(0.3, 0.1, INVALID_RANGE - 1, &pose).valid);
    }

    #[test]
    fn test_zero_range_at_sensor_offset() {
        let offset = Vec3::new(0.2, -0.1, 1.5);
        let projector = RayProjector::new(offset);
        let pose = VehiclePose::from_attitude(Vec3::new(3.0, 4.0, 0.0), 0.1, 0.2, 0.3);

        let vertex = projector.project(1.1, -0.4, 0, &pose);
        assert!(vertex.valid);
        assert_eq!(vertex.point, pose.position + offset);
    }

    #[test]
    fn test_straight_ahead_along_x_axis() {
        let projector = RayProjector::default();
        let vertex = projector.project(FRAC_PI_2, 0.0, 250, &VehiclePose::identity());
        assert_relative_eq!(vertex.point.x, 2.5, epsilon = 1e-12);
        assert_relative_eq!(vertex.point.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(vertex.point.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_side_bearing_along_y_axis() {
        let projector = RayProjector::default();
        let vertex = projector.project(0.7, FRAC_PI_2, 100, &VehiclePose::identity());
        assert_relative_eq!(vertex.point.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(vertex.point.x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_project_line_uses_projection_tilt() {
        let line = ScanLine::new(0.0, PI / 2.0, vec![100; 181]).unwrap();
        let verts = RayProjector::default().project_line(&line, &VehiclePose::identity());

        assert_eq!(verts.len(), 181);
        // center sample, bearing 0, tilt π - π/2
        assert_relative_eq!(verts[90].point.x, 1.0, epsilon = 1e-9);
        // every point one meter from the scanner
        for v in &verts {
            assert_relative_eq!(v.point.length(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_project_samples_clips_to_line() {
        let line = ScanLine::new(0.0, 1.0, vec![100; 180]).unwrap();
        let verts = RayProjector::default().project_samples(&line, &VehiclePose::identity(), 170..200);
        assert_eq!(verts.len(), 10);
    }
}
