//! Vehicle pose: position plus an orthonormal orientation frame.

use super::vector::Vec3;

/// Vehicle position and orientation frame at one instant.
///
/// The three axes are the columns of the body-to-local rotation, kept
/// unit length and mutually orthogonal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehiclePose {
    /// Position in local east/north/up meters
    pub position: Vec3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub z_axis: Vec3,
}

impl VehiclePose {
    /// Pose at the origin with the identity frame.
    pub const fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            x_axis: Vec3::X,
            y_axis: Vec3::Y,
            z_axis: Vec3::Z,
        }
    }

    /// Build a pose from roll/pitch/yaw in radians.
    pub fn from_attitude(position: Vec3, roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sr, cr) = roll.sin_cos();
        let (sp, cp) = pitch.sin_cos();
        let (sy, cy) = yaw.sin_cos();

        Self {
            position,
            x_axis: Vec3::new(cp * cy, -cp * sy, sp),
            y_axis: Vec3::new(sr * sp * cy + cr * sy, -sr * sp * sy + cr * cy, -sr * cp),
            z_axis: Vec3::new(-cr * sp * cy + sr * sy, cr * sp * sy + sr * cy, cr * cp),
        }
    }

    /// Blend towards `other`, `f = 1` giving `self` and `f = 0` giving `other`.
    ///
    /// Position is linearly interpolated. Each axis is blended the same
    /// way and then re-normalized to unit length.
    pub fn interpolate(&self, other: &VehiclePose, f: f64) -> VehiclePose {
        VehiclePose {
            position: self.position.blend(&other.position, f),
            x_axis: self.x_axis.blend(&other.x_axis, f).normalized(),
            y_axis: self.y_axis.blend(&other.y_axis, f).normalized(),
            z_axis: self.z_axis.blend(&other.z_axis, f).normalized(),
        }
    }

    /// Same orientation, position expressed relative to `origin`.
    #[inline]
    pub fn relative_to(&self, origin: Vec3) -> VehiclePose {
        VehiclePose {
            position: self.position - origin,
            ..*self
        }
    }

    /// Rotate a body-frame vector into the local frame.
    #[inline]
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        self.x_axis * v.x + self.y_axis * v.y + self.z_axis * v.z
    }
}

impl Default for VehiclePose {
    fn default() -> Self {
        Self::identity()
    }
}
