//! Angle helpers shared by the GPS track and the CLI reports.

use std::f64::consts::PI;

/// Heading of a planar displacement in degrees.
///
/// Measured counter-clockwise from +x, in (-90°, 270°]. Returns `previous`
/// when the displacement is zero so a stationary vehicle keeps its heading.
///
/// # Example
/// ```
/// use tiltscan::core::math::heading_from_displacement;
///
/// assert!((heading_from_displacement(1.0, 1.0, 0.0) - 45.0).abs() < 1e-9);
/// assert!((heading_from_displacement(-1.0, 0.0, 0.0) - 180.0).abs() < 1e-9);
/// assert_eq!(heading_from_displacement(0.0, 0.0, 12.5), 12.5);
/// ```
pub fn heading_from_displacement(dx: f64, dy: f64, previous: f64) -> f64 {
    if dx == 0.0 {
        if dy == 0.0 {
            return previous;
        }
        return if dy > 0.0 { 90.0 } else { -90.0 };
    }
    let mut angle = (dy / dx).atan();
    if dx < 0.0 {
        angle += PI;
    }
    angle.to_degrees()
}

/// Fold a degree difference produced by two headings into (-180°, 180°].
///
/// # Example
/// ```
/// use tiltscan::core::math::wrap_degrees;
///
/// assert_eq!(wrap_degrees(190.0), -170.0);
/// assert_eq!(wrap_degrees(-200.0), 160.0);
/// assert_eq!(wrap_degrees(45.0), 45.0);
/// ```
#[inline]
pub fn wrap_degrees(mut deg: f64) -> f64 {
    while deg > 180.0 {
        deg -= 360.0;
    }
    while deg <= -180.0 {
        deg += 360.0;
    }
    deg
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_heading_quadrants() {
        assert_relative_eq!(heading_from_displacement(1.0, 0.0, 7.0), 0.0);
        assert_relative_eq!(heading_from_displacement(0.0, 2.0, 7.0), 90.0);
        assert_relative_eq!(heading_from_displacement(-1.0, -1.0, 7.0), 225.0, epsilon = 1e-9);
        assert_relative_eq!(heading_from_displacement(1.0, -1.0, 7.0), -45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_heading_stationary_keeps_previous() {
        assert_eq!(heading_from_displacement(0.0, 0.0, 33.0), 33.0);
    }
}
