//! Triangle strips between consecutive projected lines.
//!
//! Two lines are interleaved into a strip `a0 b0 a1 b1 ...`; every run of
//! three strip vertices forms a triangle. A 180-sample line sits half a step
//! inside a 181-sample line, so mixed pairs still zip up cleanly.

use crate::core::types::{Vec3, VehiclePose};
use crate::sensors::projection::LidarVertex;

/// Longest triangle edge kept in a mesh, meters.
pub const DEFAULT_MAX_EDGE: f64 = 2.0;

/// Half-width of the vehicle track marker, meters.
pub const DEFAULT_MARKER_WIDTH: f64 = 0.5;

/// Interleave two projected lines into a triangle strip.
pub fn interleave(previous: &[LidarVertex], current: &[LidarVertex]) -> Vec<LidarVertex> {
    let (n1, n2) = (previous.len(), current.len());
    let mut strip = Vec::with_capacity(n1 + n2);

    if n1 >= n2 {
        for (a, b) in previous.iter().zip(current) {
            strip.push(*a);
            strip.push(*b);
        }
        strip.extend_from_slice(&previous[n2..]);
    } else {
        strip.push(current[0]);
        for (a, b) in previous.iter().zip(&current[1..]) {
            strip.push(*a);
            strip.push(*b);
        }
        strip.extend_from_slice(&current[(n1 + 1).min(n2)..]);
    }
    strip
}

/// Length of the longest edge of a triangle.
pub fn max_edge_length(v0: Vec3, v1: Vec3, v2: Vec3) -> f64 {
    v0.distance(&v1).max(v0.distance(&v2)).max(v1.distance(&v2))
}

/// Index triples of the strip triangles that are fully valid and have no
/// edge of `max_edge` or longer.
pub fn strip_triangles(strip: &[LidarVertex], max_edge: f64) -> Vec<[usize; 3]> {
    strip
        .windows(3)
        .enumerate()
        .filter(|(_, tri)| tri.iter().all(|v| v.valid))
        .filter(|(_, tri)| max_edge_length(tri[0].point, tri[1].point, tri[2].point) < max_edge)
        .map(|(i, _)| [i, i + 1, i + 2])
        .collect()
}

/// Arrow-shaped marker of the vehicle track between two poses.
///
/// The tip sits on `pose`; the base straddles `previous` at `width` on each
/// side, perpendicular to the horizontal motion. Returns `None` if the
/// vehicle did not move.
pub fn vehicle_marker(pose: &VehiclePose, previous: &VehiclePose, width: f64) -> Option<[Vec3; 3]> {
    let (p1, p2) = (previous.position, pose.position);
    let (w, h) = (p2.x - p1.x, p2.y - p1.y);
    let l = w.hypot(h);
    if l == 0.0 {
        return None;
    }
    let side = Vec3::new(h / l, -w / l, 0.0) * width;

    Some([p2, p1 + side, p1 - side])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn verts(n: usize, x: f64) -> Vec<LidarVertex> {
        (0..n)
            .map(|i| LidarVertex {
                valid: true,
                point: Vec3::new(x, i as f64 * 0.1, 0.0),
            })
            .collect()
    }

    #[test]
    fn test_interleave_equal_lengths() {
        let strip = interleave(&verts(181, 0.0), &verts(181, 1.0));
        assert_eq!(strip.len(), 362);
        assert_eq!(strip[0].point.x, 0.0);
        assert_eq!(strip[1].point.x, 1.0);
        assert_eq!(strip[361].point.y, strip[360].point.y);
    }

    #[test]
    fn test_interleave_longer_previous() {
        let strip = interleave(&verts(181, 0.0), &verts(180, 1.0));
        assert_eq!(strip.len(), 361);
        // trailing sample of the longer line closes the strip
        assert_eq!(strip[360].point.x, 0.0);
        assert_relative_eq!(strip[360].point.y, 18.0, epsilon = 1e-12);
    }

    #[test]
    fn test_interleave_longer_current() {
        let strip = interleave(&verts(180, 0.0), &verts(181, 1.0));
        assert_eq!(strip.len(), 361);
        assert_eq!(strip[0].point, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(strip[1].point, Vec3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(strip[2].point.y, 0.1, epsilon = 1e-12);
        assert_eq!(strip[360].point.x, 1.0);
    }

    #[test]
    fn test_strip_triangles_skip_invalid_and_long() {
        let mut strip = interleave(&verts(4, 0.0), &verts(4, 1.0));
        assert_eq!(strip_triangles(&strip, DEFAULT_MAX_EDGE).len(), 6);

        strip[3].valid = false;
        let tris = strip_triangles(&strip, DEFAULT_MAX_EDGE);
        assert_eq!(tris, vec![[0, 1, 2], [4, 5, 6], [5, 6, 7]]);

        assert!(strip_triangles(&strip, 1.0).is_empty());
    }

    #[test]
    fn test_max_edge_length() {
        let l = max_edge_length(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), Vec3::new(0.0, 4.0, 0.0));
        assert_relative_eq!(l, 5.0);
    }

    #[test]
    fn test_vehicle_marker() {
        let mut previous = VehiclePose::identity();
        let mut pose = VehiclePose::identity();
        assert!(vehicle_marker(&pose, &previous, 0.5).is_none());

        previous.position = Vec3::new(0.0, 0.0, 0.0);
        pose.position = Vec3::new(0.0, 2.0, 0.0);
        let [tip, right, left] = vehicle_marker(&pose, &previous, 0.5).unwrap();
        assert_eq!(tip, pose.position);
        assert_relative_eq!(right.x, 0.5);
        assert_relative_eq!(left.x, -0.5);
        assert_relative_eq!(right.y, 0.0);
    }
}
