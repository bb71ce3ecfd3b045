//! Normalized Hamming window weights.

use crate::error::{Error, Result};

/// Symmetric weights `0.54 - 0.46 cos(2πi / (N-1))`, normalized to sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct HammingWindow {
    weights: Vec<f64>,
}

impl HammingWindow {
    /// Window sizes must be odd and at least 3 so a center line exists.
    #[inline]
    pub fn is_valid_size(size: usize) -> bool {
        size >= 3 && size % 2 == 1
    }

    pub fn new(size: usize) -> Result<Self> {
        if !Self::is_valid_size(size) {
            return Err(Error::InvalidWindowSize(size));
        }

        let span = (size - 1) as f64;
        let raw: Vec<f64> = (0..size)
            .map(|i| 0.54 - 0.46 * (std::f64::consts::TAU * i as f64 / span).cos())
            .collect();
        let sum: f64 = raw.iter().sum();

        Ok(Self {
            weights: raw.into_iter().map(|w| w / sum).collect(),
        })
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Index of the center weight.
    #[inline]
    pub fn middle_index(&self) -> usize {
        self.len() / 2
    }

    /// Weighted sum of exactly `len()` values.
    pub fn apply<I: IntoIterator<Item = f64>>(&self, values: I) -> f64 {
        let mut n = 0;
        let sum: f64 = self
            .weights
            .iter()
            .zip(values)
            .map(|(w, v)| {
                n += 1;
                w * v
            })
            .sum();
        debug_assert_eq!(n, self.len(), "window holds {} values", n);
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_weights_sum_to_one() {
        for size in (3..=51).step_by(2) {
            let window = HammingWindow::new(size).unwrap();
            let sum: f64 = window.weights().iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "size {} sums to {}", size, sum);
        }
    }

    #[test]
    fn test_even_sizes_rejected() {
        for size in (0..40).step_by(2) {
            assert!(!HammingWindow::is_valid_size(size));
            assert!(matches!(HammingWindow::new(size), Err(Error::InvalidWindowSize(_))));
        }
        assert!(!HammingWindow::is_valid_size(1));
    }

    #[test]
    fn test_weights_symmetric_and_peaked() {
        let window = HammingWindow::new(7).unwrap();
        let w = window.weights();
        for i in 0..3 {
            assert_relative_eq!(w[i], w[6 - i], epsilon = 1e-12);
        }
        assert_eq!(window.middle_index(), 3);
        assert!(w[3] > w[2] && w[2] > w[1] && w[1] > w[0]);
        // end weights are 0.08 before normalization
        assert_relative_eq!(w[0] / w[3], 0.08, epsilon = 1e-12);
    }

    #[test]
    fn test_apply_constant_is_identity() {
        let window = HammingWindow::new(9).unwrap();
        assert_relative_eq!(window.apply(std::iter::repeat(350.0).take(9)), 350.0, epsilon = 1e-9);
    }
}
