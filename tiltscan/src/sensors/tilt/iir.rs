//! Recursive (IIR) tilt filter with Butterworth/Chebyshev coefficients.
//!
//! # Coefficient synthesis
//!
//! Each conjugate pole pair `p = 1..=poles/2` is placed on the unit circle
//! (`RP = -cos(π/2n + (p-1)π/n)`, `IP = sin(..)`), warped onto an ellipse
//! for a Chebyshev ripple, mapped to the z-domain by the bilinear transform
//! and shifted from a 1 rad/sample prototype to the requested cutoff. The
//! biquad stages are cascaded by polynomial convolution and the result is
//! normalized to unit gain at DC (low-pass) or Nyquist (high-pass).
//!
//! # Recursion
//!
//! ```text
//! y[n] = a0·x[n] + Σ_{i=1..order} (a_i·x[n-i] + b_i·y[n-i])
//! ```
//!
//! The filtered average range `y` is compared against the raw average `x`
//! to correct the tilt: `tilt + (1 - x/y) / tan(tilt)`.

use std::collections::VecDeque;
use std::f64::consts::PI;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::core::types::{AveragingWindow, ScanLine};
use crate::error::{Error, Result};
use crate::sensors::source::{RangeAverage, ScanLineStream};

/// Largest pole count the cascade supports.
pub const MAX_POLES: usize = 20;

/// Working length of the cascade arrays.
const CASCADE_LEN: usize = MAX_POLES + 2;

/// Highest Chebyshev ripple (percent) with a real pole ellipse.
const MAX_RIPPLE: f64 = 29.28;

/// Number of leading samples whose correction is suppressed while the
/// recursion settles.
pub fn transient_samples(order: usize) -> usize {
    match order {
        2 => 25,
        4 => 30,
        6 => 40,
        _ => 100,
    }
}

/// Frequency response of the synthesized filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterResponse {
    #[default]
    LowPass,
    HighPass,
}

/// Feed-forward (`a`) and feedback (`b`) recursion coefficients.
///
/// Both have `order + 1` entries; `b[0]` is unused and zero.
#[derive(Debug, Clone, PartialEq)]
pub struct RecursiveCoefficients {
    pub a: Vec<f64>,
    pub b: Vec<f64>,
}

impl RecursiveCoefficients {
    /// Coefficients used by the tilt filter for `order`.
    ///
    /// Even orders are synthesized as a Butterworth low-pass at `cutoff`,
    /// order 2 included: the tabulated order-2 set is never picked here, so
    /// the configured cutoff always applies. Odd orders fall back to
    /// [`tabulated`](Self::tabulated).
    pub fn for_order(order: usize, cutoff: f64) -> Result<Self> {
        if order % 2 == 0 {
            Self::synthesize(cutoff, order, 0.0, FilterResponse::LowPass)
        } else {
            Self::tabulated(order).ok_or(Error::UnsupportedFilterOrder(order))
        }
    }

    /// Precomputed coefficient sets for orders 2, 3 and 4.
    ///
    /// These ignore the cutoff: order 2 is a Butterworth low-pass near
    /// 0.01, order 3 a Chebyshev near 0.1 and order 4 a half-band design.
    pub fn tabulated(order: usize) -> Option<Self> {
        let (a, b): (&[f64], &[f64]) = match order {
            2 => (
                &[8.663387e-04, 1.732678e-03, 8.663387e-04],
                &[0.0, 1.919129, -9.225943e-01],
            ),
            3 => (
                &[0.0317, 0.0951, 0.0951, 0.0317],
                &[0.0, 1.4590, -0.9104, 0.1978],
            ),
            4 => (
                &[0.0946, 0.3759, 0.5639, 0.3759, 0.0940],
                &[0.0, 0.0, -0.486, 0.0, -0.0177],
            ),
            _ => return None,
        };
        Some(Self {
            a: a.to_vec(),
            b: b.to_vec(),
        })
    }

    /// Synthesize a `poles`-pole recursive filter.
    ///
    /// `cutoff` is a fraction of the sample rate in (0, 0.5); `ripple` is
    /// the Chebyshev pass-band ripple in percent, 0 for Butterworth.
    pub fn synthesize(cutoff: f64, poles: usize, ripple: f64, response: FilterResponse) -> Result<Self> {
        if !(cutoff > 0.0 && cutoff < 0.5) {
            return Err(Error::InvalidCutoff(cutoff));
        }
        if !(0.0..=MAX_RIPPLE).contains(&ripple) {
            return Err(Error::InvalidRipple(ripple));
        }
        if poles == 0 || poles % 2 != 0 || poles > MAX_POLES {
            return Err(Error::UnsupportedFilterOrder(poles));
        }

        let mut a = [0.0; CASCADE_LEN];
        let mut b = [0.0; CASCADE_LEN];
        a[2] = 1.0;
        b[2] = 1.0;

        for p in 1..=poles / 2 {
            let [a0, a1, a2, b1, b2] = pole_pair_stage(cutoff, poles, ripple, response, p);
            let ta = a;
            let tb = b;
            for i in 2..CASCADE_LEN {
                a[i] = a0 * ta[i] + a1 * ta[i - 1] + a2 * ta[i - 2];
                b[i] = tb[i] - b1 * tb[i - 1] - b2 * tb[i - 2];
            }
        }

        b[2] = 0.0;
        for i in 0..CASCADE_LEN - 2 {
            a[i] = a[i + 2];
            b[i] = -b[i + 2];
        }

        let (mut sa, mut sb) = (0.0, 0.0);
        for i in 0..CASCADE_LEN - 2 {
            let sign = match response {
                FilterResponse::HighPass if i % 2 == 1 => -1.0,
                _ => 1.0,
            };
            sa += a[i] * sign;
            sb += b[i] * sign;
        }
        let gain = sa / (1.0 - sb);

        Ok(Self {
            a: a[..=poles].iter().map(|v| v / gain).collect(),
            b: b[..=poles].to_vec(),
        })
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.a.len().saturating_sub(1)
    }

    /// Steady-state gain for a constant input.
    pub fn dc_gain(&self) -> f64 {
        let sa: f64 = self.a.iter().sum();
        let sb: f64 = self.b.iter().skip(1).sum();
        sa / (1.0 - sb)
    }
}

/// z-domain biquad `[a0, a1, a2, b1, b2]` of pole pair `p`.
fn pole_pair_stage(cutoff: f64, poles: usize, ripple: f64, response: FilterResponse, p: usize) -> [f64; 5] {
    let n = poles as f64;
    let angle = PI / (2.0 * n) + (p - 1) as f64 * PI / n;
    let mut rp = -angle.cos();
    let mut ip = angle.sin();

    if ripple > 0.0 {
        let es = ((100.0 / (100.0 - ripple)).powi(2) - 1.0).sqrt();
        let vx = (1.0 / n) * (1.0 / es + (1.0 / (es * es) + 1.0).sqrt()).ln();
        let kx = ((1.0 / n) * (1.0 / es + (1.0 / (es * es) - 1.0).sqrt()).ln()).cosh();
        rp *= vx.sinh() / kx;
        ip *= vx.cosh() / kx;
    }

    // s-domain to z-domain
    let t = 2.0 * 0.5f64.tan();
    let w = 2.0 * PI * cutoff;
    let m = rp * rp + ip * ip;
    let d = 4.0 - 4.0 * rp * t + m * t * t;
    let x0 = t * t / d;
    let x1 = 2.0 * x0;
    let x2 = x0;
    let y1 = (8.0 - 2.0 * m * t * t) / d;
    let y2 = (-4.0 - 4.0 * rp * t - m * t * t) / d;

    // 1 rad/sample prototype to the requested cutoff
    let k = match response {
        FilterResponse::LowPass => (0.5 - w / 2.0).sin() / (0.5 + w / 2.0).sin(),
        FilterResponse::HighPass => -(w / 2.0 + 0.5).cos() / (w / 2.0 - 0.5).cos(),
    };
    let d = 1.0 + y1 * k - y2 * k * k;
    let a0 = (x0 - x1 * k + x2 * k * k) / d;
    let a1 = (-2.0 * x0 * k + x1 + x1 * k * k - 2.0 * x2 * k) / d;
    let a2 = (x0 * k * k - x1 * k + x2) / d;
    let b1 = (2.0 * k + y1 + y1 * k * k - 2.0 * y2 * k) / d;
    let b2 = (-(k * k) - y1 * k + y2) / d;

    match response {
        FilterResponse::LowPass => [a0, a1, a2, b1, b2],
        FilterResponse::HighPass => [a0, -a1, a2, -b1, b2],
    }
}

/// Recursion state over per-line average ranges.
#[derive(Debug, Clone)]
pub struct RecursiveFilter {
    coefficients: RecursiveCoefficients,
    /// Raw inputs, newest first
    raw_history: VecDeque<f64>,
    /// Filtered outputs, newest first
    filtered_history: VecDeque<f64>,
    samples: usize,
    transient: usize,
}

impl RecursiveFilter {
    pub fn new(coefficients: RecursiveCoefficients) -> Self {
        let order = coefficients.order();
        Self {
            raw_history: VecDeque::from(vec![0.0; order + 1]),
            filtered_history: VecDeque::from(vec![0.0; order + 1]),
            transient: transient_samples(order),
            samples: 0,
            coefficients,
        }
    }

    /// Filter for `order` at `cutoff`; see [`RecursiveCoefficients::for_order`].
    pub fn with_order(order: usize, cutoff: f64) -> Result<Self> {
        Ok(Self::new(RecursiveCoefficients::for_order(order, cutoff)?))
    }

    pub fn coefficients(&self) -> &RecursiveCoefficients {
        &self.coefficients
    }

    /// Samples processed so far.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Feed one line's `(tilt, average)`; returns `(corrected tilt, filtered average)`.
    ///
    /// The tilt is returned unchanged until the transient has passed.
    pub fn correct_tilt(&mut self, tilt: f64, average: f64) -> (f64, f64) {
        let c = &self.coefficients;
        let mut filtered = c.a[0] * average;
        for i in 1..c.a.len() {
            filtered += c.a[i] * self.raw_history[i - 1] + c.b[i] * self.filtered_history[i - 1];
        }

        self.raw_history.pop_back();
        self.filtered_history.pop_back();
        self.raw_history.push_front(average);
        self.filtered_history.push_front(filtered);

        self.samples += 1;
        if self.samples < self.transient || filtered == 0.0 {
            return (tilt, filtered);
        }
        (tilt + (1.0 - average / filtered) / tilt.tan(), filtered)
    }
}

/// IIR low-pass tilt filter stream.
pub struct RecursiveLowPass<S> {
    inner: S,
    filter: RecursiveFilter,
    averaging: AveragingWindow,
    last_average: Option<RangeAverage>,
}

impl<S: ScanLineStream> RecursiveLowPass<S> {
    pub fn new(inner: S, filter: RecursiveFilter, averaging: AveragingWindow) -> Self {
        log::debug!(
            "Recursive low-pass: order {} a={:?} b={:?}",
            filter.coefficients().order(),
            filter.coefficients().a,
            filter.coefficients().b
        );
        Self {
            inner,
            filter,
            averaging,
            last_average: None,
        }
    }

    pub fn filter(&self) -> &RecursiveFilter {
        &self.filter
    }
}

impl<S: ScanLineStream> ScanLineStream for RecursiveLowPass<S> {
    fn next_line(&mut self) -> Result<Option<ScanLine>> {
        let Some(mut line) = self.inner.next_line()? else {
            return Ok(None);
        };
        let raw = self.averaging.average(&line.ranges);
        let (tilt, filtered) = self.filter.correct_tilt(line.tilt, raw);
        line.tilt = tilt;
        self.last_average = Some(RangeAverage { raw, filtered });
        Ok(Some(line))
    }

    fn name(&self) -> &'static str {
        "recursive-lowpass"
    }

    fn last_average(&self) -> Option<RangeAverage> {
        self.last_average
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_two_pole_butterworth_reference_values() {
        let c = RecursiveCoefficients::synthesize(0.1, 2, 0.0, FilterResponse::LowPass).unwrap();
        assert_relative_eq!(c.a[0], 6.745527e-02, epsilon = 1e-8);
        assert_relative_eq!(c.a[1], 1.349105e-01, epsilon = 1e-7);
        assert_relative_eq!(c.a[2], 6.745527e-02, epsilon = 1e-8);
        assert_relative_eq!(c.b[1], 1.142981, epsilon = 1e-6);
        assert_relative_eq!(c.b[2], -4.128016e-01, epsilon = 1e-7);
    }

    #[test]
    fn test_chebyshev_reference_values() {
        let c = RecursiveCoefficients::synthesize(0.1, 4, 0.5, FilterResponse::LowPass).unwrap();
        assert_relative_eq!(c.a[0], 2.780757e-03, epsilon = 1e-8);
        assert_relative_eq!(c.b[1], 2.764031, epsilon = 1e-6);
        assert_relative_eq!(c.b[4], -3.502230e-01, epsilon = 1e-6);
    }

    #[test]
    fn test_unit_gain() {
        for &(fc, poles) in &[(0.02, 4), (0.05, 6), (0.2, 2), (0.01, 8)] {
            let c = RecursiveCoefficients::synthesize(fc, poles, 0.0, FilterResponse::LowPass).unwrap();
            assert_eq!(c.order(), poles);
            assert_relative_eq!(c.dc_gain(), 1.0, epsilon = 1e-6);
        }

        let hp = RecursiveCoefficients::synthesize(0.1, 4, 0.0, FilterResponse::HighPass).unwrap();
        let sa: f64 = hp.a.iter().enumerate().map(|(i, v)| if i % 2 == 1 { -v } else { *v }).sum();
        let sb: f64 = hp.b.iter().enumerate().map(|(i, v)| if i % 2 == 1 { -v } else { *v }).sum();
        assert_relative_eq!(sa / (1.0 - sb), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_order_two_follows_cutoff() {
        let c = RecursiveCoefficients::for_order(2, 0.02).unwrap();
        let expected = RecursiveCoefficients::synthesize(0.02, 2, 0.0, FilterResponse::LowPass).unwrap();
        assert_eq!(c, expected);
        assert_ne!(Some(c), RecursiveCoefficients::tabulated(2));
    }

    #[test]
    fn test_tabulated_sets_have_unit_gain() {
        for order in 2..=4 {
            let c = RecursiveCoefficients::tabulated(order).unwrap();
            assert_eq!(c.order(), order);
            assert_relative_eq!(c.dc_gain(), 1.0, epsilon = 5e-3);
        }
        assert!(RecursiveCoefficients::tabulated(5).is_none());
    }

    #[test]
    fn test_order_selection() {
        assert!(RecursiveCoefficients::for_order(3, 0.02).is_ok());
        assert!(matches!(
            RecursiveCoefficients::for_order(5, 0.02),
            Err(Error::UnsupportedFilterOrder(5))
        ));
        assert!(matches!(
            RecursiveCoefficients::for_order(22, 0.02),
            Err(Error::UnsupportedFilterOrder(22))
        ));
        assert!(matches!(
            RecursiveCoefficients::for_order(4, 0.6),
            Err(Error::InvalidCutoff(_))
        ));
        assert!(matches!(
            RecursiveCoefficients::synthesize(0.1, 4, 40.0, FilterResponse::LowPass),
            Err(Error::InvalidRipple(_))
        ));
    }

    #[test]
    fn test_transient_suppressed_for_order_four() {
        let mut filter = RecursiveFilter::with_order(4, 0.02).unwrap();
        for call in 1..30 {
            let (tilt, _) = filter.correct_tilt(0.5, 1000.0);
            assert_eq!(tilt, 0.5, "call {} modified the tilt", call);
        }
        let (tilt, filtered) = filter.correct_tilt(0.5, 1000.0);
        assert_ne!(tilt, 0.5);
        assert_relative_eq!(filtered, 820.8269, epsilon = 1e-3);
    }

    #[test]
    fn test_converges_on_constant_input() {
        let mut filter = RecursiveFilter::with_order(4, 0.02).unwrap();
        let mut last = (0.0, 0.0);
        for _ in 0..400 {
            last = filter.correct_tilt(0.5, 1000.0);
        }
        assert_relative_eq!(last.1, 1000.0, epsilon = 1e-3);
        assert_relative_eq!(last.0, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_transient_lengths() {
        assert_eq!(transient_samples(2), 25);
        assert_eq!(transient_samples(4), 30);
        assert_eq!(transient_samples(6), 40);
        assert_eq!(transient_samples(8), 100);
        assert_eq!(RecursiveFilter::with_order(3, 0.02).unwrap().transient, 100);
    }
}
