//! Symmetric (FIR) tilt filter over a Hamming window of lines.

use std::collections::VecDeque;

use super::hamming::HammingWindow;
use crate::core::types::{AveragingWindow, ScanLine};
use crate::error::Result;
use crate::sensors::source::{RangeAverage, ScanLineStream};

/// Tilt correction that maps a line's average range onto the smoothed one.
///
/// With `ratio = average / filtered`, the corrected tilt is
/// `acos(cos(tilt) * ratio)`; when that argument leaves the arccosine
/// domain the correction falls back to `tilt * (1/ratio - 1)`.
pub fn tilt_delta(tilt: f64, average: f64, filtered: f64) -> f64 {
    if filtered <= 0.0 || filtered.is_nan() {
        return 0.0;
    }
    let ratio = average / filtered;
    let cos_tilt = tilt.cos();
    if ratio * cos_tilt > 1.0 {
        tilt * (1.0 / ratio - 1.0)
    } else {
        (cos_tilt * ratio).max(-1.0).acos() - tilt
    }
}

#[derive(Debug)]
struct Slot {
    /// `None` once emitted
    line: Option<ScanLine>,
    tilt: f64,
    average: f64,
}

/// FIR low-pass tilt filter.
///
/// Keeps the last `window_size` lines. Once full, the center line is
/// emitted with its tilt corrected by [`tilt_delta`] against the
/// Hamming-weighted average of the window. Lines that never reach the
/// center (the first and last `window_size / 2` of the stream) pass
/// through unmodified, so every input line is emitted exactly once and in
/// order.
pub struct SymmetricLowPass<S> {
    inner: S,
    window: HammingWindow,
    averaging: AveragingWindow,
    slots: VecDeque<Slot>,
    exhausted: bool,
    last_average: Option<RangeAverage>,
}

impl<S: ScanLineStream> SymmetricLowPass<S> {
    /// Fails with `InvalidWindowSize` unless `window_size` is odd and >= 3.
    pub fn new(inner: S, window_size: usize, averaging: AveragingWindow) -> Result<Self> {
        let window = HammingWindow::new(window_size)?;
        log::debug!("Symmetric low-pass: window {} over samples {:?}", window_size, averaging.indices());
        Ok(Self {
            inner,
            slots: VecDeque::with_capacity(window.len()),
            window,
            averaging,
            exhausted: false,
            last_average: None,
        })
    }

    pub fn window(&self) -> &HammingWindow {
        &self.window
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Correct and emit the center of a full window, then drop the oldest slot.
    fn emit_center(&mut self) -> Option<ScanLine> {
        let filtered = self.window.apply(self.slots.iter().map(|s| s.average));
        let center = &mut self.slots[self.window.middle_index()];

        let delta = tilt_delta(center.tilt, center.average, filtered);
        let average = center.average;
        let line = center.line.take().map(|mut line| {
            line.tilt += delta;
            line
        });
        log::trace!("avg {:.1} filtered {:.1} delta tilt {:.5}", average, filtered, delta);

        self.last_average = Some(RangeAverage {
            raw: average,
            filtered,
        });
        self.slots.pop_front();
        line
    }

    fn pass_through(&mut self, slot: Slot) -> Option<ScanLine> {
        self.last_average = Some(RangeAverage {
            raw: slot.average,
            filtered: slot.average,
        });
        slot.line
    }
}

impl<S: ScanLineStream> ScanLineStream for SymmetricLowPass<S> {
    fn next_line(&mut self) -> Result<Option<ScanLine>> {
        while !self.exhausted {
            let Some(line) = self.inner.next_line()? else {
                self.exhausted = true;
                break;
            };
            let average = self.averaging.average(&line.ranges);
            self.slots.push_back(Slot {
                tilt: line.tilt,
                average,
                line: Some(line),
            });

            if self.slots.len() == self.window.len() {
                if let Some(line) = self.emit_center() {
                    return Ok(Some(line));
                }
            } else if self.slots.len() <= self.window.middle_index() {
                // Leading lines can never be centered.
                let Some(slot) = self.slots.back_mut() else {
                    continue;
                };
                let early = Slot {
                    line: slot.line.take(),
                    tilt: slot.tilt,
                    average: slot.average,
                };
                if let Some(line) = self.pass_through(early) {
                    return Ok(Some(line));
                }
            }
        }

        while let Some(slot) = self.slots.pop_front() {
            if let Some(line) = self.pass_through(slot) {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "symmetric-lowpass"
    }

    fn last_average(&self) -> Option<RangeAverage> {
        self.last_average
    }
}
