//! Tilt smoothing filters.
//!
//! The tilt encoder jitters from line to line while the true scan surface
//! changes slowly. Both filters low-pass the per-line average range over a
//! sub-range of bearings and attribute the difference between the raw and
//! the smoothed average to a tilt error.
//!
//! | Filter                 | Kind | Latency            | Output lines            |
//! |------------------------|------|--------------------|-------------------------|
//! | [`SymmetricLowPass`]   | FIR  | `window / 2` lines | center of a Hamming window |
//! | [`RecursiveLowPass`]   | IIR  | none               | every line, after transient |

mod fir;
mod hamming;
mod iir;

pub use fir::{tilt_delta, SymmetricLowPass};
pub use hamming::HammingWindow;
pub use iir::{
    transient_samples, FilterResponse, RecursiveCoefficients, RecursiveFilter, RecursiveLowPass,
};

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Tilt smoothing strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiltFilterKind {
    /// Raw tilt
    #[default]
    None,
    /// Hamming-window FIR low-pass
    Symmetric,
    /// Butterworth/Chebyshev IIR low-pass
    Recursive,
}

impl fmt::Display for TiltFilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TiltFilterKind::None => write!(f, "none"),
            TiltFilterKind::Symmetric => write!(f, "symmetric"),
            TiltFilterKind::Recursive => write!(f, "recursive"),
        }
    }
}
