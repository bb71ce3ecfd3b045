//! Error types for tiltscan

use std::path::PathBuf;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// tiltscan error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input file could not be opened
    #[error("Cannot open {}: {source}", path.display())]
    FileOpen {
        /// Path that failed to open
        path: PathBuf,
        /// Underlying reason
        source: std::io::Error,
    },

    /// Stream ended in the middle of a fixed-size record
    #[error("Incomplete record: expected {expected} bytes, got {actual}")]
    IncompleteRecord {
        /// Full record length
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Scan line with a range count other than 180 or 181
    #[error("Invalid scan line: {0} range samples")]
    InvalidScanLine(u16),

    /// Symmetric filter window must be odd and at least 3
    #[error("Invalid window size: {0} (must be odd and >= 3)")]
    InvalidWindowSize(usize),

    /// Recursive filter order with neither synthesized nor tabulated coefficients
    #[error("Unsupported filter order: {0}")]
    UnsupportedFilterOrder(usize),

    /// Cutoff outside the open interval (0, 0.5)
    #[error("Invalid cutoff frequency: {0} (must be in (0, 0.5))")]
    InvalidCutoff(f64),

    /// Chebyshev ripple outside [0, 29.28]
    #[error("Invalid ripple: {0}% (must be in [0, 29.28])")]
    InvalidRipple(f64),

    /// Averaging sub-range is empty
    #[error("Invalid angle range: left {left} deg must be less than right {right} deg")]
    InvalidAngleRange {
        /// Left bound relative to straight ahead
        left: i32,
        /// Right bound relative to straight ahead
        right: i32,
    },

    /// Unparseable time string
    #[error("Invalid time: {0} (expected YYYY-MM-DD hh:mm:ss)")]
    InvalidTime(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Inconsistent configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap an open failure with the offending path.
    pub fn file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileOpen {
            path: path.into(),
            source,
        }
    }
}
