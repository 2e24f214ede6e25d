//! Error types for the analysis core and its input layers.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by series construction, kernel creation, phase scanning and
/// spike extrapolation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// An entry is dated before the builder's cursor (misordered, duplicated,
    /// or earlier than the epoch).
    #[error("Sequence error: entry dated {date} precedes expected date {cursor}")]
    Sequence { date: NaiveDate, cursor: NaiveDate },

    /// A parameter is outside its valid domain.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A correlation window does not fit inside the series.
    #[error("Index out of range: window of half-width {half_width} centred at {centre} exceeds series of length {len}")]
    IndexOutOfRange {
        centre: i64,
        half_width: usize,
        len: usize,
    },

    /// Not enough qualifying samples were found.
    #[error("Insufficient data: required {required}, found {found}")]
    InsufficientData { required: usize, found: usize },

    /// Every offset in a phase scan was skipped.
    #[error("No scorable offset in range {start}..={end}")]
    NoScorableOffset { start: i64, end: i64 },
}

impl AnalysisError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn insufficient_data(required: usize, found: usize) -> Self {
        Self::InsufficientData { required, found }
    }
}

/// Errors raised while reading activity log lines.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Line {line}: {reason}")]
    Format { line: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while decoding an image into an intensity grid.
#[derive(Debug, Error)]
pub enum ImageSourceError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("FITS file {path} has no usable image data: {reason}")]
    Fits { path: String, reason: String },

    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}
