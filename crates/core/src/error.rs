//! Error types for coralsurf

use thiserror::Error;

/// Main error type for coralsurf operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    /// A configuration value is out of range. Fatal before any work starts.
    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Insufficient data: need at least {needed} points, found {found}")]
    InsufficientData { needed: usize, found: usize },

    #[error("Degenerate support boundary: {distinct_points} distinct location(s) do not enclose an area")]
    DegenerateBoundary { distinct_points: usize },

    #[error("Interpolation failed: {0}")]
    Interpolation(String),

    #[error("No surface stored for year {year}")]
    MissingSurface { year: i32 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidParameter`].
    pub fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Category reported next to a missing value in a result series.
    pub fn reason(&self) -> NoDataReason {
        match self {
            Error::InsufficientData { .. } => NoDataReason::InsufficientData,
            Error::DegenerateBoundary { .. } => NoDataReason::DegenerateBoundary,
            Error::MissingSurface { .. } => NoDataReason::MissingSurface,
            Error::CrsMismatch(..) => NoDataReason::CrsMismatch,
            Error::Io(_) | Error::Parse(_) => NoDataReason::StorageFailure,
            _ => NoDataReason::InterpolationFailure,
        }
    }
}

/// Why a year carries no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoDataReason {
    /// Too few observations to fit a surface
    InsufficientData,
    /// Observations do not enclose an area
    DegenerateBoundary,
    /// Fitting failed or input was malformed
    InterpolationFailure,
    /// No surface was built or stored for the year
    MissingSurface,
    /// Every query point fell outside the supported region
    NoSupport,
    /// Query and surface spatial references differ
    CrsMismatch,
    /// Reading or writing the surface failed
    StorageFailure,
    /// The run was cancelled before the year completed
    Cancelled,
}

impl NoDataReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoDataReason::InsufficientData => "insufficient data",
            NoDataReason::DegenerateBoundary => "degenerate boundary",
            NoDataReason::InterpolationFailure => "interpolation failure",
            NoDataReason::MissingSurface => "missing surface",
            NoDataReason::NoSupport => "no support",
            NoDataReason::CrsMismatch => "CRS mismatch",
            NoDataReason::StorageFailure => "storage failure",
            NoDataReason::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for NoDataReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for coralsurf operations
pub type Result<T> = std::result::Result<T, Error>;
