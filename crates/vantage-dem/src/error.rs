//! Error types for the terrain pipeline.

use thiserror::Error;

/// Errors that can occur when fetching or analysing elevation data.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// Latitude or longitude outside the valid geographic range.
    #[error("Invalid coordinate ({lat}, {lon}): latitude must be in [-90, 90] and longitude in [-180, 180]")]
    InvalidCoordinate {
        /// Requested latitude.
        lat: f64,
        /// Requested longitude.
        lon: f64,
    },

    /// A source could not deliver a tile.
    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable {
        /// Source name.
        source_name: String,
        /// Reason for failure.
        reason: String,
    },

    /// A fetched tile scored below the configured quality threshold.
    #[error("Tile from '{source_name}' failed validation: quality {score:.3} below threshold {threshold:.3}")]
    ValidationFailure {
        /// Source name.
        source_name: String,
        /// Computed quality score.
        score: f64,
        /// Configured threshold.
        threshold: f64,
    },

    /// A fetched tile does not span the whole degree cell it is cached under.
    #[error("Tile from '{source_name}' only partly covers cell {cell}")]
    PartialTile {
        /// Source name.
        source_name: String,
        /// Cell the tile was requested for.
        cell: String,
    },

    /// A source's request budget for the current window is exhausted.
    #[error("Rate limit exceeded for source '{source_name}'")]
    RateLimitExceeded {
        /// Source name.
        source_name: String,
    },

    /// Every configured source failed and strict mode forbids synthetic data.
    #[error("No elevation source could serve ({lat}, {lon}): {}", attempts.join("; "))]
    AllSourcesFailed {
        /// Requested latitude.
        lat: f64,
        /// Requested longitude.
        lon: f64,
        /// One message per failed source, in preference order.
        attempts: Vec<String>,
    },

    /// Grid dimensions do not match the declared bounds and resolution.
    #[error("Grid shape {rows}x{cols} does not match bounds/resolution (expected {expected_rows}x{expected_cols})")]
    GridShapeMismatch {
        /// Rows supplied.
        rows: usize,
        /// Columns supplied.
        cols: usize,
        /// Rows implied by bounds and resolution.
        expected_rows: usize,
        /// Columns implied by bounds and resolution.
        expected_cols: usize,
    },

    /// Bounds are empty, inverted, or outside the globe.
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    /// Resolution is not a positive, finite number of arc-seconds.
    #[error("Invalid resolution: {0} arc-seconds")]
    InvalidResolution(f64),

    /// A path or grid request asked for too few samples.
    #[error("Invalid sample count {count}: at least {minimum} required")]
    InvalidSampleCount {
        /// Samples requested.
        count: usize,
        /// Smallest accepted count.
        minimum: usize,
    },

    /// Cache lock was poisoned (a thread panicked while holding the lock).
    #[error("Tile cache lock was poisoned")]
    CacheLockPoisoned,

    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding error.
    #[error("TIFF decode error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing required tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Invalid tile filename - cannot parse coordinates.
    #[error("Invalid tile filename: {0}")]
    InvalidFilename(String),

    /// Unsupported data type in the TIFF file.
    #[error("Unsupported TIFF data type: {0}")]
    UnsupportedDataType(String),
}

impl TerrainError {
    /// Short reason label used for metrics and fallback logging.
    pub fn reason_label(&self) -> &'static str {
        match self {
            TerrainError::RateLimitExceeded { .. } => "rate_limited",
            TerrainError::ValidationFailure { .. }
            | TerrainError::PartialTile { .. }
            | TerrainError::GridShapeMismatch { .. } => "validation",
            _ => "unavailable",
        }
    }

    /// True for failures the fallback chain recovers from by trying the next source.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            TerrainError::InvalidCoordinate { .. } | TerrainError::CacheLockPoisoned
        )
    }
}
