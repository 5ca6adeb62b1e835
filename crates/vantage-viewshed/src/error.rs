//! Error types for viewshed analysis.

use thiserror::Error;
use vantage_dem::TerrainError;

/// Errors that can occur during viewshed or profile analysis.
#[derive(Debug, Error)]
pub enum ViewshedError {
    /// Elevation lookup failed (invalid coordinate, or strict-mode source failure).
    #[error("Terrain error: {0}")]
    Terrain(#[from] TerrainError),

    /// A request parameter is out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for viewshed operations.
pub type Result<T> = std::result::Result<T, ViewshedError>;
