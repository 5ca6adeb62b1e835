//! Error types for site optimization.

use thiserror::Error;
use vantage_dem::TerrainError;
use vantage_viewshed::ViewshedError;

/// Errors that can occur while searching for sites.
#[derive(Debug, Error)]
pub enum OptimizerError {
    /// Elevation lookup failed.
    #[error("Terrain error: {0}")]
    Terrain(#[from] TerrainError),

    /// Viewshed evaluation failed.
    #[error("Viewshed error: {0}")]
    Viewshed(#[from] ViewshedError),

    /// Every candidate was removed by the site constraints.
    #[error("No feasible site: all {considered} candidates violated the site constraints")]
    NoFeasibleSite { considered: usize },

    /// A configuration value is out of range.
    #[error("Invalid optimizer configuration: {0}")]
    InvalidConfig(String),

    /// An H3 cell index or resolution could not be used.
    #[error("Invalid H3 cell: {0}")]
    InvalidCell(String),
}

/// Result type for optimizer operations.
pub type Result<T> = std::result::Result<T, OptimizerError>;
