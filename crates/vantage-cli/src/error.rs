use std::path::PathBuf;
use thiserror::Error;
use vantage_dem::TerrainError;
use vantage_optimizer::OptimizerError;
use vantage_viewshed::ViewshedError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read config {}: {source}", .path.display())]
    ConfigRead { path: PathBuf, source: std::io::Error },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Terrain(#[from] TerrainError),

    #[error(transparent)]
    Viewshed(#[from] ViewshedError),

    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("failed to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
