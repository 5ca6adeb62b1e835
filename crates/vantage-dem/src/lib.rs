//! # vantage-dem
//!
//! Elevation data pipeline for terrain siting analysis.
//!
//! This crate provides:
//! - Terrain value types ([`TerrainPoint`], [`TerrainTile`], [`TerrainMetrics`])
//! - Pluggable elevation sources with coverage boxes and request budgets
//! - Tile quality validation, void filling, and a deterministic synthetic fallback
//! - A byte-bounded, TTL-expiring tile cache
//! - Regional terrain statistics (elevation, ruggedness, slope, aspect)
//!
//! ## Overview
//!
//! Tiles are one-degree cells keyed by the floor of their south-west corner
//! (`"47_-123"`). A [`TerrainPipeline`] tries its sources in order, skipping
//! those whose coverage excludes the point, rejecting tiles whose quality
//! score falls below the configured threshold, and finally generating
//! synthetic terrain tagged `source = "synthetic"` so callers can detect
//! degraded provenance. Strict mode turns that last step into
//! [`TerrainError::AllSourcesFailed`].
//!
//! ## Examples
//!
//! ### Using Local USGS Tiles
//!
//! ```no_run
//! use vantage_dem::{GeoTiffSource, PipelineConfig, TerrainPipeline};
//!
//! let source = GeoTiffSource::from_directory("usgs", "dem_data")?; // indexes filenames only
//! let pipeline = TerrainPipeline::new(PipelineConfig::default()).with_source(source);
//!
//! let point = pipeline.get_elevation(47.6062, -122.3321)?;
//! println!("Seattle elevation: {} meters ({})", point.elevation, point.source);
//! # Ok::<(), vantage_dem::TerrainError>(())
//! ```
//!
//! ### Regional Metrics
//!
//! ```
//! use vantage_dem::{FunctionSource, PipelineConfig, TerrainPipeline, TileBounds};
//!
//! let pipeline = TerrainPipeline::new(PipelineConfig::default())
//!     .with_source(FunctionSource::new("analytic", 30.0, |lat, _| (lat * 1000.0) as f32));
//!
//! let bounds = TileBounds::new(0.1, 0.2, 0.1, 0.2)?;
//! let metrics = pipeline.calculate_terrain_metrics(&bounds, 30.0)?;
//! assert!(metrics.ruggedness_index > 0.0);
//! # Ok::<(), vantage_dem::TerrainError>(())
//! ```

mod cache;
mod config;
mod error;
pub mod geo;
mod pipeline;
mod quality;
mod source;
mod synthetic;
mod terrain_metrics;
mod tile;
mod types;

pub use cache::{CacheEntry, CacheStats, TileCache};
pub use config::PipelineConfig;
pub use error::TerrainError;
pub use pipeline::TerrainPipeline;
pub use quality::{assess_tile, resolution_score, QualityReport};
pub use source::{ElevationFn, ElevationSource, FunctionSource, GeoTiffSource, GridSource, RateLimit, RateLimiter};
pub use synthetic::SyntheticSource;
pub use terrain_metrics::{AspectDistribution, ElevationPercentiles, SampleGrid, TerrainMetrics, FLAT_SLOPE_DEG};
pub use tile::{TerrainTile, TileBounds, TileKey, TileMetadata};
pub use types::{Provenance, TerrainPoint, SYNTHETIC_SOURCE};

/// Result type for terrain operations.
pub type Result<T> = std::result::Result<T, TerrainError>;
