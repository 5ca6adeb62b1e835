//! # vantage-viewshed
//!
//! Line-of-sight analysis over the vantage terrain pipeline.
//!
//! This crate provides tools for deciding what a ground site can see,
//! taking Earth curvature and atmospheric refraction into account.
//!
//! ## Features
//!
//! - **Viewshed**: azimuth sweep with visible area, coverage percentage, and merged obstructions
//! - **Horizon Mask**: per-azimuth horizon elevation angles for siting reports
//! - **Elevation Profile**: point-to-point terrain with line-of-sight and 60% Fresnel clearance
//!
//! Every result carries a [`Provenance`](vantage_dem::Provenance) record so
//! analyses built on synthetic fallback terrain can be recognised.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use vantage_dem::{FunctionSource, PipelineConfig, TerrainPipeline};
//! use vantage_viewshed::{ViewshedCalculator, ViewshedRequest};
//!
//! let pipeline = TerrainPipeline::new(PipelineConfig::default())
//!     .with_source(FunctionSource::new("flat", 30.0, |_, _| 50.0));
//! let calculator = ViewshedCalculator::new(Arc::new(pipeline));
//!
//! let request = ViewshedRequest::new(40.5, -105.5, 5.0).with_azimuth_step(10.0);
//! let analysis = calculator.calculate_viewshed(&request)?;
//! assert_eq!(analysis.horizon.len(), 36);
//! # Ok::<(), vantage_viewshed::ViewshedError>(())
//! ```

mod error;
mod obstruction;
mod params;
mod profile;
mod viewshed;

pub use error::{Result, ViewshedError};
pub use obstruction::{merge_sectors, severity, signal_loss_db, ObstructionClass, TerrainObstruction};
pub use params::ViewshedParams;
pub use profile::{ElevationProfile, FresnelClearance, ProfileRequest, ProfileSample, FRESNEL_CLEARANCE_FRACTION};
pub use viewshed::{HorizonMask, HorizonPoint, ViewshedAnalysis, ViewshedCalculator, ViewshedRequest};
