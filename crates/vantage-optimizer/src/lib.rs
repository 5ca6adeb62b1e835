//! # vantage-optimizer
//!
//! Multi-objective site selection over the vantage terrain and viewshed crates.
//!
//! Sites are scored on five objectives (elevation suitability, visibility,
//! accessibility, construction cost, environmental risk), each in [0, 1] and
//! oriented higher-is-better. Four strategies share that evaluation:
//!
//! - **NSGA-II** ([`TerrainOptimizer::optimize_site_selection`]): Pareto ranking,
//!   crowding tiebreaks, elitism, tournament selection, blend crossover, and
//!   Gaussian mutation, stopping on a real improvement-rate check.
//! - **Simulated annealing** and **greedy coverage**
//!   ([`TerrainOptimizer::optimize_spatial_coverage`]): place a fixed number of
//!   sites to maximise combined visible area.
//! - **H3 pre-screening** ([`TerrainOptimizer::optimize_h3_grid`]): score hex
//!   cell centres for coarse regional ranking.
//!
//! Every stochastic entry point takes an explicit `Rng`, so a seeded
//! generator reproduces results exactly.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use rand::SeedableRng;
//! use vantage_dem::{FunctionSource, PipelineConfig, TerrainPipeline, TileBounds};
//! use vantage_optimizer::{OptimizerConfig, TerrainOptimizer};
//! use vantage_viewshed::ViewshedCalculator;
//!
//! let pipeline = TerrainPipeline::new(PipelineConfig::default())
//!     .with_source(FunctionSource::new("hills", 30.0, |lat, lon| {
//!         (400.0 + 300.0 * (lat * 20.0).sin() * (lon * 20.0).cos()) as f32
//!     }));
//! let calculator = ViewshedCalculator::new(Arc::new(pipeline));
//!
//! let mut config = OptimizerConfig::default();
//! config.genetic.population_size = 6;
//! config.genetic.max_generations = 2;
//! config.viewshed_range_km = 2.0;
//! config.azimuth_step_deg = 45.0;
//! config.metrics_window_km = 1.0;
//!
//! let optimizer = TerrainOptimizer::new(calculator, config)?;
//! let area = TileBounds::new(10.1, 10.3, 20.1, 20.3)?;
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let result = optimizer.optimize_site_selection(&area, &mut rng)?;
//! assert!(!result.pareto_frontier.is_empty());
//! # Ok::<(), vantage_optimizer::OptimizerError>(())
//! ```

mod annealing;
mod config;
mod constraints;
mod coverage;
mod error;
mod genetic;
mod greedy;
mod hexgrid;
mod objectives;
mod optimizer;
mod pareto;

pub use annealing::{accept_move, cooling_steps};
pub use config::{AnnealingParams, GeneticParams, GreedyParams, ObjectiveWeights, OptimizerConfig};
pub use constraints::{ExclusionZone, SiteConstraints};
pub use coverage::{overlap_penalty, CoverageResult, CoverageSite, CoverageStrategy, SearchStats};
pub use error::{OptimizerError, Result};
pub use genetic::{has_converged, GenerationStats, GeneticResult};
pub use greedy::{candidate_grid, marginal_gain};
pub use hexgrid::{cell_at, cell_center, cells_for_region, expand_cells, parse_cells, parse_resolution, HexCellScore};
pub use objectives::{
    accessibility_score, cost_score, elevation_score, risk_score, visibility_score, ObjectiveScores, SiteEvaluation,
    SiteEvaluator, VISIBILITY_SATURATION_KM2,
};
pub use optimizer::TerrainOptimizer;
pub use pareto::{crowding_distance, non_dominated_sort, rank_candidates, SiteCandidate};

pub use h3o::{CellIndex, Resolution};
