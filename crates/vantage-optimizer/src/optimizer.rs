//! The optimizer front door shared by every search strategy.

use crate::config::OptimizerConfig;
use crate::objectives::{SiteEvaluation, SiteEvaluator};
use crate::{OptimizerError, Result};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vantage_dem::TileBounds;
use vantage_viewshed::ViewshedCalculator;

/// Multi-strategy site optimizer over a shared viewshed calculator.
///
/// Strategies live in their own modules:
/// [`optimize_site_selection`](TerrainOptimizer::optimize_site_selection) (NSGA-II),
/// [`optimize_spatial_coverage`](TerrainOptimizer::optimize_spatial_coverage)
/// (annealing or greedy), and
/// [`optimize_h3_grid`](TerrainOptimizer::optimize_h3_grid) (hex pre-screening).
#[derive(Debug, Clone)]
pub struct TerrainOptimizer {
    evaluator: SiteEvaluator,
    cancel: Option<Arc<AtomicBool>>,
}

impl TerrainOptimizer {
    /// Optimizer with a validated configuration.
    pub fn new(calculator: ViewshedCalculator, config: OptimizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            evaluator: SiteEvaluator::new(calculator, config),
            cancel: None,
        })
    }

    /// Stop long searches once `flag` is set, checked once per generation or iteration.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        self.evaluator.config()
    }

    pub fn evaluator(&self) -> &SiteEvaluator {
        &self.evaluator
    }

    /// Score a single site.
    pub fn evaluate_site(&self, lat: f64, lon: f64) -> Result<SiteEvaluation> {
        self.evaluator.evaluate(lat, lon, "single")
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Evaluate sites in parallel, results in input order.
    pub(crate) fn evaluate_all(&self, sites: &[(f64, f64)], strategy: &'static str) -> Result<Vec<SiteEvaluation>> {
        sites
            .par_iter()
            .map(|&(lat, lon)| self.evaluator.evaluate(lat, lon, strategy))
            .collect()
    }

    pub(crate) fn validate_area(area: &TileBounds) -> Result<()> {
        area.validate()?;
        if area.lat_span() <= 0.0 || area.lon_span() <= 0.0 {
            return Err(OptimizerError::InvalidConfig(
                "search area must have a positive extent".to_string(),
            ));
        }
        Ok(())
    }
}
