//! Fixed-count spatial coverage: shared types and strategy dispatch.

use crate::optimizer::TerrainOptimizer;
use crate::{OptimizerError, Result};
use rand::Rng;
use vantage_dem::geo::distance_km;
use vantage_dem::{Provenance, TileBounds};
use vantage_metrics::metric_defs;

/// How to place a fixed number of sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CoverageStrategy {
    /// Simulated annealing from random starting sites.
    Annealing,
    /// Greedy picks from a regular candidate grid.
    Greedy,
}

impl CoverageStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageStrategy::Annealing => "annealing",
            CoverageStrategy::Greedy => "greedy",
        }
    }
}

/// One placed site and the area it sees.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoverageSite {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
    /// Visible area of the site's viewshed, km².
    pub coverage_km2: f64,
    pub provenance: Provenance,
}

impl CoverageSite {
    pub fn location(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// Move counters of a coverage search.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchStats {
    pub iterations: usize,
    pub accepted_moves: usize,
    pub rejected_moves: usize,
    /// Temperature when annealing stopped; 0 for greedy.
    pub final_temperature: f64,
}

/// Outcome of a coverage search.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoverageResult {
    pub strategy: CoverageStrategy,
    /// Best configuration found.
    pub sites: Vec<CoverageSite>,
    /// Sum of per-site coverage, km² (overlaps counted twice).
    pub total_coverage_km2: f64,
    /// Overlap penalty of the returned configuration.
    pub overlap_penalty: f64,
    /// Cost of the returned configuration.
    pub best_cost: f64,
    /// Cost of the configuration the search ended on.
    pub final_cost: f64,
    pub stats: SearchStats,
    pub cancelled: bool,
    pub provenance: Provenance,
}

impl CoverageResult {
    pub(crate) fn from_sites(
        strategy: CoverageStrategy,
        sites: Vec<CoverageSite>,
        overlap_penalty: f64,
        final_cost: f64,
        stats: SearchStats,
        cancelled: bool,
    ) -> Self {
        let total_coverage_km2 = sites.iter().map(|s| s.coverage_km2).sum::<f64>();
        let mut provenance = Provenance::default();
        for site in &sites {
            provenance.merge(&site.provenance);
        }
        Self {
            strategy,
            sites,
            total_coverage_km2,
            overlap_penalty,
            best_cost: overlap_penalty - total_coverage_km2,
            final_cost,
            stats,
            cancelled,
            provenance,
        }
    }
}

/// Penalty for site pairs closer than `radius_km`: `weight · Σ (radius − d)`.
pub fn overlap_penalty(sites: &[CoverageSite], radius_km: f64, weight: f64) -> f64 {
    let mut penalty = 0.0;
    for (i, a) in sites.iter().enumerate() {
        for b in &sites[i + 1..] {
            let d = distance_km(a.latitude, a.longitude, b.latitude, b.longitude);
            if d < radius_km {
                penalty += radius_km - d;
            }
        }
    }
    weight * penalty
}

impl TerrainOptimizer {
    /// Place `num_sites` sites in `area` to maximise combined visible area.
    ///
    /// Greedy search is deterministic and ignores `rng`.
    pub fn optimize_spatial_coverage<R: Rng + ?Sized>(
        &self,
        area: &TileBounds,
        num_sites: usize,
        strategy: CoverageStrategy,
        rng: &mut R,
    ) -> Result<CoverageResult> {
        Self::validate_area(area)?;
        if num_sites == 0 {
            return Err(OptimizerError::InvalidConfig("num_sites must be at least 1".to_string()));
        }
        match strategy {
            CoverageStrategy::Annealing => self.anneal_coverage(area, num_sites, rng),
            CoverageStrategy::Greedy => self.greedy_coverage(area, num_sites),
        }
    }

    pub(crate) fn coverage_site(&self, lat: f64, lon: f64, strategy: CoverageStrategy) -> Result<CoverageSite> {
        let viewshed = self.evaluator().viewshed_at(lat, lon)?;
        metrics::counter!(metric_defs::OPTIMIZER_EVALUATIONS.name, "strategy" => strategy.as_str()).increment(1);
        Ok(CoverageSite {
            latitude: lat,
            longitude: lon,
            elevation_m: viewshed.observer.elevation,
            coverage_km2: viewshed.visible_area_km2,
            provenance: viewshed.provenance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn site(lat: f64, lon: f64) -> CoverageSite {
        CoverageSite {
            latitude: lat,
            longitude: lon,
            elevation_m: 0.0,
            coverage_km2: 100.0,
            provenance: Provenance::default(),
        }
    }

    #[test]
    fn test_overlap_penalty_counts_close_pairs() {
        // 0.45 degrees of latitude ~= 50.1 km
        let sites = vec![site(0.0, 0.0), site(0.45, 0.0), site(5.0, 5.0)];
        let penalty = overlap_penalty(&sites, 100.0, 2.0);
        let d = distance_km(0.0, 0.0, 0.45, 0.0);
        assert_relative_eq!(penalty, 2.0 * (100.0 - d), epsilon = 1e-9);
        assert_eq!(overlap_penalty(&sites[..1], 100.0, 1.0), 0.0);
    }

    #[test]
    fn test_result_totals() {
        let result = CoverageResult::from_sites(
            CoverageStrategy::Greedy,
            vec![site(0.0, 0.0), site(1.0, 1.0)],
            5.0,
            -195.0,
            SearchStats::default(),
            false,
        );
        assert_relative_eq!(result.total_coverage_km2, 200.0);
        assert_relative_eq!(result.best_cost, -195.0);
        assert_eq!(CoverageStrategy::Annealing.as_str(), "annealing");
    }
}
