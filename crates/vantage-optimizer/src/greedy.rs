//! Greedy viewshed maximisation over a candidate grid.

use crate::coverage::{overlap_penalty, CoverageResult, CoverageSite, CoverageStrategy, SearchStats};
use crate::optimizer::TerrainOptimizer;
use crate::{OptimizerError, Result};
use rayon::prelude::*;
use tracing::{debug, info};
use vantage_dem::geo::{distance_km, km_to_degrees};
use vantage_dem::TileBounds;

/// Cell centres of a regular grid over `area` with roughly `spacing_km` pitch.
///
/// At least one row and one column are produced, and the pitch is stretched
/// so the cells tile the box exactly.
pub fn candidate_grid(area: &TileBounds, spacing_km: f64) -> Vec<(f64, f64)> {
    let (center_lat, _) = area.center();
    let (dlat, dlon) = km_to_degrees(center_lat, spacing_km, spacing_km);
    let rows = (area.lat_span() / dlat).floor().max(1.0) as usize;
    let cols = (area.lon_span() / dlon).floor().max(1.0) as usize;
    let lat_step = area.lat_span() / rows as f64;
    let lon_step = area.lon_span() / cols as f64;

    let mut points = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            points.push((
                area.min_lat + (row as f64 + 0.5) * lat_step,
                area.min_lon + (col as f64 + 0.5) * lon_step,
            ));
        }
    }
    points
}

/// Coverage a candidate would add given the sites already chosen.
///
/// The visible area is scaled by `d / radius` for the nearest chosen site
/// inside `radius_km`.
pub fn marginal_gain(candidate: &CoverageSite, chosen: &[&CoverageSite], radius_km: f64) -> f64 {
    let factor = chosen
        .iter()
        .map(|site| distance_km(candidate.latitude, candidate.longitude, site.latitude, site.longitude))
        .filter(|d| *d < radius_km)
        .map(|d| d / radius_km)
        .fold(1.0, f64::min);
    candidate.coverage_km2 * factor
}

impl TerrainOptimizer {
    pub(crate) fn greedy_coverage(&self, area: &TileBounds, num_sites: usize) -> Result<CoverageResult> {
        let params = &self.config().greedy;
        let constraints = &self.config().constraints;
        let strategy = CoverageStrategy::Greedy;

        let grid = candidate_grid(area, params.grid_spacing_km);
        let allowed: Vec<(f64, f64)> = grid
            .iter()
            .copied()
            .filter(|&(lat, lon)| !constraints.is_excluded(lat, lon))
            .collect();
        if allowed.is_empty() {
            return Err(OptimizerError::NoFeasibleSite { considered: grid.len() });
        }
        debug!(candidates = allowed.len(), "Evaluating greedy candidate grid");

        let candidates: Vec<CoverageSite> = allowed
            .par_iter()
            .map(|&(lat, lon)| self.coverage_site(lat, lon, strategy))
            .collect::<Result<_>>()?;

        let mut chosen: Vec<usize> = Vec::with_capacity(num_sites);
        let mut stats = SearchStats::default();
        let mut cancelled = false;

        while chosen.len() < num_sites {
            if self.is_cancelled() {
                cancelled = true;
                break;
            }
            stats.iterations += 1;
            let picked: Vec<&CoverageSite> = chosen.iter().map(|&i| &candidates[i]).collect();
            let positions: Vec<(f64, f64)> = picked.iter().map(|s| s.location()).collect();

            let mut best: Option<(usize, f64)> = None;
            for (index, candidate) in candidates.iter().enumerate() {
                if chosen.contains(&index)
                    || !constraints.is_separated(candidate.latitude, candidate.longitude, &positions)
                {
                    continue;
                }
                let gain = marginal_gain(candidate, &picked, params.discount_radius_km);
                if gain > 0.0 && best.map_or(true, |(_, top)| gain > top) {
                    best = Some((index, gain));
                }
            }

            match best {
                Some((index, gain)) => {
                    debug!(index, gain, "Greedy pick");
                    chosen.push(index);
                    stats.accepted_moves += 1;
                }
                None => break,
            }
        }
        stats.rejected_moves = candidates.len() - chosen.len();

        let sites: Vec<CoverageSite> = chosen.iter().map(|&i| candidates[i].clone()).collect();
        let penalty = overlap_penalty(
            &sites,
            self.config().annealing.overlap_radius_km,
            self.config().annealing.overlap_penalty_weight,
        );
        let cost = penalty - sites.iter().map(|s| s.coverage_km2).sum::<f64>();
        info!(sites = sites.len(), requested = num_sites, "Greedy coverage finished");
        Ok(CoverageResult::from_sites(strategy, sites, penalty, cost, stats, cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use vantage_dem::Provenance;

    fn site(lat: f64, lon: f64, coverage_km2: f64) -> CoverageSite {
        CoverageSite {
            latitude: lat,
            longitude: lon,
            elevation_m: 0.0,
            coverage_km2,
            provenance: Provenance::default(),
        }
    }

    #[test]
    fn test_candidate_grid_tiles_the_box() {
        let area = TileBounds::new(0.0, 0.9, 0.0, 0.9).unwrap();
        let grid = candidate_grid(&area, 10.0);
        // 0.9 degrees ~= 100 km: ten 10 km cells per side
        assert_eq!(grid.len(), 100);
        assert!(grid.iter().all(|&(lat, lon)| area.contains(lat, lon)));
        assert_relative_eq!(grid[0].0, 0.045, epsilon = 1e-9);

        let tiny = TileBounds::new(0.0, 0.01, 0.0, 0.01).unwrap();
        assert_eq!(candidate_grid(&tiny, 10.0), vec![(0.005, 0.005)]);
    }

    #[test]
    fn test_marginal_gain_discounts_neighbours() {
        let chosen = site(0.0, 0.0, 300.0);
        let near = site(0.045, 0.0, 200.0);
        let far = site(1.0, 0.0, 200.0);

        assert_relative_eq!(marginal_gain(&far, &[&chosen], 10.0), 200.0);
        let d = distance_km(0.0, 0.0, 0.045, 0.0);
        assert_relative_eq!(marginal_gain(&near, &[&chosen], 10.0), 200.0 * d / 10.0, epsilon = 1e-9);
        assert_relative_eq!(marginal_gain(&near, &[], 10.0), 200.0);
    }
}
