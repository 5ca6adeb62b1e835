//! Simulated annealing over a fixed number of sites.

use crate::constraints::clamp_to;
use crate::coverage::{overlap_penalty, CoverageResult, CoverageSite, CoverageStrategy, SearchStats};
use crate::optimizer::TerrainOptimizer;
use crate::{OptimizerError, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use tracing::{debug, info};
use vantage_dem::geo::km_to_degrees;
use vantage_dem::TileBounds;

/// Metropolis acceptance for a cost change at `temperature`.
///
/// Improvements never draw from `rng`.
pub fn accept_move<R: Rng + ?Sized>(delta_cost: f64, temperature: f64, rng: &mut R) -> bool {
    if delta_cost <= 0.0 {
        return true;
    }
    if temperature <= 0.0 {
        return false;
    }
    rng.gen::<f64>() < (-delta_cost / temperature).exp()
}

/// Iterations taken to cool from `initial` to `floor` at `rate`.
pub fn cooling_steps(initial: f64, floor: f64, rate: f64) -> usize {
    if initial <= floor || !(0.0..1.0).contains(&rate) || rate == 0.0 {
        return 0;
    }
    ((floor / initial).ln() / rate.ln()).ceil() as usize
}

impl TerrainOptimizer {
    pub(crate) fn anneal_coverage<R: Rng + ?Sized>(
        &self,
        area: &TileBounds,
        num_sites: usize,
        rng: &mut R,
    ) -> Result<CoverageResult> {
        let params = &self.config().annealing;
        let constraints = &self.config().constraints;
        let noise = Normal::new(0.0, params.perturbation_sigma_km)
            .map_err(|e| OptimizerError::InvalidConfig(format!("perturbation_sigma_km: {e}")))?;
        let strategy = CoverageStrategy::Annealing;

        let start = constraints.place_random(area, num_sites, rng);
        if start.is_empty() {
            return Err(OptimizerError::NoFeasibleSite {
                considered: num_sites * constraints.max_placement_attempts.max(1),
            });
        }
        debug!(
            sites = start.len(),
            planned_iterations = cooling_steps(params.initial_temperature, params.min_temperature, params.cooling_rate),
            "Starting annealing"
        );
        let mut sites: Vec<CoverageSite> = start
            .par_iter()
            .map(|&(lat, lon)| self.coverage_site(lat, lon, strategy))
            .collect::<Result<_>>()?;

        let cost_of = |sites: &[CoverageSite]| {
            let coverage: f64 = sites.iter().map(|s| s.coverage_km2).sum();
            overlap_penalty(sites, params.overlap_radius_km, params.overlap_penalty_weight) - coverage
        };
        let mut cost = cost_of(&sites);
        let mut best = sites.clone();
        let mut best_cost = cost;
        let mut temperature = params.initial_temperature;
        let mut stats = SearchStats::default();
        let mut cancelled = false;

        while temperature > params.min_temperature {
            if params.max_iterations.is_some_and(|cap| stats.iterations >= cap) {
                break;
            }
            if self.is_cancelled() {
                cancelled = true;
                break;
            }
            stats.iterations += 1;

            let index = rng.gen_range(0..sites.len());
            let (lat, lon) = {
                let current = &sites[index];
                let (dlat, dlon) = km_to_degrees(current.latitude, noise.sample(rng), noise.sample(rng));
                clamp_to(area, current.latitude + dlat, current.longitude + dlon)
            };
            let others: Vec<(f64, f64)> = sites
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, s)| s.location())
                .collect();
            if !constraints.is_feasible(lat, lon, &others) {
                stats.rejected_moves += 1;
                temperature *= params.cooling_rate;
                continue;
            }

            let moved = self.coverage_site(lat, lon, strategy)?;
            let previous = std::mem::replace(&mut sites[index], moved);
            let new_cost = cost_of(&sites);
            if accept_move(new_cost - cost, temperature, rng) {
                cost = new_cost;
                stats.accepted_moves += 1;
                if cost < best_cost {
                    best_cost = cost;
                    best = sites.clone();
                }
            } else {
                sites[index] = previous;
                stats.rejected_moves += 1;
            }
            temperature *= params.cooling_rate;

            if stats.iterations % 100 == 0 {
                debug!(iteration = stats.iterations, temperature, cost, best_cost, "Annealing progress");
            }
        }
        stats.final_temperature = temperature;

        let penalty = overlap_penalty(&best, params.overlap_radius_km, params.overlap_penalty_weight);
        info!(
            iterations = stats.iterations,
            accepted = stats.accepted_moves,
            best_cost,
            "Annealing coverage finished"
        );
        Ok(CoverageResult::from_sites(strategy, best, penalty, cost, stats, cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_improvements_always_accepted() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(accept_move(-5.0, 0.0, &mut rng));
        assert!(accept_move(0.0, 10.0, &mut rng));
        assert!(!accept_move(1.0, 0.0, &mut rng));
    }

    #[test]
    fn test_worse_moves_accepted_more_when_hot() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let hot = (0..1000).filter(|_| accept_move(10.0, 1000.0, &mut rng)).count();
        let cold = (0..1000).filter(|_| accept_move(10.0, 1.0, &mut rng)).count();
        // exp(-0.01) ~= 0.99 versus exp(-10) ~= 0.00005
        assert!(hot > 950);
        assert!(cold < 5);
    }

    #[test]
    fn test_default_schedule_length() {
        // ln(1/1000) / ln(0.995) ~= 1378.1
        assert_eq!(cooling_steps(1000.0, 1.0, 0.995), 1379);
        assert_eq!(cooling_steps(1.0, 1.0, 0.995), 0);
    }
}
