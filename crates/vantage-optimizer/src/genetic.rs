//! NSGA-II style multi-objective site selection.

use crate::constraints::clamp_to;
use crate::optimizer::TerrainOptimizer;
use crate::pareto::{rank_candidates, SiteCandidate};
use crate::{OptimizerError, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use statrs::statistics::Statistics;
use std::cmp::Ordering;
use tracing::{debug, info};
use vantage_dem::geo::km_to_degrees;
use vantage_dem::{Provenance, TileBounds};

/// Progress of one generation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationStats {
    pub generation: usize,
    /// Highest aggregate score in the population.
    pub best_score: f64,
    pub average_score: f64,
    /// Standard deviation of aggregate scores.
    pub diversity: f64,
    pub population: usize,
}

/// Outcome of a genetic search.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneticResult {
    /// Final population, best first.
    pub ranked: Vec<SiteCandidate>,
    /// Rank-1 members of the final population.
    pub pareto_frontier: Vec<SiteCandidate>,
    pub convergence: Vec<GenerationStats>,
    /// True when the improvement-rate check stopped the search early.
    pub converged: bool,
    pub cancelled: bool,
    pub provenance: Provenance,
}

impl GeneticResult {
    pub fn best(&self) -> Option<&SiteCandidate> {
        self.ranked.first()
    }
}

impl TerrainOptimizer {
    /// Search `area` for sites balancing the five objectives.
    pub fn optimize_site_selection<R: Rng + ?Sized>(&self, area: &TileBounds, rng: &mut R) -> Result<GeneticResult> {
        Self::validate_area(area)?;
        let params = &self.config().genetic;
        let constraints = &self.config().constraints;
        let mutation = Normal::new(0.0, params.mutation_sigma_km)
            .map_err(|e| OptimizerError::InvalidConfig(format!("mutation_sigma_km: {e}")))?;

        let initial = constraints.place_random(area, params.population_size, rng);
        if initial.is_empty() {
            return Err(OptimizerError::NoFeasibleSite {
                considered: params.population_size * constraints.max_placement_attempts.max(1),
            });
        }
        let mut population: Vec<SiteCandidate> = self
            .evaluate_all(&initial, "genetic")?
            .into_iter()
            .map(SiteCandidate::new)
            .collect();
        rank_candidates(&mut population, params.crowding_bonus);

        let mut convergence = vec![generation_stats(0, &population)];
        let mut converged = false;
        let mut cancelled = false;

        while convergence.len() < params.max_generations {
            if self.is_cancelled() {
                cancelled = true;
                break;
            }
            if has_converged(&convergence, params.convergence_window, params.convergence_threshold) {
                converged = true;
                break;
            }

            let elites: Vec<SiteCandidate> = population.iter().take(params.elite_size).cloned().collect();
            let mut accepted: Vec<(f64, f64)> = elites.iter().map(SiteCandidate::location).collect();
            let wanted = params.population_size.saturating_sub(elites.len());
            let max_attempts = wanted * constraints.max_placement_attempts.max(1);
            let mut children = Vec::with_capacity(wanted);
            let mut attempts = 0;

            while children.len() < wanted && attempts < max_attempts {
                attempts += 1;
                let first = tournament(&population, params.tournament_size, rng).location();
                let second = tournament(&population, params.tournament_size, rng).location();
                let mut child = if rng.gen::<f64>() < params.crossover_rate {
                    crossover(first, second, rng)
                } else {
                    first
                };
                if rng.gen::<f64>() < params.mutation_rate {
                    child = mutate(child, &mutation, rng);
                }
                let (lat, lon) = clamp_to(area, child.0, child.1);
                if constraints.is_feasible(lat, lon, &accepted) {
                    accepted.push((lat, lon));
                    children.push((lat, lon));
                }
            }

            let mut next = elites;
            next.extend(self.evaluate_all(&children, "genetic")?.into_iter().map(SiteCandidate::new));
            if next.is_empty() {
                break;
            }
            rank_candidates(&mut next, params.crowding_bonus);
            population = next;

            let stats = generation_stats(convergence.len(), &population);
            debug!(
                generation = stats.generation,
                best = stats.best_score,
                average = stats.average_score,
                diversity = stats.diversity,
                "Completed generation"
            );
            convergence.push(stats);
        }

        let mut provenance = Provenance::default();
        for candidate in &population {
            provenance.merge(&candidate.evaluation.provenance);
        }
        let pareto_frontier: Vec<SiteCandidate> = population.iter().filter(|c| c.rank == 1).cloned().collect();
        info!(
            generations = convergence.len(),
            frontier = pareto_frontier.len(),
            converged,
            cancelled,
            "Genetic site selection finished"
        );

        Ok(GeneticResult {
            ranked: population,
            pareto_frontier,
            convergence,
            converged,
            cancelled,
            provenance,
        })
    }
}

fn generation_stats(generation: usize, population: &[SiteCandidate]) -> GenerationStats {
    let scores: Vec<f64> = population.iter().map(|c| c.evaluation.aggregate_score).collect();
    GenerationStats {
        generation,
        best_score: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        average_score: scores.iter().mean(),
        diversity: scores.iter().population_std_dev(),
        population: scores.len(),
    }
}

/// Mean relative improvement of the best score found so far over the last
/// `window` generation transitions, once that many exist.
///
/// Elites are kept by crowded score, so a generation's own best may dip below
/// an earlier one; the running best never does.
pub fn has_converged(history: &[GenerationStats], window: usize, threshold: f64) -> bool {
    if window == 0 || history.len() <= window {
        return false;
    }
    let running_best: Vec<f64> = history
        .iter()
        .scan(f64::NEG_INFINITY, |best, stats| {
            *best = best.max(stats.best_score);
            Some(*best)
        })
        .collect();
    let recent = &running_best[running_best.len() - window - 1..];
    let total: f64 = recent
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) / pair[0].abs().max(1e-9))
        .sum();
    total / (window as f64) < threshold
}

/// Best of `size` uniform draws: lower rank, then higher score.
fn tournament<'a, R: Rng + ?Sized>(population: &'a [SiteCandidate], size: usize, rng: &mut R) -> &'a SiteCandidate {
    let mut best = &population[rng.gen_range(0..population.len())];
    for _ in 1..size {
        let challenger = &population[rng.gen_range(0..population.len())];
        if challenger.compare(best) == Ordering::Less {
            best = challenger;
        }
    }
    best
}

/// Weighted midpoint of two parents.
fn crossover<R: Rng + ?Sized>(a: (f64, f64), b: (f64, f64), rng: &mut R) -> (f64, f64) {
    let w: f64 = rng.gen();
    (w * a.0 + (1.0 - w) * b.0, w * a.1 + (1.0 - w) * b.1)
}

fn mutate<R: Rng + ?Sized>(site: (f64, f64), noise: &Normal<f64>, rng: &mut R) -> (f64, f64) {
    let north_km = noise.sample(rng);
    let east_km = noise.sample(rng);
    let (dlat, dlon) = km_to_degrees(site.0, north_km, east_km);
    (site.0 + dlat, site.1 + dlon)
}
