//! Search strategies end to end over analytic terrain.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use vantage_dem::geo::distance_km;
use vantage_dem::{FunctionSource, PipelineConfig, TerrainPipeline, TileBounds};
use vantage_optimizer::{
    cells_for_region, non_dominated_sort, CoverageStrategy, ExclusionZone, ObjectiveScores, OptimizerConfig,
    OptimizerError, Resolution, TerrainOptimizer,
};
use vantage_viewshed::ViewshedCalculator;

fn hills(lat: f64, lon: f64) -> f32 {
    (500.0 + 250.0 * (lat * 30.0).sin() * (lon * 30.0).cos()) as f32
}

fn fast_config() -> OptimizerConfig {
    let mut config = OptimizerConfig::default();
    config.genetic.population_size = 8;
    config.genetic.max_generations = 4;
    config.genetic.elite_size = 2;
    config.annealing.max_iterations = Some(25);
    config.greedy.grid_spacing_km = 5.0;
    config.viewshed_range_km = 3.0;
    config.azimuth_step_deg = 30.0;
    config.metrics_window_km = 1.0;
    config
}

fn optimizer(config: OptimizerConfig) -> TerrainOptimizer {
    let pipeline = TerrainPipeline::new(PipelineConfig::default()).with_source(FunctionSource::new("hills", 30.0, hills));
    TerrainOptimizer::new(ViewshedCalculator::new(Arc::new(pipeline)), config).unwrap()
}

fn area() -> TileBounds {
    TileBounds::new(45.1, 45.3, 7.1, 7.3).unwrap()
}

#[test]
fn test_genetic_same_seed_same_frontier() {
    let optimizer = optimizer(fast_config());
    let run = |seed| {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        optimizer.optimize_site_selection(&area(), &mut rng).unwrap()
    };
    let first = run(99);
    let second = run(99);

    assert!(!first.pareto_frontier.is_empty());
    assert_eq!(first.pareto_frontier, second.pareto_frontier);
    assert_eq!(first.convergence, second.convergence);
}

#[test]
fn test_genetic_population_and_trace() {
    let config = fast_config();
    let result = optimizer(config.clone())
        .optimize_site_selection(&area(), &mut ChaCha8Rng::seed_from_u64(5))
        .unwrap();

    assert!(result.convergence.len() <= config.genetic.max_generations);
    assert!(result.ranked.len() <= config.genetic.population_size);
    assert!(result.pareto_frontier.iter().all(|c| c.rank == 1));
    assert_eq!(result.ranked[0].rank, 1);
    for pair in result.ranked.windows(2) {
        assert!(pair[0].rank <= pair[1].rank);
    }
    for (generation, stats) in result.convergence.iter().enumerate() {
        assert_eq!(stats.generation, generation);
        assert!(stats.best_score + 1e-9 >= stats.average_score);
        assert!(stats.diversity >= 0.0);
    }
    for candidate in &result.ranked {
        let (lat, lon) = candidate.location();
        assert!(area().contains(lat, lon));
        assert!((0.0..=100.0).contains(&candidate.evaluation.aggregate_score));
    }
    assert!(!result.provenance.is_degraded());
    assert!(!result.cancelled);
}

#[test]
fn test_genetic_respects_exclusion_zone() {
    let mut config = fast_config();
    let zone = ExclusionZone::new(45.2, 7.2, 6.0);
    config.constraints.exclusion_zones.push(zone.clone());
    let result = optimizer(config)
        .optimize_site_selection(&area(), &mut ChaCha8Rng::seed_from_u64(17))
        .unwrap();

    for candidate in &result.ranked {
        let (lat, lon) = candidate.location();
        assert!(!zone.contains(lat, lon));
    }
}

#[test]
fn test_no_feasible_site_is_explicit() {
    let mut config = fast_config();
    config.constraints.exclusion_zones.push(ExclusionZone::new(45.2, 7.2, 200.0));
    config.constraints.max_placement_attempts = 3;
    let optimizer = optimizer(config);
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    assert!(matches!(
        optimizer.optimize_site_selection(&area(), &mut rng),
        Err(OptimizerError::NoFeasibleSite { .. })
    ));
    for strategy in [CoverageStrategy::Annealing, CoverageStrategy::Greedy] {
        assert!(matches!(
            optimizer.optimize_spatial_coverage(&area(), 3, strategy, &mut rng),
            Err(OptimizerError::NoFeasibleSite { .. })
        ));
    }
    let cells = cells_for_region(&area(), Resolution::Six).unwrap();
    assert!(matches!(
        optimizer.optimize_h3_grid(&cells),
        Err(OptimizerError::NoFeasibleSite { .. })
    ));
}

#[test]
fn test_cancelled_search_returns_initial_population() {
    let flag = Arc::new(AtomicBool::new(true));
    let optimizer = optimizer(fast_config()).with_cancel_flag(flag);
    let result = optimizer
        .optimize_site_selection(&area(), &mut ChaCha8Rng::seed_from_u64(2))
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.convergence.len(), 1);
    assert_eq!(result.ranked.len(), 8);
}

#[test]
fn test_annealing_counts_and_separation() {
    let mut config = fast_config();
    config.constraints.min_separation_km = 3.0;
    let result = optimizer(config)
        .optimize_spatial_coverage(&area(), 3, CoverageStrategy::Annealing, &mut ChaCha8Rng::seed_from_u64(8))
        .unwrap();

    assert_eq!(result.strategy, CoverageStrategy::Annealing);
    assert_eq!(result.sites.len(), 3);
    assert_eq!(result.stats.iterations, 25);
    assert_eq!(result.stats.accepted_moves + result.stats.rejected_moves, 25);
    assert!(result.best_cost <= result.final_cost + 1e-9);
    assert_relative_eq!(
        result.total_coverage_km2,
        result.sites.iter().map(|s| s.coverage_km2).sum::<f64>(),
        epsilon = 1e-9
    );
    for (i, a) in result.sites.iter().enumerate() {
        assert!(area().contains(a.latitude, a.longitude));
        for b in &result.sites[i + 1..] {
            assert!(distance_km(a.latitude, a.longitude, b.latitude, b.longitude) >= 3.0);
        }
    }
}

#[test]
fn test_annealing_is_seeded() {
    let optimizer = optimizer(fast_config());
    let run = |seed| {
        optimizer
            .optimize_spatial_coverage(&area(), 2, CoverageStrategy::Annealing, &mut ChaCha8Rng::seed_from_u64(seed))
            .unwrap()
    };
    assert_eq!(run(4), run(4));
}

#[test]
fn test_greedy_picks_best_coverage_first() {
    let mut config = fast_config();
    config.constraints.min_separation_km = 5.0;
    let result = optimizer(config)
        .optimize_spatial_coverage(&area(), 3, CoverageStrategy::Greedy, &mut ChaCha8Rng::seed_from_u64(0))
        .unwrap();

    assert_eq!(result.strategy, CoverageStrategy::Greedy);
    assert_eq!(result.sites.len(), 3);
    let first = result.sites[0].coverage_km2;
    assert!(result.sites.iter().all(|s| s.coverage_km2 <= first));
    for (i, a) in result.sites.iter().enumerate() {
        for b in &result.sites[i + 1..] {
            assert!(distance_km(a.latitude, a.longitude, b.latitude, b.longitude) >= 5.0);
        }
    }
}

#[test]
fn test_hex_grid_sorted_descending() {
    let optimizer = optimizer(fast_config());
    let cells = cells_for_region(&area(), Resolution::Six).unwrap();
    let scored = optimizer.optimize_h3_grid(&cells).unwrap();

    assert_eq!(scored.len(), cells.len());
    for pair in scored.windows(2) {
        assert!(pair[0].evaluation.aggregate_score >= pair[1].evaluation.aggregate_score);
    }
    assert!(scored.iter().all(|s| s.resolution == 6));
}

#[test]
fn test_synthetic_terrain_discounted() {
    // No sources: every sample comes from the synthetic fallback
    let build = |discount| {
        let mut config = fast_config();
        config.provenance_discount = discount;
        let pipeline = TerrainPipeline::new(PipelineConfig::default());
        TerrainOptimizer::new(ViewshedCalculator::new(Arc::new(pipeline)), config).unwrap()
    };
    let plain = build(0.0).evaluate_site(45.2, 7.2).unwrap();
    let discounted = build(0.5).evaluate_site(45.2, 7.2).unwrap();

    assert!(plain.provenance.is_degraded());
    assert_relative_eq!(plain.provenance.synthetic_fraction(), 1.0);
    assert_relative_eq!(discounted.aggregate_score, plain.aggregate_score * 0.5, epsilon = 1e-9);
}

#[test]
fn test_invalid_area_and_counts() {
    let optimizer = optimizer(fast_config());
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let point = TileBounds::new(45.2, 45.2, 7.2, 7.2).unwrap();
    assert!(matches!(
        optimizer.optimize_site_selection(&point, &mut rng),
        Err(OptimizerError::InvalidConfig(_))
    ));
    assert!(matches!(
        optimizer.optimize_spatial_coverage(&area(), 0, CoverageStrategy::Greedy, &mut rng),
        Err(OptimizerError::InvalidConfig(_))
    ));
}

#[test]
fn test_strict_dominance_implies_lower_rank() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let population: Vec<ObjectiveScores> = (0..60)
        .map(|_| ObjectiveScores {
            elevation: rng.gen(),
            visibility: rng.gen(),
            accessibility: rng.gen(),
            cost: rng.gen(),
            risk: rng.gen(),
        })
        .collect();
    let (ranks, _) = non_dominated_sort(&population);

    for (a, scores_a) in population.iter().enumerate() {
        for (b, scores_b) in population.iter().enumerate() {
            let exceeds_all = scores_a.as_array().iter().zip(scores_b.as_array()).all(|(x, y)| *x > y);
            if exceeds_all {
                assert!(ranks[a] < ranks[b], "{a} beats {b} everywhere but ranks {} vs {}", ranks[a], ranks[b]);
            }
        }
    }
}
