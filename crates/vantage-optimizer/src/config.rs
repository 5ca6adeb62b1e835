//! Optimizer configuration.
//!
//! Every struct carries documented defaults and, with the `serde` feature,
//! deserializes field by field so a YAML file only has to name overrides.

use crate::constraints::SiteConstraints;
use crate::{OptimizerError, Result};

/// Relative weight of each objective in the aggregate score.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ObjectiveWeights {
    pub elevation: f64,
    pub visibility: f64,
    pub accessibility: f64,
    pub cost: f64,
    pub risk: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            elevation: 0.2,
            visibility: 0.3,
            accessibility: 0.2,
            cost: 0.15,
            risk: 0.15,
        }
    }
}

impl ObjectiveWeights {
    /// Weights in objective order: elevation, visibility, accessibility, cost, risk.
    pub fn as_array(&self) -> [f64; 5] {
        [self.elevation, self.visibility, self.accessibility, self.cost, self.risk]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }
}

/// NSGA-II search parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GeneticParams {
    pub population_size: usize,
    pub max_generations: usize,
    /// Best candidates copied unchanged into the next generation.
    pub elite_size: usize,
    pub tournament_size: usize,
    /// Probability a child blends two parents rather than cloning one.
    pub crossover_rate: f64,
    /// Probability a child is displaced by Gaussian noise.
    pub mutation_rate: f64,
    /// Standard deviation of the mutation displacement, kilometers.
    pub mutation_sigma_km: f64,
    /// Scale of the crowding-distance tiebreak added to the score.
    pub crowding_bonus: f64,
    /// Generations averaged by the convergence check.
    pub convergence_window: usize,
    /// Stop once the average relative improvement drops below this.
    pub convergence_threshold: f64,
}

impl Default for GeneticParams {
    fn default() -> Self {
        Self {
            population_size: 40,
            max_generations: 30,
            elite_size: 4,
            tournament_size: 3,
            crossover_rate: 0.8,
            mutation_rate: 0.2,
            mutation_sigma_km: 5.0,
            crowding_bonus: 0.5,
            convergence_window: 5,
            convergence_threshold: 0.001,
        }
    }
}

/// Simulated annealing parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnnealingParams {
    pub initial_temperature: f64,
    /// Temperature floor; the search stops below it.
    pub min_temperature: f64,
    /// Geometric cooling factor applied every iteration.
    pub cooling_rate: f64,
    /// Optional hard cap on iterations.
    pub max_iterations: Option<usize>,
    /// Standard deviation of a site perturbation, kilometers.
    pub perturbation_sigma_km: f64,
    /// Pairs closer than this are penalised, kilometers.
    pub overlap_radius_km: f64,
    /// Penalty per kilometer of overlap.
    pub overlap_penalty_weight: f64,
}

impl Default for AnnealingParams {
    fn default() -> Self {
        Self {
            initial_temperature: 1000.0,
            min_temperature: 1.0,
            cooling_rate: 0.995,
            max_iterations: None,
            perturbation_sigma_km: 10.0,
            overlap_radius_km: 100.0,
            overlap_penalty_weight: 1.0,
        }
    }
}

/// Greedy coverage parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GreedyParams {
    /// Spacing of the candidate grid, kilometers.
    pub grid_spacing_km: f64,
    /// Gains of candidates this close to a chosen site are discounted, kilometers.
    pub discount_radius_km: f64,
}

impl Default for GreedyParams {
    fn default() -> Self {
        Self {
            grid_spacing_km: 10.0,
            discount_radius_km: 10.0,
        }
    }
}

/// Complete optimizer configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OptimizerConfig {
    pub weights: ObjectiveWeights,
    pub genetic: GeneticParams,
    pub annealing: AnnealingParams,
    pub greedy: GreedyParams,
    pub constraints: SiteConstraints,
    /// Side of the square window used for terrain metrics, kilometers.
    pub metrics_window_km: f64,
    pub metrics_resolution_arcsec: f64,
    pub viewshed_range_km: f64,
    pub observer_height_m: f64,
    pub azimuth_step_deg: f64,
    /// Aggregate scores are scaled by `1 - discount * synthetic_fraction`.
    pub provenance_discount: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            weights: ObjectiveWeights::default(),
            genetic: GeneticParams::default(),
            annealing: AnnealingParams::default(),
            greedy: GreedyParams::default(),
            constraints: SiteConstraints::default(),
            metrics_window_km: 5.0,
            metrics_resolution_arcsec: 30.0,
            viewshed_range_km: 20.0,
            observer_height_m: 10.0,
            azimuth_step_deg: 5.0,
            provenance_discount: 0.0,
        }
    }
}

impl OptimizerConfig {
    /// Reject values the searches cannot work with.
    pub fn validate(&self) -> Result<()> {
        let weights = self.weights.as_array();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || self.weights.sum() <= 0.0 {
            return Err(invalid("objective weights must be non-negative with a positive sum"));
        }
        let positive = [
            ("metrics_window_km", self.metrics_window_km),
            ("metrics_resolution_arcsec", self.metrics_resolution_arcsec),
            ("viewshed_range_km", self.viewshed_range_km),
            ("azimuth_step_deg", self.azimuth_step_deg),
            ("genetic.mutation_sigma_km", self.genetic.mutation_sigma_km),
            ("annealing.initial_temperature", self.annealing.initial_temperature),
            ("annealing.min_temperature", self.annealing.min_temperature),
            ("annealing.perturbation_sigma_km", self.annealing.perturbation_sigma_km),
            ("greedy.grid_spacing_km", self.greedy.grid_spacing_km),
            ("greedy.discount_radius_km", self.greedy.discount_radius_km),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(&format!("{name} must be positive, got {value}")));
            }
        }
        for (name, value) in [
            ("genetic.crossover_rate", self.genetic.crossover_rate),
            ("genetic.mutation_rate", self.genetic.mutation_rate),
            ("provenance_discount", self.provenance_discount),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(&format!("{name} must lie in [0, 1], got {value}")));
            }
        }
        if self.genetic.population_size == 0 || self.genetic.tournament_size == 0 {
            return Err(invalid("population_size and tournament_size must be at least 1"));
        }
        if self.genetic.elite_size > self.genetic.population_size {
            return Err(invalid("elite_size cannot exceed population_size"));
        }
        if !(self.annealing.cooling_rate > 0.0 && self.annealing.cooling_rate < 1.0) {
            return Err(invalid("annealing.cooling_rate must lie in (0, 1)"));
        }
        if self.observer_height_m < 0.0 || self.constraints.min_separation_km < 0.0 {
            return Err(invalid("observer_height_m and min_separation_km must be non-negative"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> OptimizerError {
    OptimizerError::InvalidConfig(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = OptimizerConfig::default();
        config.validate().unwrap();
        assert_relative_eq!(config.weights.sum(), 1.0, epsilon = 1e-12);
        assert_eq!(config.genetic.tournament_size, 3);
        assert_eq!(config.annealing.cooling_rate, 0.995);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = OptimizerConfig::default();
        config.weights = ObjectiveWeights {
            elevation: 0.0,
            visibility: 0.0,
            accessibility: 0.0,
            cost: 0.0,
            risk: 0.0,
        };
        assert!(matches!(config.validate(), Err(OptimizerError::InvalidConfig(_))));

        let mut config = OptimizerConfig::default();
        config.genetic.elite_size = 100;
        assert!(config.validate().is_err());

        let mut config = OptimizerConfig::default();
        config.annealing.cooling_rate = 1.0;
        assert!(config.validate().is_err());

        let mut config = OptimizerConfig::default();
        config.genetic.mutation_rate = 1.5;
        assert!(config.validate().is_err());
    }
}
