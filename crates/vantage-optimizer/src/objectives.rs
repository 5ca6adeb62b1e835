//! The five siting objectives and single-site evaluation.

use crate::config::{ObjectiveWeights, OptimizerConfig};
use crate::Result;
use tracing::trace;
use vantage_dem::{Provenance, TerrainMetrics, TerrainPipeline, TileBounds};
use vantage_metrics::metric_defs;
use vantage_viewshed::{ViewshedAnalysis, ViewshedCalculator, ViewshedRequest};

/// Visible area at which the visibility objective saturates, km².
pub const VISIBILITY_SATURATION_KM2: f64 = 5000.0;

/// Per-objective scores, all oriented higher-is-better in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectiveScores {
    pub elevation: f64,
    pub visibility: f64,
    pub accessibility: f64,
    pub cost: f64,
    pub risk: f64,
}

impl ObjectiveScores {
    pub const COUNT: usize = 5;

    /// Scores in objective order.
    pub fn as_array(&self) -> [f64; 5] {
        [self.elevation, self.visibility, self.accessibility, self.cost, self.risk]
    }

    /// Pareto dominance: at least as good everywhere, strictly better somewhere.
    pub fn dominates(&self, other: &ObjectiveScores) -> bool {
        let mine = self.as_array();
        let theirs = other.as_array();
        let no_worse = mine.iter().zip(&theirs).all(|(a, b)| a >= b);
        let better = mine.iter().zip(&theirs).any(|(a, b)| a > b);
        no_worse && better
    }

    /// Weighted sum scaled to 0..100 and normalised by the weight total.
    pub fn aggregate(&self, weights: &ObjectiveWeights) -> f64 {
        let total = weights.sum();
        if total <= 0.0 {
            return 0.0;
        }
        let weighted: f64 = self
            .as_array()
            .iter()
            .zip(weights.as_array())
            .map(|(score, weight)| score * weight)
            .sum();
        weighted * 100.0 / total
    }
}

/// Elevation suitability: low sites are mediocre, very high sites unbuildable.
pub fn elevation_score(elevation_m: f64) -> f64 {
    let score = if elevation_m < 100.0 {
        0.5
    } else if elevation_m > 3000.0 {
        1.0 - (elevation_m - 3000.0) / 2000.0
    } else {
        1.0
    };
    score.clamp(0.0, 1.0)
}

pub fn visibility_score(visible_area_km2: f64) -> f64 {
    (visible_area_km2 / VISIBILITY_SATURATION_KM2).clamp(0.0, 1.0)
}

pub fn accessibility_score(average_slope_deg: f64) -> f64 {
    (1.0 - average_slope_deg / 30.0).clamp(0.0, 1.0)
}

pub fn cost_score(ruggedness_m: f64, elevation_m: f64) -> f64 {
    let penalty = 0.5 * ruggedness_m / 500.0 + 0.5 * (elevation_m / 4000.0).min(1.0);
    (1.0 - penalty).clamp(0.0, 1.0)
}

pub fn risk_score(average_slope_deg: f64, elevation_m: f64, high_severity_obstructions: usize) -> f64 {
    let altitude = if elevation_m > 4000.0 { 0.3 } else { 0.0 };
    let penalty =
        0.3 * (average_slope_deg / 45.0).min(1.0) + altitude + 0.1 * high_severity_obstructions as f64;
    (1.0 - penalty).clamp(0.0, 1.0)
}

/// Everything learned about one site.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SiteEvaluation {
    pub latitude: f64,
    pub longitude: f64,
    /// Ground elevation at the site, meters.
    pub elevation_m: f64,
    pub objectives: ObjectiveScores,
    /// Weighted 0..100 score after any provenance discount.
    pub aggregate_score: f64,
    pub visible_area_km2: f64,
    pub coverage_percentage: f64,
    pub average_slope_deg: f64,
    pub ruggedness_index: f64,
    pub high_severity_obstructions: usize,
    pub provenance: Provenance,
}

/// Scores sites against the configured objectives.
#[derive(Debug, Clone)]
pub struct SiteEvaluator {
    calculator: ViewshedCalculator,
    config: OptimizerConfig,
}

impl SiteEvaluator {
    pub fn new(calculator: ViewshedCalculator, config: OptimizerConfig) -> Self {
        Self { calculator, config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn calculator(&self) -> &ViewshedCalculator {
        &self.calculator
    }

    pub fn pipeline(&self) -> &TerrainPipeline {
        self.calculator.pipeline()
    }

    /// Ground elevation, terrain metrics, and viewshed for a site, folded
    /// into objective scores.
    pub fn evaluate(&self, lat: f64, lon: f64, strategy: &'static str) -> Result<SiteEvaluation> {
        let ground = self.pipeline().get_elevation(lat, lon)?;
        let metrics = self.metrics_at(lat, lon)?;
        let viewshed = self.viewshed_at(lat, lon)?;
        metrics::counter!(metric_defs::OPTIMIZER_EVALUATIONS.name, "strategy" => strategy).increment(1);

        let mut provenance = Provenance::from_point(&ground);
        provenance.merge(&metrics.provenance);
        provenance.merge(&viewshed.provenance);

        let objectives = ObjectiveScores {
            elevation: elevation_score(ground.elevation),
            visibility: visibility_score(viewshed.visible_area_km2),
            accessibility: accessibility_score(metrics.average_slope),
            cost: cost_score(metrics.ruggedness_index, ground.elevation),
            risk: risk_score(metrics.average_slope, ground.elevation, viewshed.high_severity_obstructions),
        };
        let discount = 1.0 - self.config.provenance_discount * provenance.synthetic_fraction();
        let aggregate_score = objectives.aggregate(&self.config.weights) * discount;
        trace!(lat, lon, aggregate_score, "Evaluated site");

        Ok(SiteEvaluation {
            latitude: lat,
            longitude: lon,
            elevation_m: ground.elevation,
            objectives,
            aggregate_score,
            visible_area_km2: viewshed.visible_area_km2,
            coverage_percentage: viewshed.coverage_percentage,
            average_slope_deg: metrics.average_slope,
            ruggedness_index: metrics.ruggedness_index,
            high_severity_obstructions: viewshed.high_severity_obstructions,
            provenance,
        })
    }

    /// Viewshed with the configured range, mast height, and azimuth step.
    pub fn viewshed_at(&self, lat: f64, lon: f64) -> Result<ViewshedAnalysis> {
        let request = ViewshedRequest::new(lat, lon, self.config.viewshed_range_km)
            .with_observer_height(self.config.observer_height_m)
            .with_azimuth_step(self.config.azimuth_step_deg);
        Ok(self.calculator.calculate_viewshed(&request)?)
    }

    fn metrics_at(&self, lat: f64, lon: f64) -> Result<TerrainMetrics> {
        let window = TileBounds::around(lat, lon, self.config.metrics_window_km / 2.0);
        Ok(self
            .pipeline()
            .calculate_terrain_metrics(&window, self.config.metrics_resolution_arcsec)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scores(values: [f64; 5]) -> ObjectiveScores {
        ObjectiveScores {
            elevation: values[0],
            visibility: values[1],
            accessibility: values[2],
            cost: values[3],
            risk: values[4],
        }
    }

    #[test]
    fn test_elevation_score_bands() {
        assert_eq!(elevation_score(50.0), 0.5);
        assert_eq!(elevation_score(100.0), 1.0);
        assert_eq!(elevation_score(3000.0), 1.0);
        assert_relative_eq!(elevation_score(4000.0), 0.5);
        assert_eq!(elevation_score(5000.0), 0.0);
        assert_eq!(elevation_score(6000.0), 0.0);
    }

    #[test]
    fn test_component_formulas() {
        assert_relative_eq!(visibility_score(2500.0), 0.5);
        assert_eq!(visibility_score(9000.0), 1.0);
        assert_relative_eq!(accessibility_score(15.0), 0.5);
        assert_eq!(accessibility_score(45.0), 0.0);
        // 1 - (0.5 * 100/500 + 0.5 * 2000/4000) = 0.65
        assert_relative_eq!(cost_score(100.0, 2000.0), 0.65, epsilon = 1e-12);
        assert_eq!(cost_score(2000.0, 5000.0), 0.0);
        // 1 - (0.3 * 0.5 + 0.3 + 0.2) = 0.35
        assert_relative_eq!(risk_score(22.5, 4500.0, 2), 0.35, epsilon = 1e-12);
        assert_eq!(risk_score(90.0, 5000.0, 10), 0.0);
    }

    #[test]
    fn test_dominance() {
        let a = scores([0.9, 0.8, 0.7, 0.6, 0.5]);
        let b = scores([0.8, 0.8, 0.6, 0.6, 0.4]);
        assert!(a.dominates(&b));
        assert!(!b.dominates(&a));
        assert!(!a.dominates(&a));

        let c = scores([1.0, 0.0, 0.7, 0.6, 0.5]);
        assert!(!a.dominates(&c));
        assert!(!c.dominates(&a));
    }

    #[test]
    fn test_aggregate_normalises_by_weight_sum() {
        let all_ones = scores([1.0; 5]);
        let weights = ObjectiveWeights {
            elevation: 2.0,
            visibility: 2.0,
            accessibility: 2.0,
            cost: 2.0,
            risk: 2.0,
        };
        assert_relative_eq!(all_ones.aggregate(&weights), 100.0, epsilon = 1e-9);

        let only_visibility = ObjectiveWeights {
            elevation: 0.0,
            visibility: 1.0,
            accessibility: 0.0,
            cost: 0.0,
            risk: 0.0,
        };
        assert_relative_eq!(scores([0.1, 0.4, 0.9, 0.9, 0.9]).aggregate(&only_visibility), 40.0, epsilon = 1e-9);
    }
}
