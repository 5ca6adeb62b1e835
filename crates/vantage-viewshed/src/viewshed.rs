//! Azimuth sweeps: viewshed and horizon mask.

use crate::obstruction::{merge_sectors, TerrainObstruction};
use crate::params::ViewshedParams;
use crate::{Result, ViewshedError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};
use vantage_dem::geo::destination_point;
use vantage_dem::{Provenance, TerrainPipeline, TerrainPoint, TileBounds};
use vantage_metrics::metric_defs;

/// Inputs of a viewshed sweep.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewshedRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Sweep radius in kilometers.
    pub max_range_km: f64,
    /// Observer height above ground in meters.
    pub observer_height_m: f64,
    /// Target height above ground in meters.
    pub target_height_m: f64,
    /// Angular step between rays in degrees.
    pub azimuth_step_deg: f64,
}

impl ViewshedRequest {
    /// Request with 10 m observer, ground-level target, and 1° steps.
    pub fn new(latitude: f64, longitude: f64, max_range_km: f64) -> Self {
        Self {
            latitude,
            longitude,
            max_range_km,
            observer_height_m: 10.0,
            target_height_m: 0.0,
            azimuth_step_deg: 1.0,
        }
    }

    /// Set the observer height.
    pub fn with_observer_height(mut self, meters: f64) -> Self {
        self.observer_height_m = meters;
        self
    }

    /// Set the target height.
    pub fn with_target_height(mut self, meters: f64) -> Self {
        self.target_height_m = meters;
        self
    }

    /// Set the azimuth step.
    pub fn with_azimuth_step(mut self, degrees: f64) -> Self {
        self.azimuth_step_deg = degrees;
        self
    }
}

/// Horizon along one azimuth.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HorizonPoint {
    /// Degrees clockwise from north.
    pub azimuth_deg: f64,
    /// Elevation angle of the horizon seen from eye height, degrees.
    pub elevation_angle_deg: f64,
    /// Distance to the horizon sample in kilometers.
    pub distance_km: f64,
    /// Curvature-corrected horizon height relative to eye height, meters
    /// (negative when it lies below the observer).
    pub obstruction_height_m: f64,
}

/// Result of a viewshed sweep.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewshedAnalysis {
    /// Ground point under the observer.
    pub observer: TerrainPoint,
    pub observer_height_m: f64,
    pub target_height_m: f64,
    pub max_range_km: f64,
    pub azimuth_step_deg: f64,
    /// Sum of visible sector areas in km².
    pub visible_area_km2: f64,
    /// Visible area as a share of the full disc, 0 to 100.
    pub coverage_percentage: f64,
    /// Unobstructed radius per azimuth in kilometers.
    pub visible_radius_km: Vec<f64>,
    /// One entry per azimuth, in sweep order.
    pub horizon: Vec<HorizonPoint>,
    /// Obstructions merged across adjacent azimuths.
    pub obstructions: Vec<TerrainObstruction>,
    /// Obstructions whose severity exceeds the configured threshold.
    pub high_severity_obstructions: usize,
    /// Share of ray samples where a target would be visible, 0 to 1.
    pub target_visibility: f64,
    pub provenance: Provenance,
}

/// Horizon angles around a site.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HorizonMask {
    pub observer: TerrainPoint,
    pub observer_height_m: f64,
    pub max_range_km: f64,
    pub points: Vec<HorizonPoint>,
    pub max_elevation_angle_deg: f64,
    pub mean_elevation_angle_deg: f64,
    pub provenance: Provenance,
}

/// What one ray found.
struct RayOutcome {
    horizon: HorizonPoint,
    visible_radius_km: f64,
    obstruction: Option<TerrainObstruction>,
    visible_targets: usize,
    samples: usize,
}

/// Everything a sweep produces before it is shaped into a result.
struct Sweep {
    observer: TerrainPoint,
    rays: Vec<RayOutcome>,
    spans_deg: Vec<f64>,
    provenance: Provenance,
}

/// Terrain visibility calculator over a shared [`TerrainPipeline`].
#[derive(Debug, Clone)]
pub struct ViewshedCalculator {
    pipeline: Arc<TerrainPipeline>,
    params: ViewshedParams,
}

impl ViewshedCalculator {
    /// Calculator with default parameters.
    pub fn new(pipeline: Arc<TerrainPipeline>) -> Self {
        Self::with_params(pipeline, ViewshedParams::default())
    }

    /// Calculator with explicit parameters.
    pub fn with_params(pipeline: Arc<TerrainPipeline>, params: ViewshedParams) -> Self {
        Self { pipeline, params }
    }

    /// Parameters in force.
    pub fn params(&self) -> &ViewshedParams {
        &self.params
    }

    /// The shared pipeline.
    pub fn pipeline(&self) -> &Arc<TerrainPipeline> {
        &self.pipeline
    }

    /// Sweep rays around an observer and summarise what is visible.
    pub fn calculate_viewshed(&self, request: &ViewshedRequest) -> Result<ViewshedAnalysis> {
        let started = Instant::now();
        let sweep = self.sweep(
            request.latitude,
            request.longitude,
            request.max_range_km,
            request.observer_height_m,
            request.target_height_m,
            request.azimuth_step_deg,
        )?;

        let mut visible_area_km2 = 0.0;
        let mut visible_targets = 0;
        let mut target_samples = 0;
        for (ray, span) in sweep.rays.iter().zip(&sweep.spans_deg) {
            visible_area_km2 += 0.5 * ray.visible_radius_km.powi(2) * span.to_radians();
            visible_targets += ray.visible_targets;
            target_samples += ray.samples;
        }
        let disc_km2 = std::f64::consts::PI * request.max_range_km.powi(2);
        let coverage_percentage = (visible_area_km2 / disc_km2 * 100.0).clamp(0.0, 100.0);

        let visible_radius_km = sweep.rays.iter().map(|r| r.visible_radius_km).collect();
        let horizon = sweep.rays.iter().map(|r| r.horizon).collect();
        let obstructions = merge_sectors(sweep.rays.into_iter().map(|r| r.obstruction).collect());
        let high_severity_obstructions = obstructions
            .iter()
            .filter(|o| o.severity > self.params.high_severity_threshold)
            .count();

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!(metric_defs::VIEWSHED_DURATION.name).record(elapsed_ms);
        debug!(
            lat = request.latitude,
            lon = request.longitude,
            coverage = coverage_percentage,
            obstructions = obstructions.len(),
            elapsed_ms,
            "Computed viewshed"
        );

        Ok(ViewshedAnalysis {
            observer: sweep.observer,
            observer_height_m: request.observer_height_m,
            target_height_m: request.target_height_m,
            max_range_km: request.max_range_km,
            azimuth_step_deg: request.azimuth_step_deg,
            visible_area_km2,
            coverage_percentage,
            visible_radius_km,
            horizon,
            obstructions,
            high_severity_obstructions,
            target_visibility: if target_samples == 0 {
                0.0
            } else {
                visible_targets as f64 / target_samples as f64
            },
            provenance: sweep.provenance,
        })
    }

    /// Horizon angle on every azimuth around a site.
    pub fn calculate_horizon_mask(
        &self,
        latitude: f64,
        longitude: f64,
        observer_height_m: f64,
        max_range_km: f64,
        azimuth_step_deg: f64,
    ) -> Result<HorizonMask> {
        let sweep = self.sweep(latitude, longitude, max_range_km, observer_height_m, 0.0, azimuth_step_deg)?;
        let points: Vec<HorizonPoint> = sweep.rays.iter().map(|r| r.horizon).collect();
        let max_elevation_angle_deg = points
            .iter()
            .map(|p| p.elevation_angle_deg)
            .fold(f64::NEG_INFINITY, f64::max);
        let mean_elevation_angle_deg =
            points.iter().map(|p| p.elevation_angle_deg).sum::<f64>() / points.len().max(1) as f64;

        Ok(HorizonMask {
            observer: sweep.observer,
            observer_height_m,
            max_range_km,
            points,
            max_elevation_angle_deg,
            mean_elevation_angle_deg,
            provenance: sweep.provenance,
        })
    }

    fn sweep(
        &self,
        latitude: f64,
        longitude: f64,
        max_range_km: f64,
        observer_height_m: f64,
        target_height_m: f64,
        azimuth_step_deg: f64,
    ) -> Result<Sweep> {
        validate_positive("max_range_km", max_range_km)?;
        validate_positive("azimuth_step_deg", azimuth_step_deg)?;
        if azimuth_step_deg > 360.0 {
            return Err(ViewshedError::InvalidParameter(format!(
                "azimuth_step_deg must not exceed 360, got {azimuth_step_deg}"
            )));
        }
        if !(observer_height_m.is_finite() && observer_height_m >= 0.0)
            || !(target_height_m.is_finite() && target_height_m >= 0.0)
        {
            return Err(ViewshedError::InvalidParameter(
                "observer and target heights must be finite and non-negative".to_string(),
            ));
        }
        validate_positive("sample_spacing_m", self.params.sample_spacing_m)?;

        let observer = self.pipeline.get_elevation(latitude, longitude)?;
        self.pipeline
            .prefetch_region(&TileBounds::around(latitude, longitude, max_range_km))?;

        let azimuths = azimuth_sweep(azimuth_step_deg);
        let spans_deg: Vec<f64> = azimuths
            .iter()
            .map(|az| azimuth_step_deg.min(360.0 - az))
            .collect();

        let max_range_m = max_range_km * 1000.0;
        let steps = (max_range_m / self.params.sample_spacing_m).ceil().max(1.0) as usize;
        let distances_m: Vec<f64> = (1..=steps)
            .map(|k| (k as f64 * self.params.sample_spacing_m).min(max_range_m))
            .collect();

        let mut coords = Vec::with_capacity(azimuths.len() * distances_m.len());
        for &azimuth in &azimuths {
            for &distance in &distances_m {
                coords.push(destination_point(latitude, longitude, azimuth, distance));
            }
        }
        trace!(rays = azimuths.len(), samples = coords.len(), "Sampling viewshed rays");
        let samples = self.pipeline.get_elevation_batch(&coords)?;

        let mut provenance = Provenance::from_point(&observer);
        for sample in &samples {
            provenance.record(&sample.source);
        }

        let eye_m = observer.elevation + observer_height_m;
        let rays = azimuths
            .iter()
            .zip(&spans_deg)
            .zip(samples.chunks(distances_m.len()))
            .map(|((&azimuth, &span), ray)| {
                self.trace_ray(azimuth, span, eye_m, target_height_m, max_range_km, &distances_m, ray)
            })
            .collect();

        Ok(Sweep {
            observer,
            rays,
            spans_deg,
            provenance,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn trace_ray(
        &self,
        azimuth_deg: f64,
        span_deg: f64,
        eye_m: f64,
        target_height_m: f64,
        max_range_km: f64,
        distances_m: &[f64],
        samples: &[TerrainPoint],
    ) -> RayOutcome {
        let mut horizon = HorizonPoint {
            azimuth_deg,
            elevation_angle_deg: f64::NEG_INFINITY,
            distance_km: max_range_km,
            obstruction_height_m: 0.0,
        };
        let mut visible_radius_km = max_range_km;
        let mut first_block: Option<f64> = None;
        let mut worst: Option<(f64, &TerrainPoint, f64)> = None;
        let mut max_terrain_angle = f64::NEG_INFINITY;
        let mut visible_targets = 0;

        for (&distance_m, sample) in distances_m.iter().zip(samples) {
            let corrected_m = sample.elevation - self.params.curvature_drop_m(distance_m);
            let relative_m = corrected_m - eye_m;
            let angle = relative_m.atan2(distance_m).to_degrees();

            let target_angle = (relative_m + target_height_m).atan2(distance_m).to_degrees();
            if target_angle >= max_terrain_angle {
                visible_targets += 1;
            }

            if angle > horizon.elevation_angle_deg {
                horizon.elevation_angle_deg = angle;
                horizon.distance_km = distance_m / 1000.0;
                horizon.obstruction_height_m = relative_m;
            }
            max_terrain_angle = max_terrain_angle.max(angle);

            if relative_m > 0.0 {
                first_block.get_or_insert(distance_m);
                if worst.map_or(true, |(excess, _, _)| relative_m > excess) {
                    worst = Some((relative_m, sample, distance_m));
                }
            }
        }

        if let Some(distance_m) = first_block {
            visible_radius_km = distance_m / 1000.0;
        }
        let obstruction = worst.map(|(excess, sample, distance_m)| {
            TerrainObstruction::from_sector(
                sample.latitude,
                sample.longitude,
                distance_m / 1000.0,
                excess,
                azimuth_deg,
                span_deg,
            )
        });

        RayOutcome {
            horizon,
            visible_radius_km,
            obstruction,
            visible_targets,
            samples: samples.len(),
        }
    }
}

/// Azimuths `i * step` in [0, 360). The last sector is truncated to close the
/// circle; steps that divide 360 up to rounding produce no sliver ray at 360.
fn azimuth_sweep(step_deg: f64) -> Vec<f64> {
    const TOLERANCE_DEG: f64 = 1e-9;
    let count = ((360.0 / step_deg) - TOLERANCE_DEG).ceil().max(1.0) as usize;
    (0..count)
        .map(|i| i as f64 * step_deg)
        .filter(|az| *az < 360.0 - TOLERANCE_DEG)
        .collect()
}

fn validate_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ViewshedError::InvalidParameter(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use vantage_dem::{FunctionSource, PipelineConfig};

    fn calculator(f: impl Fn(f64, f64) -> f32 + Send + Sync + 'static) -> ViewshedCalculator {
        let pipeline = TerrainPipeline::new(PipelineConfig::default()).with_source(FunctionSource::new("test", 30.0, f));
        ViewshedCalculator::new(Arc::new(pipeline))
    }

    #[test]
    fn test_azimuth_sectors_sum_to_circle() {
        let calc = calculator(|_, _| 100.0);
        let request = ViewshedRequest::new(10.5, 10.5, 2.0).with_azimuth_step(7.0);
        let analysis = calc.calculate_viewshed(&request).unwrap();

        // ceil(360 / 7) = 52 rays, last sector 3 degrees
        assert_eq!(analysis.horizon.len(), 52);
        assert_relative_eq!(analysis.horizon[51].azimuth_deg, 357.0);
        assert_relative_eq!(analysis.coverage_percentage, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_azimuth_sweep_has_no_ray_at_full_circle() {
        for step in [360.0 / 227.0, 360.0 / 7.0, 0.3, 1.0, 360.0] {
            let azimuths = azimuth_sweep(step);
            assert_eq!(azimuths[0], 0.0);
            assert!(azimuths.iter().all(|az| (0.0..360.0).contains(az)), "step {step}");
            assert!(360.0 - azimuths[azimuths.len() - 1] > 1e-6, "step {step}");
        }
        assert_eq!(azimuth_sweep(360.0 / 227.0).len(), 227);
        assert_eq!(azimuth_sweep(0.3).len(), 1200);
    }

    #[test]
    fn test_non_dividing_step_keeps_horizon_in_range() {
        let calc = calculator(|_, _| 100.0);
        let request = ViewshedRequest::new(10.5, 10.5, 1.0).with_azimuth_step(360.0 / 227.0);
        let analysis = calc.calculate_viewshed(&request).unwrap();

        assert_eq!(analysis.horizon.len(), 227);
        let last = analysis.horizon[analysis.horizon.len() - 1].azimuth_deg;
        assert!(last < 360.0);
        assert_relative_eq!(analysis.coverage_percentage, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_parameters() {
        let calc = calculator(|_, _| 100.0);
        let bad = [
            ViewshedRequest::new(10.5, 10.5, 0.0),
            ViewshedRequest::new(10.5, 10.5, 5.0).with_azimuth_step(0.0),
            ViewshedRequest::new(10.5, 10.5, 5.0).with_azimuth_step(400.0),
            ViewshedRequest::new(10.5, 10.5, 5.0).with_observer_height(-1.0),
        ];
        for request in bad {
            assert!(matches!(
                calc.calculate_viewshed(&request),
                Err(ViewshedError::InvalidParameter(_))
            ));
        }
        assert!(matches!(
            calc.calculate_viewshed(&ViewshedRequest::new(95.0, 0.0, 5.0)),
            Err(ViewshedError::Terrain(_))
        ));
    }

    #[test]
    fn test_target_height_improves_visibility() {
        // A 40 m plateau 2.7 to 4.9 km east of the observer
        let calc = calculator(|_, lon| if (10.525..10.545).contains(&lon) { 140.0 } else { 100.0 });
        let low = calc
            .calculate_viewshed(&ViewshedRequest::new(10.5, 10.5, 8.0).with_azimuth_step(10.0))
            .unwrap();
        let tall = calc
            .calculate_viewshed(
                &ViewshedRequest::new(10.5, 10.5, 8.0)
                    .with_azimuth_step(10.0)
                    .with_target_height(200.0),
            )
            .unwrap();

        assert!(tall.target_visibility > low.target_visibility);
        assert!(low.coverage_percentage < 100.0);
    }
}
