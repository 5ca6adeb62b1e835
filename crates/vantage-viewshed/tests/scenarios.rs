//! End-to-end visibility scenarios over analytic terrain.

use std::sync::Arc;

use approx::assert_relative_eq;
use vantage_dem::{FunctionSource, PipelineConfig, TerrainPipeline};
use vantage_viewshed::{ObstructionClass, ProfileRequest, ViewshedCalculator, ViewshedError, ViewshedRequest};

fn calculator(resolution_arcsec: f64, f: impl Fn(f64, f64) -> f32 + Send + Sync + 'static) -> ViewshedCalculator {
    let pipeline =
        TerrainPipeline::new(PipelineConfig::default()).with_source(FunctionSource::new("analytic", resolution_arcsec, f));
    ViewshedCalculator::new(Arc::new(pipeline))
}

#[test]
fn test_flat_terrain_full_coverage() {
    let calc = calculator(30.0, |_, _| 200.0);
    let request = ViewshedRequest::new(35.5, -110.5, 10.0).with_azimuth_step(5.0);
    let analysis = calc.calculate_viewshed(&request).unwrap();

    assert_relative_eq!(analysis.coverage_percentage, 100.0, epsilon = 1e-6);
    assert_relative_eq!(
        analysis.visible_area_km2,
        std::f64::consts::PI * 100.0,
        epsilon = 1e-6
    );
    assert!(analysis.obstructions.is_empty());
    assert_eq!(analysis.high_severity_obstructions, 0);
    assert!(analysis.horizon.iter().all(|h| h.elevation_angle_deg < 0.0));
    assert_relative_eq!(analysis.target_visibility, 1.0);
    assert!(!analysis.provenance.is_degraded());
}

#[test]
fn test_flat_terrain_fifty_km_one_degree_sweep() {
    let calc = calculator(30.0, |_, _| 200.0);
    let request = ViewshedRequest::new(40.0, -75.0, 50.0)
        .with_observer_height(30.0)
        .with_azimuth_step(1.0);
    let analysis = calc.calculate_viewshed(&request).unwrap();

    assert_eq!(analysis.horizon.len(), 360);
    assert!(analysis.horizon.iter().all(|h| (0.0..360.0).contains(&h.azimuth_deg)));
    assert_relative_eq!(analysis.observer.elevation, 200.0, epsilon = 1e-3);
    assert_relative_eq!(analysis.visible_area_km2, std::f64::consts::PI * 2500.0, max_relative = 1e-3);
    assert_relative_eq!(analysis.coverage_percentage, 100.0, epsilon = 1e-6);
    assert!(analysis.obstructions.is_empty());
}

#[test]
fn test_horizon_mask_one_degree_has_360_points() {
    let calc = calculator(30.0, |lat, lon| (300.0 + 50.0 * (lat * 40.0).sin() * (lon * 40.0).cos()) as f32);
    let mask = calc.calculate_horizon_mask(12.5, 45.5, 10.0, 5.0, 1.0).unwrap();

    assert_eq!(mask.points.len(), 360);
    for (i, point) in mask.points.iter().enumerate() {
        assert_relative_eq!(point.azimuth_deg, i as f64);
        assert!(point.distance_km > 0.0 && point.distance_km <= 5.0);
    }
    assert!(mask.max_elevation_angle_deg >= mask.mean_elevation_angle_deg);
}

#[test]
fn test_ridge_blocks_profile() {
    // 500 m ridge across the midpoint of a 10 km east-west path
    let calc = calculator(3.0, |_, lon| if (0.4925..=0.4975).contains(&lon) { 600.0 } else { 100.0 });
    let request = ProfileRequest::new((0.5, 0.45), (0.5, 0.54));
    let profile = calc.calculate_elevation_profile(&request).unwrap();

    assert_relative_eq!(profile.distance_km, 10.0, epsilon = 0.1);
    assert!(!profile.line_of_sight);
    assert!(!profile.fresnel_clear());
    assert!(profile.fresnel_obstructed_samples > 0);
    assert_relative_eq!(profile.max_elevation_m, 600.0, epsilon = 1.0);
    assert_relative_eq!(profile.min_elevation_m, 100.0, epsilon = 1.0);
    assert_relative_eq!(profile.total_ascent_m, profile.total_descent_m, epsilon = 1.0);
    assert!(profile.samples[0].fresnel.is_none());
    assert!(profile.samples[99].fresnel.is_none());
    assert!(profile.min_clearance_ratio < 0.0);
}

#[test]
fn test_flat_profile_clear() {
    let calc = calculator(30.0, |_, _| 100.0);
    let request = ProfileRequest::new((0.5, 0.45), (0.5, 0.54)).with_heights(30.0, 30.0);
    let profile = calc.calculate_elevation_profile(&request).unwrap();

    // Bulge at mid-path is ~1.7 m and the 2.4 GHz zone ~17.7 m: 30 m masts clear both
    assert!(profile.line_of_sight);
    assert!(profile.fresnel_clear());
    assert_eq!(profile.samples.len(), 100);
    assert!(profile.min_clearance_ratio > 0.6);
}

#[test]
fn test_low_masts_fail_fresnel_but_keep_line_of_sight() {
    let calc = calculator(30.0, |_, _| 100.0);
    let request = ProfileRequest::new((0.5, 0.45), (0.5, 0.54)).with_heights(5.0, 5.0);
    let profile = calc.calculate_elevation_profile(&request).unwrap();

    assert!(profile.line_of_sight);
    assert!(!profile.fresnel_clear());
}

#[test]
fn test_northern_ridge_merges_into_one_obstruction() {
    // 400 m ridge 3 to 6 km north of the observer, spanning only northern azimuths
    let calc = calculator(30.0, |lat, lon| {
        let north = (20.527..=20.554).contains(&lat);
        let band = (30.47..=30.53).contains(&lon);
        if north && band { 500.0 } else { 100.0 }
    });
    let request = ViewshedRequest::new(20.5, 30.5, 8.0).with_azimuth_step(5.0);
    let analysis = calc.calculate_viewshed(&request).unwrap();

    assert!(analysis.coverage_percentage < 100.0);
    assert_eq!(analysis.obstructions.len(), 1);
    let ridge = &analysis.obstructions[0];
    assert_eq!(ridge.class, ObstructionClass::Ridge);
    // Range wraps through north
    assert!(ridge.azimuth_start_deg > 270.0);
    assert!(ridge.azimuth_end_deg < 90.0);
    assert!(ridge.severity > 0.7);
    assert!(analysis.high_severity_obstructions >= 1);

    let north = analysis.horizon[0];
    assert!(north.elevation_angle_deg > 0.0);
    assert!(north.obstruction_height_m > 100.0);
}

#[test]
fn test_synthetic_provenance_propagates() {
    let pipeline = TerrainPipeline::new(PipelineConfig::default());
    let calc = ViewshedCalculator::new(Arc::new(pipeline));
    let analysis = calc
        .calculate_viewshed(&ViewshedRequest::new(-20.5, 130.5, 3.0).with_azimuth_step(30.0))
        .unwrap();

    assert!(analysis.observer.is_synthetic());
    assert!(analysis.provenance.is_degraded());
    assert_relative_eq!(analysis.provenance.synthetic_fraction(), 1.0);
}

#[test]
fn test_profile_rejects_degenerate_paths() {
    let calc = calculator(30.0, |_, _| 100.0);
    assert!(matches!(
        calc.calculate_elevation_profile(&ProfileRequest::new((1.5, 1.5), (1.5, 1.5))),
        Err(ViewshedError::InvalidParameter(_))
    ));
    assert!(matches!(
        calc.calculate_elevation_profile(&ProfileRequest::new((1.5, 1.5), (1.6, 1.6)).with_points(1)),
        Err(ViewshedError::InvalidParameter(_))
    ));
}
