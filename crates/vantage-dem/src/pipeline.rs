//! The terrain data pipeline: fetch, validate, cache, and interpolate.

use crate::cache::{CacheStats, TileCache};
use crate::config::PipelineConfig;
use crate::geo::validate_coordinate;
use crate::quality::assess_tile;
use crate::source::{ElevationSource, RateLimiter};
use crate::synthetic::SyntheticSource;
use crate::terrain_metrics::{SampleGrid, TerrainMetrics};
use crate::tile::{TerrainTile, TileBounds, TileKey};
use crate::types::{Provenance, TerrainPoint};
use crate::{Result, TerrainError};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, trace, warn};
use vantage_metrics::metric_defs;

/// A configured source and its request budget.
struct SourceSlot {
    source: Box<dyn ElevationSource>,
    limiter: Option<RateLimiter>,
}

struct CacheState {
    cache: TileCache,
    last_sweep: Instant,
}

/// Elevation lookups over an ordered list of sources with validation,
/// synthetic fallback, and a shared tile cache.
///
/// The pipeline is `Send + Sync`; share it behind an `Arc`. Cache mutation is
/// serialised by a mutex while sampling of already-cached tiles proceeds in
/// parallel.
///
/// # Example
///
/// ```
/// use vantage_dem::{FunctionSource, PipelineConfig, TerrainPipeline};
///
/// let pipeline = TerrainPipeline::new(PipelineConfig::default())
///     .with_source(FunctionSource::new("analytic", 30.0, |lat, lon| (lat * 10.0 + lon) as f32));
///
/// let point = pipeline.get_elevation(40.5, -74.5)?;
/// assert_eq!(point.source, "analytic");
/// # Ok::<(), vantage_dem::TerrainError>(())
/// ```
pub struct TerrainPipeline {
    config: PipelineConfig,
    sources: Vec<SourceSlot>,
    synthetic: SyntheticSource,
    state: Mutex<CacheState>,
}

impl std::fmt::Debug for TerrainPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerrainPipeline")
            .field("config", &self.config)
            .field("sources", &self.source_names())
            .finish_non_exhaustive()
    }
}

impl TerrainPipeline {
    /// Pipeline with no sources; every lookup falls back to synthetic terrain
    /// unless strict mode is set.
    pub fn new(config: PipelineConfig) -> Self {
        let synthetic = SyntheticSource::new(config.synthetic_seed, config.synthetic_resolution_arcsec);
        let cache = TileCache::new(config.max_cache_bytes, config.cache_ttl());
        Self {
            config,
            sources: Vec::new(),
            synthetic,
            state: Mutex::new(CacheState {
                cache,
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Append a source at the lowest preference.
    pub fn with_source<S: ElevationSource + 'static>(mut self, source: S) -> Self {
        self.add_source(Box::new(source));
        self
    }

    /// Append a boxed source at the lowest preference.
    pub fn add_source(&mut self, source: Box<dyn ElevationSource>) {
        let limiter = source.rate_limit().map(RateLimiter::new);
        debug!(source = source.name(), rate_limited = limiter.is_some(), "Registered elevation source");
        self.sources.push(SourceSlot { source, limiter });
    }

    /// Configured source names in preference order.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|slot| slot.source.name()).collect()
    }

    /// The configuration in force.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Elevation at a coordinate.
    pub fn get_elevation(&self, lat: f64, lon: f64) -> Result<TerrainPoint> {
        validate_coordinate(lat, lon)?;
        let tile = self.tile_for(lat, lon)?;
        Ok(point_from_tile(&tile, lat, lon))
    }

    /// Elevations for many coordinates, aligned to input order.
    ///
    /// Points are grouped by tile cell and each group is loaded and sampled as
    /// an independent parallel task.
    pub fn get_elevation_batch(&self, points: &[(f64, f64)]) -> Result<Vec<TerrainPoint>> {
        for &(lat, lon) in points {
            validate_coordinate(lat, lon)?;
        }

        let mut groups: BTreeMap<TileKey, Vec<usize>> = BTreeMap::new();
        for (index, &(lat, lon)) in points.iter().enumerate() {
            groups.entry(TileKey::from_coord(lat, lon)).or_default().push(index);
        }
        trace!(points = points.len(), tiles = groups.len(), "Batch elevation lookup");

        let sampled: Vec<Vec<(usize, TerrainPoint)>> = groups
            .into_par_iter()
            .map(|(_, indices)| {
                let (lat, lon) = points[indices[0]];
                let tile = self.tile_for(lat, lon)?;
                Ok(indices
                    .into_iter()
                    .map(|i| {
                        let (lat, lon) = points[i];
                        (i, point_from_tile(&tile, lat, lon))
                    })
                    .collect())
            })
            .collect::<Result<_>>()?;

        let mut ordered: Vec<Option<TerrainPoint>> = vec![None; points.len()];
        for (index, point) in sampled.into_iter().flatten() {
            ordered[index] = Some(point);
        }
        Ok(ordered.into_iter().flatten().collect())
    }

    /// Sample `num_points` evenly spaced points on the straight (lat/lon
    /// linear) path from `start` to `end`, endpoints included.
    pub fn sample_line(&self, start: (f64, f64), end: (f64, f64), num_points: usize) -> Result<Vec<TerrainPoint>> {
        if num_points < 2 {
            return Err(TerrainError::InvalidSampleCount {
                count: num_points,
                minimum: 2,
            });
        }
        let coords: Vec<(f64, f64)> = (0..num_points)
            .map(|i| {
                let t = i as f64 / (num_points - 1) as f64;
                (start.0 + (end.0 - start.0) * t, start.1 + (end.1 - start.1) * t)
            })
            .collect();
        self.get_elevation_batch(&coords)
    }

    /// Load every tile cell intersecting a box. Returns the number of cells.
    pub fn prefetch_region(&self, bounds: &TileBounds) -> Result<usize> {
        bounds.validate()?;
        let keys = bounds.tile_keys();
        debug!(tiles = keys.len(), "Prefetching region");
        keys.par_iter()
            .map(|key| {
                let (lat, lon) = key.bounds().center();
                self.tile_for(lat, lon).map(|_| ())
            })
            .collect::<Result<Vec<()>>>()?;
        Ok(keys.len())
    }

    /// True when a live tile for the coordinate's cell is cached.
    pub fn has_cached_tile(&self, lat: f64, lon: f64) -> Result<bool> {
        let key = TileKey::from_coord(lat, lon);
        Ok(self.lock_state()?.cache.contains(&key, Instant::now()))
    }

    /// Drop every expired tile now. Returns the number dropped.
    pub fn sweep_expired(&self) -> Result<usize> {
        let mut state = self.lock_state()?;
        let now = Instant::now();
        state.last_sweep = now;
        Ok(state.cache.sweep_expired(now))
    }

    /// Drop every cached tile.
    pub fn clear_cache(&self) -> Result<()> {
        self.lock_state()?.cache.clear();
        Ok(())
    }

    /// Cache counters.
    pub fn cache_stats(&self) -> Result<CacheStats> {
        Ok(self.lock_state()?.cache.stats())
    }

    /// Statistics over a regular sample grid covering `bounds`.
    ///
    /// Grid spacing equals `resolution_arcsec`, coarsened when needed to stay
    /// within `max_metric_samples` points.
    pub fn calculate_terrain_metrics(&self, bounds: &TileBounds, resolution_arcsec: f64) -> Result<TerrainMetrics> {
        bounds.validate()?;
        if !(resolution_arcsec.is_finite() && resolution_arcsec > 0.0) {
            return Err(TerrainError::InvalidResolution(resolution_arcsec));
        }

        let (rows, cols, step_deg) = SampleGrid::layout(bounds, resolution_arcsec, self.config.max_metric_samples);
        let coords = SampleGrid::coordinates(bounds, rows, cols, step_deg);
        let points = self.get_elevation_batch(&coords)?;

        let mut provenance = Provenance::default();
        for point in &points {
            provenance.record(&point.source);
        }
        let grid = SampleGrid {
            bounds: *bounds,
            rows,
            cols,
            step_deg,
            elevations: points.into_iter().map(|p| p.elevation).collect(),
        };
        debug!(rows, cols, synthetic = provenance.synthetic_samples, "Computed terrain metrics grid");
        Ok(grid.summarize(provenance))
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, CacheState>> {
        self.state.lock().map_err(|_| TerrainError::CacheLockPoisoned)
    }

    /// The tile for a coordinate's cell, from cache or freshly loaded.
    ///
    /// Only tiles spanning the whole cell are served, so the answer for a
    /// coordinate does not depend on which point of its cell loaded the tile.
    fn tile_for(&self, lat: f64, lon: f64) -> Result<Arc<TerrainTile>> {
        let key = TileKey::from_coord(lat, lon);
        {
            let mut state = self.lock_state()?;
            let now = Instant::now();
            if now.saturating_duration_since(state.last_sweep) >= self.config.sweep_interval() {
                state.last_sweep = now;
                state.cache.sweep_expired(now);
            }
            if let Some(tile) = state.cache.get(&key, now) {
                return Ok(tile);
            }
        }

        // Fetch outside the lock; a concurrent miss on the same cell may fetch twice
        let tile = Arc::new(self.load_tile(key, lat, lon)?);
        self.lock_state()?.cache.insert(key, Arc::clone(&tile), Instant::now());
        Ok(tile)
    }

    /// Walk the fallback chain for a cell. `lat`/`lon` only label errors.
    fn load_tile(&self, key: TileKey, lat: f64, lon: f64) -> Result<TerrainTile> {
        let cell = key.bounds();
        let (center_lat, center_lon) = cell.center();
        let mut attempts = Vec::new();

        for slot in &self.sources {
            let name = slot.source.name();
            if !slot.source.coverage().contains(center_lat, center_lon) {
                trace!(source = name, cell = %key, "Cell outside source coverage");
                continue;
            }

            match self.fetch_validated(slot, key, (center_lat, center_lon)) {
                Ok(tile) => return Ok(tile),
                Err(err) if err.is_recoverable() => {
                    warn!(source = name, cell = %key, error = %err, "Elevation source failed, trying next");
                    metrics::counter!(
                        metric_defs::SOURCE_FAILURES.name,
                        "source" => name.to_string(),
                        "reason" => err.reason_label()
                    )
                    .increment(1);
                    attempts.push(format!("{name}: {err}"));
                }
                Err(err) => return Err(err),
            }
        }

        if self.config.strict {
            return Err(TerrainError::AllSourcesFailed { lat, lon, attempts });
        }

        warn!(cell = %key, failed = attempts.len(), "All elevation sources failed, using synthetic terrain");
        metrics::counter!(metric_defs::SYNTHETIC_FALLBACKS.name).increment(1);
        self.synthetic.fetch(center_lat, center_lon)
    }

    /// Fetch from one source and run quality validation and void filling.
    fn fetch_validated(&self, slot: &SourceSlot, key: TileKey, (lat, lon): (f64, f64)) -> Result<TerrainTile> {
        let name = slot.source.name();
        if let Some(limiter) = &slot.limiter {
            if !limiter.try_acquire()? {
                return Err(TerrainError::RateLimitExceeded {
                    source_name: name.to_string(),
                });
            }
        }

        metrics::counter!(metric_defs::SOURCE_FETCHES.name, "source" => name.to_string()).increment(1);
        let mut tile = slot.source.fetch(lat, lon)?;

        if !covers_cell(&tile, &key.bounds()) {
            return Err(TerrainError::PartialTile {
                source_name: name.to_string(),
                cell: key.to_string(),
            });
        }

        let report = assess_tile(&tile, self.config.void_sentinel, self.config.flat_stdev_threshold_m);
        if report.is_flat() {
            debug!(source = name, stdev_m = report.stdev_m, "Tile is suspiciously flat");
        }
        if report.score < self.config.quality_threshold {
            return Err(TerrainError::ValidationFailure {
                source_name: name.to_string(),
                score: report.score,
                threshold: self.config.quality_threshold,
            });
        }
        metrics::histogram!(metric_defs::TILE_QUALITY.name, "source" => name.to_string()).record(report.score);

        let filled = tile.fill_voids(self.config.void_sentinel);
        if filled > 0 {
            debug!(source = name, filled, "Filled void cells");
        }
        Ok(tile)
    }
}

/// True when the tile spans the whole cell, allowing one raster cell of slack
/// for rasters registered on pixel centres.
fn covers_cell(tile: &TerrainTile, cell: &TileBounds) -> bool {
    let bounds = tile.bounds();
    let slack = tile.resolution_arcsec() / 3600.0;
    bounds.min_lat <= cell.min_lat + slack
        && bounds.max_lat >= cell.max_lat - slack
        && bounds.min_lon <= cell.min_lon + slack
        && bounds.max_lon >= cell.max_lon - slack
}

fn point_from_tile(tile: &TerrainTile, lat: f64, lon: f64) -> TerrainPoint {
    TerrainPoint {
        latitude: lat,
        longitude: lon,
        elevation: tile.sample(lat, lon),
        accuracy: Some(tile.cell_size_m() / 2.0),
        source: tile.source().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FunctionSource;
    use approx::assert_relative_eq;

    fn ramp() -> FunctionSource {
        FunctionSource::new("ramp", 30.0, |lat, lon| (100.0 + lat * 10.0 + lon * 5.0) as f32)
    }

    #[test]
    fn test_get_elevation_interpolates() {
        let pipeline = TerrainPipeline::new(PipelineConfig::default()).with_source(ramp());
        let point = pipeline.get_elevation(10.5, 20.25).unwrap();

        assert_relative_eq!(point.elevation, 100.0 + 105.0 + 101.25, epsilon = 1e-2);
        assert_eq!(point.source, "ramp");
        assert!(point.accuracy.unwrap() > 0.0);
    }

    #[test]
    fn test_invalid_coordinate_surfaced() {
        let pipeline = TerrainPipeline::new(PipelineConfig::default()).with_source(ramp());
        assert!(matches!(
            pipeline.get_elevation(91.0, 0.0),
            Err(TerrainError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            pipeline.get_elevation_batch(&[(0.0, 0.0), (0.0, 181.0)]),
            Err(TerrainError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_batch_preserves_order() {
        let pipeline = TerrainPipeline::new(PipelineConfig::default()).with_source(ramp());
        let coords = [(10.5, 20.5), (-5.5, 3.5), (10.25, 20.75), (0.5, 0.5)];
        let points = pipeline.get_elevation_batch(&coords).unwrap();

        assert_eq!(points.len(), coords.len());
        for (point, (lat, lon)) in points.iter().zip(coords) {
            assert_eq!(point.latitude, lat);
            assert_eq!(point.longitude, lon);
        }
        assert_eq!(pipeline.cache_stats().unwrap().entries, 3);
    }

    #[test]
    fn test_sample_line_endpoints() {
        let pipeline = TerrainPipeline::new(PipelineConfig::default()).with_source(ramp());
        let line = pipeline.sample_line((1.1, 1.1), (1.9, 1.9), 5).unwrap();
        assert_eq!(line.len(), 5);
        assert_relative_eq!(line[4].latitude, 1.9);
        assert!(pipeline.sample_line((0.0, 0.0), (1.0, 1.0), 1).is_err());
    }

    #[test]
    fn test_metrics_over_ramp() {
        let pipeline = TerrainPipeline::new(PipelineConfig::default()).with_source(ramp());
        let bounds = TileBounds::new(10.1, 10.2, 20.1, 20.2).unwrap();
        let metrics = pipeline.calculate_terrain_metrics(&bounds, 30.0).unwrap();

        assert!(metrics.sample_count() > 100);
        assert!(metrics.min_elevation >= 100.0 + 101.0 + 100.5 - 0.1);
        assert!(metrics.average_slope > 0.0);
        assert_eq!(metrics.provenance.sources.len(), 1);
        assert!(!metrics.provenance.is_degraded());
    }

    #[test]
    fn test_poisoned_cache_surfaces_on_every_accessor() {
        let pipeline = Arc::new(TerrainPipeline::new(PipelineConfig::default()).with_source(ramp()));
        pipeline.get_elevation(1.5, 1.5).unwrap();
        assert!(pipeline.has_cached_tile(1.5, 1.5).unwrap());

        let shared = Arc::clone(&pipeline);
        let _ = std::thread::spawn(move || {
            let _guard = shared.state.lock().unwrap();
            panic!("poison the cache lock");
        })
        .join();

        assert!(matches!(pipeline.has_cached_tile(1.5, 1.5), Err(TerrainError::CacheLockPoisoned)));
        assert!(matches!(pipeline.cache_stats(), Err(TerrainError::CacheLockPoisoned)));
    }
}
