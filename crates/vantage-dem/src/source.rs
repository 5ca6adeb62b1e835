//! Pluggable elevation sources.
//!
//! A source hands back the tile covering the degree cell that contains a
//! requested point. The pipeline consults sources in preference order and
//! validates every tile it receives, so sources do no quality checking of
//! their own.

use crate::tile::{parse_usgs_corner, TerrainTile, TileBounds, TileKey, TileMetadata};
use crate::{Result, TerrainError};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A request budget: at most `max_requests` fetches per sliding `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RateLimit {
    /// Maximum fetches inside one window.
    pub max_requests: usize,
    /// Window length.
    pub window: Duration,
}

impl RateLimit {
    /// Budget of `max_requests` per `window`.
    pub const fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// A provider of elevation tiles.
pub trait ElevationSource: Send + Sync {
    /// Stable name used as the provenance tag of every sample this source produces.
    fn name(&self) -> &str;

    /// Box outside which the source is never asked for data.
    fn coverage(&self) -> TileBounds;

    /// Optional request budget enforced by the pipeline before each fetch.
    fn rate_limit(&self) -> Option<RateLimit> {
        None
    }

    /// Fetch the tile covering the degree cell that contains (`lat`, `lon`).
    fn fetch(&self, lat: f64, lon: f64) -> Result<TerrainTile>;
}

/// Sliding-window request counter for one source.
///
/// Fails fast instead of blocking when the budget is spent.
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    requests: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter for a budget.
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            requests: Mutex::new(VecDeque::with_capacity(limit.max_requests)),
        }
    }

    /// Record a request at `now` if the budget allows it.
    pub fn try_acquire_at(&self, now: Instant) -> Result<bool> {
        let mut requests = self
            .requests
            .lock()
            .map_err(|_| TerrainError::CacheLockPoisoned)?;
        while let Some(front) = requests.front() {
            if now.saturating_duration_since(*front) >= self.limit.window {
                requests.pop_front();
            } else {
                break;
            }
        }
        if requests.len() >= self.limit.max_requests {
            return Ok(false);
        }
        requests.push_back(now);
        Ok(true)
    }

    /// Record a request now if the budget allows it.
    pub fn try_acquire(&self) -> Result<bool> {
        self.try_acquire_at(Instant::now())
    }

    /// The budget this limiter enforces.
    pub fn limit(&self) -> RateLimit {
        self.limit
    }
}

/// Elevation function used by [`FunctionSource`].
pub type ElevationFn = dyn Fn(f64, f64) -> f32 + Send + Sync;

/// Source that rasterises an analytic elevation function on demand.
///
/// Handy for tests and for terrain models computed rather than stored.
#[derive(Clone)]
pub struct FunctionSource {
    name: String,
    coverage: TileBounds,
    resolution_arcsec: f64,
    rate_limit: Option<RateLimit>,
    elevation: Arc<ElevationFn>,
}

impl FunctionSource {
    /// Global source sampling `elevation` at `resolution_arcsec`.
    pub fn new<F>(name: impl Into<String>, resolution_arcsec: f64, elevation: F) -> Self
    where
        F: Fn(f64, f64) -> f32 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            coverage: TileBounds::world(),
            resolution_arcsec,
            rate_limit: None,
            elevation: Arc::new(elevation),
        }
    }

    /// Restrict the source to a box.
    pub fn with_coverage(mut self, coverage: TileBounds) -> Self {
        self.coverage = coverage;
        self
    }

    /// Attach a request budget.
    pub fn with_rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = Some(limit);
        self
    }
}

impl fmt::Debug for FunctionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSource")
            .field("name", &self.name)
            .field("coverage", &self.coverage)
            .field("resolution_arcsec", &self.resolution_arcsec)
            .finish_non_exhaustive()
    }
}

impl ElevationSource for FunctionSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn coverage(&self) -> TileBounds {
        self.coverage
    }

    fn rate_limit(&self) -> Option<RateLimit> {
        self.rate_limit
    }

    fn fetch(&self, lat: f64, lon: f64) -> Result<TerrainTile> {
        let key = TileKey::from_coord(lat, lon);
        let elevation = &self.elevation;
        TerrainTile::from_fn(
            key.bounds(),
            self.resolution_arcsec,
            TileMetadata::now(self.name.clone(), "analytic"),
            |lat, lon| elevation(lat, lon),
        )
    }
}

/// Source serving pre-decoded tiles handed over by an external adapter.
#[derive(Debug, Clone)]
pub struct GridSource {
    name: String,
    tiles: HashMap<TileKey, TerrainTile>,
    rate_limit: Option<RateLimit>,
}

impl GridSource {
    /// Empty source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tiles: HashMap::new(),
            rate_limit: None,
        }
    }

    /// Add a tile, keyed by the cell containing its centre.
    pub fn insert(&mut self, tile: TerrainTile) {
        let (lat, lon) = tile.bounds().center();
        self.tiles.insert(TileKey::from_coord(lat, lon), tile);
    }

    /// Builder form of [`GridSource::insert`].
    pub fn with_tile(mut self, tile: TerrainTile) -> Self {
        self.insert(tile);
        self
    }

    /// Attach a request budget.
    pub fn with_rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    /// Number of tiles held.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// True when no tiles are held.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl ElevationSource for GridSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn coverage(&self) -> TileBounds {
        union_bounds(self.tiles.values().map(TerrainTile::bounds)).unwrap_or(TileBounds {
            min_lat: 0.0,
            max_lat: 0.0,
            min_lon: 0.0,
            max_lon: 0.0,
        })
    }

    fn rate_limit(&self) -> Option<RateLimit> {
        self.rate_limit
    }

    fn fetch(&self, lat: f64, lon: f64) -> Result<TerrainTile> {
        let key = TileKey::from_coord(lat, lon);
        self.tiles
            .get(&key)
            .or_else(|| self.tiles.values().find(|t| t.bounds().contains(lat, lon)))
            .cloned()
            .ok_or_else(|| TerrainError::SourceUnavailable {
                source_name: self.name.clone(),
                reason: format!("no tile for cell {key}"),
            })
    }
}

/// Source backed by a directory of USGS-named GeoTIFF files.
///
/// Indexing only scans filenames; rasters are decoded on fetch.
#[derive(Debug, Clone)]
pub struct GeoTiffSource {
    name: String,
    tile_paths: HashMap<TileKey, PathBuf>,
}

impl GeoTiffSource {
    /// Empty source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tile_paths: HashMap::new(),
        }
    }

    /// Source indexing every `.tif` in a directory.
    pub fn from_directory<P: AsRef<Path>>(name: impl Into<String>, dir: P) -> Result<Self> {
        let mut source = Self::new(name);
        source.add_directory(dir)?;
        Ok(source)
    }

    /// Index all GeoTIFF files from a directory.
    ///
    /// Files must have a `.tif` extension and follow the USGS naming
    /// convention. Returns the number of tiles indexed.
    pub fn add_directory<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let mut count = 0;

        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "tif") && self.add_file(&path).is_ok() {
                count += 1;
            }
        }

        tracing::debug!(source = %self.name, count, "Indexed GeoTIFF tiles");
        Ok(count)
    }

    /// Index a single GeoTIFF file.
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| TerrainError::InvalidFilename(path.display().to_string()))?;
        let (north, west) = parse_usgs_corner(filename)
            .ok_or_else(|| TerrainError::InvalidFilename(filename.to_string()))?;

        // Files are named by their north-west corner; keys use the south-west
        self.tile_paths.insert(
            TileKey {
                lat: north - 1,
                lon: west,
            },
            path.to_path_buf(),
        );
        Ok(())
    }

    /// Number of indexed tiles.
    pub fn tile_count(&self) -> usize {
        self.tile_paths.len()
    }
}

impl ElevationSource for GeoTiffSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn coverage(&self) -> TileBounds {
        union_bounds(self.tile_paths.keys().map(TileKey::bounds)).unwrap_or(TileBounds {
            min_lat: 0.0,
            max_lat: 0.0,
            min_lon: 0.0,
            max_lon: 0.0,
        })
    }

    fn fetch(&self, lat: f64, lon: f64) -> Result<TerrainTile> {
        let key = TileKey::from_coord(lat, lon);
        let path = self
            .tile_paths
            .get(&key)
            .ok_or_else(|| TerrainError::SourceUnavailable {
                source_name: self.name.clone(),
                reason: format!("no file indexed for cell {key}"),
            })?;
        tracing::debug!(source = %self.name, path = %path.display(), "Decoding GeoTIFF tile");
        TerrainTile::from_geotiff(path, &self.name)
    }
}

/// Smallest box enclosing every input box.
fn union_bounds(mut bounds: impl Iterator<Item = TileBounds>) -> Option<TileBounds> {
    let first = bounds.next()?;
    Some(bounds.fold(first, |acc, b| TileBounds {
        min_lat: acc.min_lat.min(b.min_lat),
        max_lat: acc.max_lat.max(b.max_lat),
        min_lon: acc.min_lon.min(b.min_lon),
        max_lon: acc.max_lon.max(b.max_lon),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_sliding_window() {
        let limiter = RateLimiter::new(RateLimit::new(2, Duration::from_secs(10)));
        let start = Instant::now();

        assert!(limiter.try_acquire_at(start).unwrap());
        assert!(limiter.try_acquire_at(start + Duration::from_secs(1)).unwrap());
        assert!(!limiter.try_acquire_at(start + Duration::from_secs(2)).unwrap());
        // First request slides out of the window
        assert!(limiter.try_acquire_at(start + Duration::from_secs(10)).unwrap());
        assert!(!limiter.try_acquire_at(start + Duration::from_secs(10)).unwrap());
    }

    #[test]
    fn test_function_source_fetches_containing_cell() {
        let source = FunctionSource::new("analytic", 900.0, |lat, _| lat as f32);
        let tile = source.fetch(40.25, -74.75).unwrap();

        assert_eq!(tile.bounds(), TileKey { lat: 40, lon: -75 }.bounds());
        assert_eq!(tile.source(), "analytic");
        assert!((tile.sample(40.5, -74.5) - 40.5).abs() < 1e-4);
    }

    #[test]
    fn test_grid_source_lookup() {
        let tile = TerrainTile::from_fn(
            TileKey { lat: 5, lon: 6 }.bounds(),
            900.0,
            TileMetadata::now("grid", "1"),
            |_, _| 12.0,
        )
        .unwrap();
        let source = GridSource::new("grid").with_tile(tile);

        assert_eq!(source.len(), 1);
        assert!(source.fetch(5.5, 6.5).is_ok());
        assert!(matches!(
            source.fetch(7.5, 6.5),
            Err(TerrainError::SourceUnavailable { .. })
        ));
        assert!(source.coverage().contains(5.5, 6.5));
    }

    #[test]
    fn test_geotiff_source_indexes_by_filename() {
        let mut source = GeoTiffSource::new("usgs");
        source.add_file("dem/USGS_13_n48w123_20240327.tif").unwrap();
        assert!(source.add_file("dem/readme.tif").is_err());

        assert_eq!(source.tile_count(), 1);
        let coverage = source.coverage();
        assert_eq!(coverage.min_lat, 47.0);
        assert_eq!(coverage.max_lon, -122.0);
        assert!(matches!(
            source.fetch(10.0, 10.0),
            Err(TerrainError::SourceUnavailable { .. })
        ));
    }
}
