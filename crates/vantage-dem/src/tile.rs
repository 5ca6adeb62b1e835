//! Elevation tile representation.

use crate::geo::{is_plausible_elevation, METERS_PER_DEGREE};
use crate::{Result, TerrainError};
use chrono::{DateTime, Utc};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;

/// Geographic bounds of a tile or region.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileBounds {
    /// South edge, degrees.
    pub min_lat: f64,
    /// North edge, degrees.
    pub max_lat: f64,
    /// West edge, degrees.
    pub min_lon: f64,
    /// East edge, degrees.
    pub max_lon: f64,
}

impl TileBounds {
    /// Create bounds, rejecting inverted or off-globe boxes.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self> {
        let bounds = Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Bounds covering the whole globe.
    pub const fn world() -> Self {
        Self {
            min_lat: -90.0,
            max_lat: 90.0,
            min_lon: -180.0,
            max_lon: 180.0,
        }
    }

    /// Square box of half-width `radius_km` centred on a point, clipped to the globe.
    pub fn around(lat: f64, lon: f64, radius_km: f64) -> Self {
        let (dlat, dlon) = crate::geo::km_to_degrees(lat, radius_km, radius_km);
        Self {
            min_lat: (lat - dlat).max(-90.0),
            max_lat: (lat + dlat).min(90.0),
            min_lon: (lon - dlon).max(-180.0),
            max_lon: (lon + dlon).min(180.0),
        }
    }

    /// Check the box is finite, non-inverted, and on the globe.
    pub fn validate(&self) -> Result<()> {
        let values = [self.min_lat, self.max_lat, self.min_lon, self.max_lon];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(TerrainError::InvalidBounds("non-finite edge".to_string()));
        }
        if self.min_lat > self.max_lat || self.min_lon > self.max_lon {
            return Err(TerrainError::InvalidBounds(format!(
                "inverted box ({}, {}) - ({}, {})",
                self.min_lat, self.min_lon, self.max_lat, self.max_lon
            )));
        }
        if self.min_lat < -90.0 || self.max_lat > 90.0 || self.min_lon < -180.0 || self.max_lon > 180.0 {
            return Err(TerrainError::InvalidBounds(format!(
                "box ({}, {}) - ({}, {}) extends beyond the globe",
                self.min_lat, self.min_lon, self.max_lat, self.max_lon
            )));
        }
        Ok(())
    }

    /// Inclusive containment.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }

    /// True when the two boxes overlap (touching edges count).
    pub fn intersects(&self, other: &TileBounds) -> bool {
        self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
            && self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
    }

    /// Centre of the box.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Latitude span in degrees.
    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Longitude span in degrees.
    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Keys of every degree cell the box touches.
    pub fn tile_keys(&self) -> Vec<TileKey> {
        let south = TileKey::from_coord(self.min_lat, self.min_lon);
        let north = TileKey::from_coord(self.max_lat, self.max_lon);
        let mut keys = Vec::new();
        for lat in south.lat..=north.lat {
            for lon in south.lon..=north.lon {
                keys.push(TileKey { lat, lon });
            }
        }
        keys
    }
}

/// Degree-aligned cache key: the south-west corner of the cell containing a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileKey {
    /// floor(latitude), clamped to [-90, 89].
    pub lat: i32,
    /// floor(longitude), clamped to [-180, 179].
    pub lon: i32,
}

impl TileKey {
    /// Key of the cell containing a coordinate.
    ///
    /// The north pole and the antimeridian fold into the last cell so every
    /// valid coordinate maps to a cell that contains it.
    pub fn from_coord(lat: f64, lon: f64) -> Self {
        TileKey {
            lat: (lat.floor() as i32).clamp(-90, 89),
            lon: (lon.floor() as i32).clamp(-180, 179),
        }
    }

    /// The cell's one-degree bounds.
    pub fn bounds(&self) -> TileBounds {
        TileBounds {
            min_lat: self.lat as f64,
            max_lat: (self.lat + 1) as f64,
            min_lon: self.lon as f64,
            max_lon: (self.lon + 1) as f64,
        }
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.lat, self.lon)
    }
}

/// Where and when a tile came from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileMetadata {
    /// Name of the producing source.
    pub source: String,
    /// When the tile was produced.
    pub timestamp: DateTime<Utc>,
    /// Source-specific dataset version.
    pub version: String,
}

impl TileMetadata {
    /// Metadata stamped with the current time.
    pub fn now(source: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            timestamp: Utc::now(),
            version: version.into(),
        }
    }
}

/// A rectangular elevation grid.
///
/// Samples sit on cell corners: the first row lies on `max_lat`, the last on
/// `min_lat`, the first column on `min_lon`, and the last on `max_lon`.
#[derive(Debug, Clone)]
pub struct TerrainTile {
    /// Row-major samples, first row northmost.
    data: Vec<f32>,
    rows: usize,
    cols: usize,
    bounds: TileBounds,
    /// Grid spacing in arc-seconds.
    resolution_arcsec: f64,
    metadata: TileMetadata,
}

/// Fixed per-tile bookkeeping charged against the cache budget.
const TILE_OVERHEAD_BYTES: usize = 256;

impl TerrainTile {
    /// Grid dimensions implied by bounds and resolution.
    pub fn expected_dimensions(bounds: &TileBounds, resolution_arcsec: f64) -> (usize, usize) {
        let step = resolution_arcsec / 3600.0;
        let rows = (bounds.lat_span() / step).round() as usize + 1;
        let cols = (bounds.lon_span() / step).round() as usize + 1;
        (rows, cols)
    }

    /// Create a tile, checking the grid shape against bounds and resolution.
    pub fn new(
        bounds: TileBounds,
        resolution_arcsec: f64,
        rows: usize,
        cols: usize,
        data: Vec<f32>,
        metadata: TileMetadata,
    ) -> Result<Self> {
        bounds.validate()?;
        if !(resolution_arcsec.is_finite() && resolution_arcsec > 0.0) {
            return Err(TerrainError::InvalidResolution(resolution_arcsec));
        }
        let (expected_rows, expected_cols) = Self::expected_dimensions(&bounds, resolution_arcsec);
        if rows != expected_rows || cols != expected_cols || data.len() != rows * cols || rows < 2 || cols < 2 {
            return Err(TerrainError::GridShapeMismatch {
                rows,
                cols,
                expected_rows,
                expected_cols,
            });
        }
        Ok(Self {
            data,
            rows,
            cols,
            bounds,
            resolution_arcsec,
            metadata,
        })
    }

    /// Rasterise a function of (lat, lon) over the bounds.
    pub fn from_fn<F>(
        bounds: TileBounds,
        resolution_arcsec: f64,
        metadata: TileMetadata,
        mut elevation: F,
    ) -> Result<Self>
    where
        F: FnMut(f64, f64) -> f32,
    {
        if !(resolution_arcsec.is_finite() && resolution_arcsec > 0.0) {
            return Err(TerrainError::InvalidResolution(resolution_arcsec));
        }
        let (rows, cols) = Self::expected_dimensions(&bounds, resolution_arcsec);
        let mut data = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            let lat = bounds.max_lat - bounds.lat_span() * row as f64 / (rows - 1).max(1) as f64;
            for col in 0..cols {
                let lon = bounds.min_lon + bounds.lon_span() * col as f64 / (cols - 1).max(1) as f64;
                data.push(elevation(lat, lon));
            }
        }
        Self::new(bounds, resolution_arcsec, rows, cols, data, metadata)
    }

    /// Load a tile from a GeoTIFF file.
    ///
    /// Bounds come from the ModelTiepoint/ModelPixelScale tags, falling back to
    /// a USGS filename such as `USGS_13_n48w123_*.tif`. The raster is treated
    /// as pixel-is-area, so samples are registered on pixel centres.
    pub fn from_geotiff<P: AsRef<Path>>(path: P, source: &str) -> Result<Self> {
        let path = path.as_ref();
        // 1/3 arc-second tiles are 10812 x 10812 f32 pixels (~466 MB)
        const GIB: usize = 1 << 30;
        let mut limits = Limits::default();
        limits.decoding_buffer_size = GIB;
        limits.intermediate_buffer_size = GIB;
        limits.ifd_value_size = GIB;
        let mut decoder = Decoder::new(std::io::BufReader::new(std::fs::File::open(path)?))?.with_limits(limits);

        let (width, height) = decoder.dimensions()?;
        let (area_bounds, pixel_deg) = Self::read_geotransform(&mut decoder, path, width, height)?;
        let data = Self::read_raster(&mut decoder)?;

        let half = pixel_deg / 2.0;
        let bounds = TileBounds {
            min_lat: (area_bounds.min_lat + half).max(-90.0),
            max_lat: (area_bounds.max_lat - half).min(90.0),
            min_lon: (area_bounds.min_lon + half).max(-180.0),
            max_lon: (area_bounds.max_lon - half).min(180.0),
        };
        let version = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        Self::new(
            bounds,
            pixel_deg * 3600.0,
            height as usize,
            width as usize,
            data,
            TileMetadata::now(source, version),
        )
    }

    /// Read the area bounds and pixel size (degrees) from GeoTIFF tags.
    fn read_geotransform<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
        path: &Path,
        width: u32,
        height: u32,
    ) -> Result<(TileBounds, f64)> {
        const MODEL_TIEPOINT: u16 = 33922;
        const MODEL_PIXEL_SCALE: u16 = 33550;
        let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT)).ok();
        let scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE)).ok();

        if let (Some(tiepoint), Some(scale)) = (tiepoint, scale) {
            if tiepoint.len() >= 6 && scale.len() >= 2 {
                // [i, j, k, x, y, z]: raster origin (x, y) is the north-west corner
                let (tie_x, tie_y) = (tiepoint[3], tiepoint[4]);
                if (scale[0] - scale[1]).abs() > scale[1] * 1e-6 {
                    return Err(TerrainError::InvalidGeoTiff(format!(
                        "non-square pixels ({} x {} degrees)",
                        scale[0], scale[1]
                    )));
                }
                let bounds = TileBounds {
                    min_lat: tie_y - height as f64 * scale[1],
                    max_lat: tie_y,
                    min_lon: tie_x,
                    max_lon: tie_x + width as f64 * scale[0],
                };
                return Ok((bounds, scale[1]));
            }
        }

        let bounds = Self::bounds_from_filename(path)?;
        Ok((bounds, 1.0 / height as f64))
    }

    /// Parse tile bounds from a USGS filename like "USGS_13_n48w123_*.tif".
    ///
    /// The filename names the north-west corner of a one-degree tile.
    pub(crate) fn bounds_from_filename(path: &Path) -> Result<TileBounds> {
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| TerrainError::InvalidFilename(path.display().to_string()))?;
        let (north, west) = parse_usgs_corner(filename)
            .ok_or_else(|| TerrainError::InvalidFilename(filename.to_string()))?;

        Ok(TileBounds {
            min_lat: north as f64 - 1.0,
            max_lat: north as f64,
            min_lon: west as f64,
            max_lon: west as f64 + 1.0,
        })
    }

    /// Raster samples widened or narrowed to `f32` meters.
    fn read_raster<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f32>> {
        fn widen<T: Copy>(values: Vec<T>, to_f32: impl Fn(T) -> f32) -> Vec<f32> {
            values.into_iter().map(to_f32).collect()
        }

        Ok(match decoder.read_image()? {
            DecodingResult::F32(values) => values,
            DecodingResult::F64(values) => widen(values, |v| v as f32),
            DecodingResult::I8(values) => widen(values, f32::from),
            DecodingResult::I16(values) => widen(values, f32::from),
            DecodingResult::U16(values) => widen(values, f32::from),
            DecodingResult::I32(values) => widen(values, |v| v as f32),
            DecodingResult::U32(values) => widen(values, |v| v as f32),
            DecodingResult::I64(values) => widen(values, |v| v as f32),
            DecodingResult::U64(values) => widen(values, |v| v as f32),
            DecodingResult::U8(_) => {
                return Err(TerrainError::UnsupportedDataType(
                    "8-bit rasters are imagery, not elevation".to_string(),
                ))
            }
        })
    }

    /// Elevation at a coordinate by bilinear interpolation.
    ///
    /// Coordinates outside the tile are clamped to its edge.
    pub fn sample(&self, lat: f64, lon: f64) -> f64 {
        let x = ((lon - self.bounds.min_lon) / self.bounds.lon_span().max(f64::EPSILON))
            * (self.cols - 1) as f64;
        let y = ((self.bounds.max_lat - lat) / self.bounds.lat_span().max(f64::EPSILON))
            * (self.rows - 1) as f64;
        let x = x.clamp(0.0, (self.cols - 1) as f64);
        let y = y.clamp(0.0, (self.rows - 1) as f64);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.cols - 1);
        let y1 = (y0 + 1).min(self.rows - 1);
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        let v00 = self.get(y0, x0) as f64;
        let v10 = self.get(y0, x1) as f64;
        let v01 = self.get(y1, x0) as f64;
        let v11 = self.get(y1, x1) as f64;

        v00 * (1.0 - fx) * (1.0 - fy) + v10 * fx * (1.0 - fy) + v01 * (1.0 - fx) * fy + v11 * fx * fy
    }

    /// Raw grid value.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    /// True when a raw value is a void: the sentinel, non-finite, or implausible.
    pub fn is_void(value: f32, sentinel: f32) -> bool {
        value == sentinel || !is_plausible_elevation(value as f64)
    }

    /// Number of void cells.
    pub fn void_count(&self, sentinel: f32) -> usize {
        self.data.iter().filter(|v| Self::is_void(**v, sentinel)).count()
    }

    /// Replace void cells with the mean of their valid 8-neighbours.
    ///
    /// Neighbours are read from the unfilled grid; a void with no valid
    /// neighbour becomes 0. Returns the number of cells replaced.
    pub fn fill_voids(&mut self, sentinel: f32) -> usize {
        let voids: Vec<usize> = (0..self.data.len())
            .filter(|&i| Self::is_void(self.data[i], sentinel))
            .collect();
        if voids.is_empty() {
            return 0;
        }

        let original = self.data.clone();
        for &index in &voids {
            let row = (index / self.cols) as isize;
            let col = (index % self.cols) as isize;
            let mut sum = 0.0f64;
            let mut count = 0usize;
            for dr in -1..=1isize {
                for dc in -1..=1isize {
                    if dr == 0 && dc == 0 {
                        continue;
                    }
                    let (r, c) = (row + dr, col + dc);
                    if r < 0 || c < 0 || r >= self.rows as isize || c >= self.cols as isize {
                        continue;
                    }
                    let value = original[r as usize * self.cols + c as usize];
                    if !Self::is_void(value, sentinel) {
                        sum += value as f64;
                        count += 1;
                    }
                }
            }
            self.data[index] = if count > 0 { (sum / count as f64) as f32 } else { 0.0 };
        }
        voids.len()
    }

    /// Geographic bounds.
    pub fn bounds(&self) -> TileBounds {
        self.bounds
    }

    /// Grid dimensions as (rows, cols).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Grid spacing in arc-seconds.
    pub fn resolution_arcsec(&self) -> f64 {
        self.resolution_arcsec
    }

    /// Approximate north-south grid spacing in meters.
    pub fn cell_size_m(&self) -> f64 {
        self.resolution_arcsec / 3600.0 * METERS_PER_DEGREE
    }

    /// Raw grid values.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Provenance metadata.
    pub fn metadata(&self) -> &TileMetadata {
        &self.metadata
    }

    /// Name of the producing source.
    pub fn source(&self) -> &str {
        &self.metadata.source
    }

    /// Bytes charged against the cache budget.
    pub fn size_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>() + TILE_OVERHEAD_BYTES
    }
}

/// North-west corner `(lat, lon)` named by a token like `n48w123` or `s05e010`.
///
/// The first `_`/`-`/`.`-separated token of that shape wins.
pub(crate) fn parse_usgs_corner(filename: &str) -> Option<(i32, i32)> {
    filename
        .split(|c| c == '_' || c == '-' || c == '.')
        .find_map(|token| {
            let token = token.to_ascii_lowercase();
            let lat_sign = match token.as_bytes().first()? {
                b'n' => 1,
                b's' => -1,
                _ => return None,
            };
            let rest = &token[1..];
            let split = rest.find(|c: char| c == 'e' || c == 'w')?;
            let (lat, lon) = (&rest[..split], &rest[split + 1..]);
            let lon_sign = if rest.as_bytes()[split] == b'w' { -1 } else { 1 };
            let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
            if !(all_digits(lat) && all_digits(lon)) {
                return None;
            }
            Some((lat_sign * lat.parse::<i32>().ok()?, lon_sign * lon.parse::<i32>().ok()?))
        })
}
