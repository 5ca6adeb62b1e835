//! Regional terrain statistics.

use crate::geo::{meters_per_degree_lon, METERS_PER_DEGREE};
use crate::tile::TileBounds;
use crate::types::Provenance;
use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Slope below which a cell has no meaningful aspect (degrees).
pub const FLAT_SLOPE_DEG: f64 = 1.0;

/// Share of cells facing each compass sector, plus flat cells.
///
/// Fractions are of all cells and sum to 1.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AspectDistribution {
    pub north: f64,
    pub north_east: f64,
    pub east: f64,
    pub south_east: f64,
    pub south: f64,
    pub south_west: f64,
    pub west: f64,
    pub north_west: f64,
    /// Cells with slope under [`FLAT_SLOPE_DEG`].
    pub flat: f64,
}

impl AspectDistribution {
    fn sector_mut(&mut self, aspect_deg: f64) -> &mut f64 {
        match (((aspect_deg + 22.5) / 45.0).floor() as usize) % 8 {
            0 => &mut self.north,
            1 => &mut self.north_east,
            2 => &mut self.east,
            3 => &mut self.south_east,
            4 => &mut self.south,
            5 => &mut self.south_west,
            6 => &mut self.west,
            _ => &mut self.north_west,
        }
    }

    /// Sector fractions in compass order starting at north.
    pub fn sectors(&self) -> [f64; 8] {
        [
            self.north,
            self.north_east,
            self.east,
            self.south_east,
            self.south,
            self.south_west,
            self.west,
            self.north_west,
        ]
    }
}

/// Elevation percentiles in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElevationPercentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

/// Statistics of a sampled region. Computed on demand and never cached.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TerrainMetrics {
    /// Region analysed.
    pub bounds: TileBounds,
    /// Sample spacing actually used, in arc-seconds.
    pub resolution_arcsec: f64,
    /// Sample grid rows (north to south).
    pub rows: usize,
    /// Sample grid columns (west to east).
    pub cols: usize,
    pub mean_elevation: f64,
    pub min_elevation: f64,
    pub max_elevation: f64,
    /// Population variance of elevation (m²).
    pub elevation_variance: f64,
    /// Elevation standard deviation (m).
    pub ruggedness_index: f64,
    /// Mean slope in degrees.
    pub average_slope: f64,
    /// Steepest slope in degrees.
    pub max_slope: f64,
    pub aspect_distribution: AspectDistribution,
    pub percentiles: ElevationPercentiles,
    /// Sources behind the samples.
    pub provenance: Provenance,
}

impl TerrainMetrics {
    /// Number of samples behind the statistics.
    pub fn sample_count(&self) -> usize {
        self.rows * self.cols
    }
}

/// A regular sample grid: row-major elevations, north row first.
#[derive(Debug, Clone)]
pub struct SampleGrid {
    pub bounds: TileBounds,
    pub rows: usize,
    pub cols: usize,
    /// Spacing in degrees.
    pub step_deg: f64,
    pub elevations: Vec<f64>,
}

impl SampleGrid {
    /// Grid layout over `bounds` at `resolution_arcsec`, coarsened until it
    /// holds at most `max_samples` points. Returns (rows, cols, step_deg).
    pub fn layout(bounds: &TileBounds, resolution_arcsec: f64, max_samples: usize) -> (usize, usize, f64) {
        let max_samples = max_samples.max(1);
        let mut step = resolution_arcsec / 3600.0;
        loop {
            let rows = (bounds.lat_span() / step).floor() as usize + 1;
            let cols = (bounds.lon_span() / step).floor() as usize + 1;
            if rows * cols <= max_samples {
                return (rows, cols, step);
            }
            step *= ((rows * cols) as f64 / max_samples as f64).sqrt().max(1.01);
        }
    }

    /// Coordinates of every grid point in row-major order.
    pub fn coordinates(bounds: &TileBounds, rows: usize, cols: usize, step_deg: f64) -> Vec<(f64, f64)> {
        let mut points = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            let lat = (bounds.max_lat - row as f64 * step_deg).max(bounds.min_lat);
            for col in 0..cols {
                let lon = (bounds.min_lon + col as f64 * step_deg).min(bounds.max_lon);
                points.push((lat, lon));
            }
        }
        points
    }

    fn at(&self, row: usize, col: usize) -> f64 {
        self.elevations[row * self.cols + col]
    }

    /// Elevation gradient (east, north) at a cell in meters per meter.
    ///
    /// Central differences inside the grid, one-sided at the edges.
    fn gradient(&self, row: usize, col: usize, dx_m: f64, dy_m: f64) -> (f64, f64) {
        let dz_dx = if self.cols < 2 {
            0.0
        } else {
            let (c0, c1) = (col.saturating_sub(1), (col + 1).min(self.cols - 1));
            (self.at(row, c1) - self.at(row, c0)) / ((c1 - c0) as f64 * dx_m)
        };
        // Rows run north to south, so the northward change is row-1 minus row+1
        let dz_dy = if self.rows < 2 {
            0.0
        } else {
            let (r0, r1) = (row.saturating_sub(1), (row + 1).min(self.rows - 1));
            (self.at(r0, col) - self.at(r1, col)) / ((r1 - r0) as f64 * dy_m)
        };
        (dz_dx, dz_dy)
    }

    /// Reduce the grid to summary statistics.
    pub fn summarize(&self, provenance: Provenance) -> TerrainMetrics {
        let values = &self.elevations;
        let (center_lat, _) = self.bounds.center();
        let dy_m = self.step_deg * METERS_PER_DEGREE;
        let dx_m = self.step_deg * meters_per_degree_lon(center_lat);

        let mut slopes = Vec::with_capacity(values.len());
        let mut aspects = AspectDistribution::default();
        for row in 0..self.rows {
            for col in 0..self.cols {
                let (gx, gy) = self.gradient(row, col, dx_m, dy_m);
                let slope = gx.hypot(gy).atan().to_degrees();
                slopes.push(slope);
                if slope < FLAT_SLOPE_DEG {
                    aspects.flat += 1.0;
                } else {
                    // Downslope direction as a compass bearing
                    let aspect = (-gx).atan2(-gy).to_degrees().rem_euclid(360.0);
                    *aspects.sector_mut(aspect) += 1.0;
                }
            }
        }
        let total = values.len().max(1) as f64;
        for share in [
            &mut aspects.north,
            &mut aspects.north_east,
            &mut aspects.east,
            &mut aspects.south_east,
            &mut aspects.south,
            &mut aspects.south_west,
            &mut aspects.west,
            &mut aspects.north_west,
            &mut aspects.flat,
        ] {
            *share /= total;
        }

        let mut data = Data::new(values.clone());
        let percentiles = ElevationPercentiles {
            p5: data.percentile(5),
            p25: data.percentile(25),
            p50: data.percentile(50),
            p75: data.percentile(75),
            p95: data.percentile(95),
        };

        let variance = if values.len() > 1 { values.iter().population_variance() } else { 0.0 };

        TerrainMetrics {
            bounds: self.bounds,
            resolution_arcsec: self.step_deg * 3600.0,
            rows: self.rows,
            cols: self.cols,
            mean_elevation: values.iter().mean(),
            min_elevation: Statistics::min(values.iter()),
            max_elevation: Statistics::max(values.iter()),
            elevation_variance: variance,
            ruggedness_index: variance.sqrt(),
            average_slope: slopes.iter().mean(),
            max_slope: Statistics::max(slopes.iter()),
            aspect_distribution: aspects,
            percentiles,
            provenance,
        }
    }
}
