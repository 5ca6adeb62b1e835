//! Tile quality scoring.

use crate::tile::TerrainTile;
use statrs::statistics::Statistics;

/// Breakdown of a tile's quality score.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QualityReport {
    /// Fraction of cells that are voids.
    pub void_ratio: f64,
    /// Standard deviation of the valid cells in meters.
    pub stdev_m: f64,
    /// 0 when the tile is suspiciously flat, else 1.
    pub variance_score: f64,
    /// Score for the grid resolution.
    pub resolution_score: f64,
    /// Weighted total in [0, 1].
    pub score: f64,
}

impl QualityReport {
    /// True when the valid cells vary less than the flatness threshold.
    pub fn is_flat(&self) -> bool {
        self.variance_score == 0.0
    }
}

/// Score for a grid spacing in arc-seconds.
pub fn resolution_score(resolution_arcsec: f64) -> f64 {
    if resolution_arcsec <= 3.0 {
        1.0
    } else if resolution_arcsec <= 30.0 {
        0.75
    } else if resolution_arcsec <= 90.0 {
        0.5
    } else {
        0.25
    }
}

/// Score a raw (unfilled) tile.
pub fn assess_tile(tile: &TerrainTile, void_sentinel: f32, flat_stdev_threshold_m: f64) -> QualityReport {
    let total = tile.data().len().max(1);
    let valid: Vec<f64> = tile
        .data()
        .iter()
        .filter(|v| !TerrainTile::is_void(**v, void_sentinel))
        .map(|v| *v as f64)
        .collect();

    let void_ratio = 1.0 - valid.len() as f64 / total as f64;
    let stdev_m = if valid.len() > 1 {
        valid.iter().population_std_dev()
    } else {
        0.0
    };
    let variance_score = if stdev_m < flat_stdev_threshold_m { 0.0 } else { 1.0 };
    let resolution_score = resolution_score(tile.resolution_arcsec());
    let score = 0.5 * (1.0 - void_ratio) + 0.3 * variance_score + 0.2 * resolution_score;

    QualityReport {
        void_ratio,
        stdev_m,
        variance_score,
        resolution_score,
        score: score.clamp(0.0, 1.0),
    }
}
