//! Deterministic fallback terrain.
//!
//! Used when every configured source fails. Output depends only on the seed
//! and the tile key, never on call order, so repeated runs agree.

use crate::source::ElevationSource;
use crate::tile::{TerrainTile, TileBounds, TileKey, TileMetadata};
use crate::types::SYNTHETIC_SOURCE;
use crate::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Generator of smooth rolling terrain with light per-tile roughness.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    seed: u64,
    resolution_arcsec: f64,
}

/// Amplitude of the per-cell noise in meters.
const NOISE_AMPLITUDE_M: f64 = 4.0;

impl SyntheticSource {
    /// Generator with a seed and grid resolution.
    pub fn new(seed: u64, resolution_arcsec: f64) -> Self {
        Self {
            seed,
            resolution_arcsec,
        }
    }

    /// Noise-free base surface; continuous across tile edges.
    pub fn base_elevation(&self, lat: f64, lon: f64) -> f64 {
        let phase = (self.seed % 1000) as f64 * 0.001 * std::f64::consts::TAU;
        let broad = 400.0 * (lat.to_radians() * 40.0 + phase).sin() * (lon.to_radians() * 35.0).cos();
        let ridges = 150.0 * (lat.to_radians() * 160.0).cos() * (lon.to_radians() * 140.0 + phase).sin();
        (600.0 + broad + ridges).max(0.0)
    }

    fn tile_rng(&self, key: TileKey) -> ChaCha8Rng {
        let lat = (key.lat as i64 + 90) as u64;
        let lon = (key.lon as i64 + 180) as u64;
        let mixed = self
            .seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(lat << 32 | lon);
        ChaCha8Rng::seed_from_u64(mixed)
    }

    /// Generate the tile covering a cell.
    pub fn generate(&self, key: TileKey) -> Result<TerrainTile> {
        let mut rng = self.tile_rng(key);
        TerrainTile::from_fn(
            key.bounds(),
            self.resolution_arcsec,
            TileMetadata::now(SYNTHETIC_SOURCE, format!("seed-{}", self.seed)),
            |lat, lon| {
                let noise = rng.gen_range(-NOISE_AMPLITUDE_M..=NOISE_AMPLITUDE_M);
                (self.base_elevation(lat, lon) + noise) as f32
            },
        )
    }
}

impl ElevationSource for SyntheticSource {
    fn name(&self) -> &str {
        SYNTHETIC_SOURCE
    }

    fn coverage(&self) -> TileBounds {
        TileBounds::world()
    }

    fn fetch(&self, lat: f64, lon: f64) -> Result<TerrainTile> {
        self.generate(TileKey::from_coord(lat, lon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::is_plausible_elevation;

    #[test]
    fn test_synthetic_is_deterministic() {
        let source = SyntheticSource::new(7, 300.0);
        let a = source.fetch(12.3, 45.6).unwrap();
        let b = source.fetch(12.9, 45.1).unwrap();
        assert_eq!(a.data(), b.data());
        assert_eq!(a.source(), SYNTHETIC_SOURCE);

        let other = SyntheticSource::new(8, 300.0).fetch(12.3, 45.6).unwrap();
        assert_ne!(a.data(), other.data());
    }

    #[test]
    fn test_synthetic_values_plausible() {
        let source = SyntheticSource::new(42, 600.0);
        for (lat, lon) in [(0.0, 0.0), (89.5, 179.5), (-60.2, -120.7), (27.9, 86.9)] {
            let tile = source.fetch(lat, lon).unwrap();
            assert!(tile.data().iter().all(|v| is_plausible_elevation(*v as f64)));
        }
    }
}
