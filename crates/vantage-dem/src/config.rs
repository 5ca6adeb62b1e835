//! Pipeline configuration.

use std::time::Duration;

/// Settings for a [`TerrainPipeline`](crate::TerrainPipeline).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Byte budget of the tile cache.
    pub max_cache_bytes: usize,
    /// Seconds a cached tile stays valid.
    pub cache_ttl_secs: u64,
    /// Minimum seconds between opportunistic TTL sweeps.
    pub sweep_interval_secs: u64,
    /// Tiles scoring below this are rejected.
    pub quality_threshold: f64,
    /// Valid-cell standard deviation (meters) under which a tile counts as flat.
    pub flat_stdev_threshold_m: f64,
    /// Raw value marking a void cell.
    pub void_sentinel: f32,
    /// Fail with `AllSourcesFailed` instead of generating synthetic terrain.
    pub strict: bool,
    /// Grid spacing of synthetic fallback tiles.
    pub synthetic_resolution_arcsec: f64,
    /// Seed of the synthetic generator.
    pub synthetic_seed: u64,
    /// Upper bound on the sample grid of a terrain-metrics request.
    pub max_metric_samples: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_cache_bytes: 256 * 1024 * 1024,
            cache_ttl_secs: 3600,
            sweep_interval_secs: 300,
            quality_threshold: 0.6,
            flat_stdev_threshold_m: 0.5,
            void_sentinel: -32768.0,
            strict: false,
            synthetic_resolution_arcsec: 30.0,
            synthetic_seed: 0x5EED,
            max_metric_samples: 10_000,
        }
    }
}

impl PipelineConfig {
    /// Tile time-to-live.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Interval between opportunistic sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Set the byte budget.
    pub fn with_max_cache_bytes(mut self, bytes: usize) -> Self {
        self.max_cache_bytes = bytes;
        self
    }

    /// Set the tile time-to-live.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    /// Enable or disable strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the quality threshold.
    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    /// Set the synthetic generator seed.
    pub fn with_synthetic_seed(mut self, seed: u64) -> Self {
        self.synthetic_seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.quality_threshold, 0.6);
        assert!(!config.strict);

        let strict = config.with_strict(true).with_max_cache_bytes(1024);
        assert!(strict.strict);
        assert_eq!(strict.max_cache_bytes, 1024);
    }
}
