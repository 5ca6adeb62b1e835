//! Value types returned to pipeline consumers.

use std::collections::BTreeSet;

/// Source tag carried by every value derived from generated fallback terrain.
pub const SYNTHETIC_SOURCE: &str = "synthetic";

/// A single elevation sample.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TerrainPoint {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Elevation in meters above sea level.
    pub elevation: f64,
    /// Horizontal accuracy in meters (half a grid cell), when known.
    pub accuracy: Option<f64>,
    /// Name of the source whose tile produced the sample.
    pub source: String,
}

impl TerrainPoint {
    /// True when the sample came from generated fallback terrain.
    pub fn is_synthetic(&self) -> bool {
        self.source == SYNTHETIC_SOURCE
    }
}

/// Data-provenance summary for a derived computation.
///
/// Records which sources contributed samples and how many were synthetic, so
/// siting decisions can discount results built on fallback terrain.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Provenance {
    /// Distinct source names that contributed samples.
    pub sources: BTreeSet<String>,
    /// Total samples recorded.
    pub samples: usize,
    /// Samples that came from the synthetic generator.
    pub synthetic_samples: usize,
}

impl Provenance {
    /// Provenance of a single point.
    pub fn from_point(point: &TerrainPoint) -> Self {
        let mut provenance = Self::default();
        provenance.record(&point.source);
        provenance
    }

    /// Record one sample from `source`.
    pub fn record(&mut self, source: &str) {
        self.samples += 1;
        if source == SYNTHETIC_SOURCE {
            self.synthetic_samples += 1;
        }
        if !self.sources.contains(source) {
            self.sources.insert(source.to_string());
        }
    }

    /// Fold another provenance record into this one.
    pub fn merge(&mut self, other: &Provenance) {
        self.samples += other.samples;
        self.synthetic_samples += other.synthetic_samples;
        self.sources.extend(other.sources.iter().cloned());
    }

    /// Fraction of samples that were synthetic (0 when nothing was sampled).
    pub fn synthetic_fraction(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.synthetic_samples as f64 / self.samples as f64
        }
    }

    /// True when any synthetic data contributed.
    pub fn is_degraded(&self) -> bool {
        self.synthetic_samples > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(source: &str) -> TerrainPoint {
        TerrainPoint {
            latitude: 1.0,
            longitude: 2.0,
            elevation: 3.0,
            accuracy: None,
            source: source.to_string(),
        }
    }

    #[test]
    fn test_provenance_tracks_synthetic_share() {
        let mut provenance = Provenance::default();
        provenance.record("srtm");
        provenance.record("srtm");
        provenance.record(SYNTHETIC_SOURCE);
        provenance.record("lidar");

        assert_eq!(provenance.samples, 4);
        assert_eq!(provenance.sources.len(), 3);
        assert!((provenance.synthetic_fraction() - 0.25).abs() < 1e-12);
        assert!(provenance.is_degraded());
    }

    #[test]
    fn test_provenance_merge() {
        let mut a = Provenance::from_point(&point("srtm"));
        let b = Provenance::from_point(&point(SYNTHETIC_SOURCE));
        a.merge(&b);
        assert_eq!(a.samples, 2);
        assert_eq!(a.synthetic_samples, 1);
        assert!(Provenance::default().synthetic_fraction() == 0.0);
    }

    #[test]
    fn test_point_is_synthetic() {
        assert!(point(SYNTHETIC_SOURCE).is_synthetic());
        assert!(!point("srtm").is_synthetic());
    }
}
