//! Metric declarations for the vantage terrain toolkit.
//!
//! Every counter, gauge, and histogram emitted by the pipeline, viewshed, and
//! optimizer crates is declared here as a [`Metric`] constant so names, units,
//! and label keys live in one place. The crate re-exports `metrics` so callers
//! can record against the declarations without a direct dependency.
//!
//! # Example
//!
//! ```rust
//! use vantage_metrics::{metric_defs, Metric, MetricKind};
//!
//! assert_eq!(metric_defs::CACHE_HITS.kind, MetricKind::Counter);
//! metrics::counter!(metric_defs::CACHE_HITS.name).increment(1);
//!
//! const LOCAL: Metric = Metric::gauge("vantage.local.gauge").with_description("scratch");
//! assert_eq!(LOCAL.description, "scratch");
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// Which `metrics` macro family a declaration records through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name, kind, and metadata of one emitted metric.
///
/// Every builder method is `const`, so declarations below are plain `const` items.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Dotted name under the `vantage.` prefix.
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys callers attach when recording.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn declare(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self::declare(name, MetricKind::Counter)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::declare(name, MetricKind::Gauge)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::declare(name, MetricKind::Histogram)
    }

    pub const fn with_description(self, description: &'static str) -> Self {
        Self { description, ..self }
    }

    pub const fn with_unit(self, unit: Unit) -> Self {
        Self { unit: Some(unit), ..self }
    }

    pub const fn with_labels(self, labels: &'static [&'static str]) -> Self {
        Self { labels, ..self }
    }

    /// Hand the description and unit to whatever recorder is installed.
    pub fn describe(&self) {
        let (name, text) = (self.name, self.description);
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(name, unit, text),
            (MetricKind::Counter, None) => describe_counter!(name, text),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(name, unit, text),
            (MetricKind::Gauge, None) => describe_gauge!(name, text),
            (MetricKind::Histogram, Some(unit)) => describe_histogram!(name, unit, text),
            (MetricKind::Histogram, None) => describe_histogram!(name, text),
        }
    }
}

/// Declarations for every metric the workspace records.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Label keys attached to per-source metrics.
    pub const SOURCE_LABELS: &[&str] = &["source"];

    /// Label keys attached to source failure metrics.
    pub const SOURCE_FAILURE_LABELS: &[&str] = &["source", "reason"];

    /// Label keys attached to optimizer metrics.
    pub const STRATEGY_LABELS: &[&str] = &["strategy"];

    // tile cache

    /// Tile lookups served from the cache.
    pub const CACHE_HITS: Metric = Metric::counter("vantage.cache.hits")
        .with_description("Tile lookups served from the in-memory cache")
        .with_unit(Unit::Count);

    /// Tile lookups that required a source fetch.
    pub const CACHE_MISSES: Metric = Metric::counter("vantage.cache.misses")
        .with_description("Tile lookups that missed the in-memory cache")
        .with_unit(Unit::Count);

    /// Tiles evicted to stay within the byte budget.
    pub const CACHE_EVICTIONS: Metric = Metric::counter("vantage.cache.evictions")
        .with_description("Tiles evicted to keep the cache within its byte budget")
        .with_unit(Unit::Count);

    /// Tiles dropped because their TTL elapsed.
    pub const CACHE_EXPIRATIONS: Metric = Metric::counter("vantage.cache.expirations")
        .with_description("Tiles dropped after their time-to-live elapsed")
        .with_unit(Unit::Count);

    /// Bytes currently held by the cache.
    pub const CACHE_BYTES: Metric = Metric::gauge("vantage.cache.bytes")
        .with_description("Bytes of tile data currently cached")
        .with_unit(Unit::Bytes);

    // elevation sources

    /// Fetch attempts per source.
    ///
    /// Labels: source
    pub const SOURCE_FETCHES: Metric = Metric::counter("vantage.source.fetches")
        .with_description("Tile fetch attempts issued to an elevation source")
        .with_unit(Unit::Count)
        .with_labels(SOURCE_LABELS);

    /// Failed fetches per source, by reason
    /// (`unavailable`, `rate_limited`, `validation`).
    ///
    /// Labels: source, reason
    pub const SOURCE_FAILURES: Metric = Metric::counter("vantage.source.failures")
        .with_description("Tile fetches that fell through to the next source")
        .with_unit(Unit::Count)
        .with_labels(SOURCE_FAILURE_LABELS);

    /// Quality score of accepted tiles.
    ///
    /// Labels: source
    pub const TILE_QUALITY: Metric = Metric::histogram("vantage.source.tile_quality")
        .with_description("Quality score (0-1) of validated tiles")
        .with_labels(SOURCE_LABELS);

    /// Tiles served by the synthetic generator after every source failed.
    pub const SYNTHETIC_FALLBACKS: Metric = Metric::counter("vantage.source.synthetic_fallbacks")
        .with_description("Tiles generated synthetically after all sources failed")
        .with_unit(Unit::Count);

    // analysis

    /// Wall-clock time of a viewshed computation.
    pub const VIEWSHED_DURATION: Metric = Metric::histogram("vantage.viewshed.duration_ms")
        .with_description("Wall-clock time to compute a viewshed in milliseconds")
        .with_unit(Unit::Milliseconds);

    /// Candidate sites evaluated by the optimizer.
    ///
    /// Labels: strategy (`genetic`, `annealing`, `greedy`, `hexgrid`)
    pub const OPTIMIZER_EVALUATIONS: Metric = Metric::counter("vantage.optimizer.evaluations")
        .with_description("Candidate sites evaluated against the siting objectives")
        .with_unit(Unit::Count)
        .with_labels(STRATEGY_LABELS);

    /// Every declaration above, for bulk registration.
    pub const ALL: &[&Metric] = &[
        &CACHE_HITS,
        &CACHE_MISSES,
        &CACHE_EVICTIONS,
        &CACHE_EXPIRATIONS,
        &CACHE_BYTES,
        &SOURCE_FETCHES,
        &SOURCE_FAILURES,
        &TILE_QUALITY,
        &SYNTHETIC_FALLBACKS,
        &VIEWSHED_DURATION,
        &OPTIMIZER_EVALUATIONS,
    ];
}

/// Register descriptions for every declared metric.
///
/// A no-op until a recorder is installed, so install one first.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::CACHE_HITS.name, "vantage.cache.hits");
        assert_eq!(metric_defs::CACHE_HITS.kind, MetricKind::Counter);
        assert_eq!(metric_defs::CACHE_BYTES.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::CACHE_BYTES.unit, Some(Unit::Bytes));
        assert_eq!(metric_defs::TILE_QUALITY.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::SOURCE_FAILURES.labels, &["source", "reason"]);
    }

    #[test]
    fn test_all_metrics_unique() {
        let mut names: Vec<&str> = metric_defs::ALL.iter().map(|m| m.name).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 11);
    }

    #[test]
    fn test_bare_declaration_has_no_metadata() {
        const BARE: Metric = Metric::histogram("vantage.test.bare");

        assert_eq!(BARE.kind, MetricKind::Histogram);
        assert!(BARE.description.is_empty());
        assert!(BARE.unit.is_none());
        assert!(BARE.labels.is_empty());
    }

    #[test]
    fn test_describe_without_recorder() {
        // No recorder installed: describing must be a no-op.
        describe_metrics();
        assert_eq!(MetricKind::Histogram.to_string(), "histogram");
    }
}
