//! Byte-bounded tile cache with access-count eviction and TTL expiry.
//!
//! The cache itself is single-owner; the pipeline wraps it in a mutex and
//! hands tiles out as `Arc`s so sampling never holds the lock.

use crate::tile::{TerrainTile, TileKey};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vantage_metrics::metric_defs;

/// A cached tile with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The tile.
    pub tile: Arc<TerrainTile>,
    /// When the tile entered the cache.
    pub inserted_at: Instant,
    /// Lookups served by this entry.
    pub access_count: u64,
    /// Bytes charged against the budget.
    pub size_bytes: usize,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) >= ttl
    }
}

/// Counters describing cache behaviour since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that found nothing (or only an expired entry).
    pub misses: u64,
    /// Entries removed to respect the byte budget.
    pub evictions: u64,
    /// Entries removed because their TTL elapsed.
    pub expirations: u64,
    /// Entries currently held.
    pub entries: usize,
    /// Bytes currently held.
    pub bytes: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit (0 when there were none).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Tile cache keyed by degree cell.
#[derive(Debug)]
pub struct TileCache {
    entries: HashMap<TileKey, CacheEntry>,
    max_bytes: usize,
    ttl: Duration,
    total_bytes: usize,
    stats: CacheStats,
}

impl TileCache {
    /// Empty cache holding at most `max_bytes` for `ttl` each.
    pub fn new(max_bytes: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_bytes,
            ttl,
            total_bytes: 0,
            stats: CacheStats::default(),
        }
    }

    /// Look up a tile, counting the access.
    ///
    /// An expired entry is dropped and reported as a miss.
    pub fn get(&mut self, key: &TileKey, now: Instant) -> Option<Arc<TerrainTile>> {
        let expired = match self.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now, self.ttl) => {
                entry.access_count += 1;
                self.stats.hits += 1;
                metrics::counter!(metric_defs::CACHE_HITS.name).increment(1);
                return Some(Arc::clone(&entry.tile));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.remove_expired(key);
        }
        self.stats.misses += 1;
        metrics::counter!(metric_defs::CACHE_MISSES.name).increment(1);
        None
    }

    /// True when a live entry exists, without counting an access.
    pub fn contains(&self, key: &TileKey, now: Instant) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now, self.ttl))
    }

    /// Insert a tile, evicting until it fits.
    ///
    /// Returns false when the tile alone exceeds the budget; such a tile is
    /// not cached.
    pub fn insert(&mut self, key: TileKey, tile: Arc<TerrainTile>, now: Instant) -> bool {
        let size_bytes = tile.size_bytes();
        if size_bytes > self.max_bytes {
            tracing::debug!(%key, size_bytes, max_bytes = self.max_bytes, "Tile exceeds cache budget, not caching");
            return false;
        }

        if let Some(previous) = self.entries.remove(&key) {
            self.total_bytes -= previous.size_bytes;
        }
        while self.total_bytes + size_bytes > self.max_bytes {
            if !self.evict_one() {
                break;
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                tile,
                inserted_at: now,
                access_count: 0,
                size_bytes,
            },
        );
        self.total_bytes += size_bytes;
        self.record_bytes();
        true
    }

    /// Remove the entry with the fewest accesses, oldest first on ties.
    fn evict_one(&mut self) -> bool {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.access_count, entry.inserted_at))
            .map(|(key, _)| *key);
        let Some(victim) = victim else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&victim) {
            self.total_bytes -= entry.size_bytes;
            self.stats.evictions += 1;
            metrics::counter!(metric_defs::CACHE_EVICTIONS.name).increment(1);
            tracing::debug!(key = %victim, access_count = entry.access_count, "Evicted tile");
        }
        true
    }

    fn remove_expired(&mut self, key: &TileKey) {
        if let Some(entry) = self.entries.remove(key) {
            self.total_bytes -= entry.size_bytes;
            self.stats.expirations += 1;
            metrics::counter!(metric_defs::CACHE_EXPIRATIONS.name).increment(1);
            self.record_bytes();
        }
    }

    /// Drop every entry whose TTL has elapsed. Returns the number dropped.
    pub fn sweep_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<TileKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, self.ttl))
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            self.remove_expired(key);
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "Swept expired tiles");
        }
        expired.len()
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
        self.record_bytes();
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            bytes: self.total_bytes,
            ..self.stats
        }
    }

    /// Bytes currently held.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Configured byte budget.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn record_bytes(&self) {
        metrics::gauge!(metric_defs::CACHE_BYTES.name).set(self.total_bytes as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileMetadata;

    fn tile(key: TileKey) -> Arc<TerrainTile> {
        // 900" grid: 5x5 cells = 100 bytes + overhead
        Arc::new(
            TerrainTile::from_fn(key.bounds(), 900.0, TileMetadata::now("test", "1"), |_, _| 1.0).unwrap(),
        )
    }

    fn key(lat: i32) -> TileKey {
        TileKey { lat, lon: 0 }
    }

    #[test]
    fn test_get_after_insert_hits() {
        let now = Instant::now();
        let mut cache = TileCache::new(10_000, Duration::from_secs(60));
        assert!(cache.get(&key(1), now).is_none());
        assert!(cache.insert(key(1), tile(key(1)), now));
        assert!(cache.get(&key(1), now).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.bytes, tile(key(1)).size_bytes());
    }

    #[test]
    fn test_byte_budget_never_exceeded() {
        let size = tile(key(0)).size_bytes();
        let now = Instant::now();
        let mut cache = TileCache::new(size * 3, Duration::from_secs(60));

        for lat in 0..10 {
            cache.insert(key(lat), tile(key(lat)), now + Duration::from_millis(lat as u64));
            assert!(cache.total_bytes() <= cache.max_bytes());
        }
        assert_eq!(cache.stats().entries, 3);
        assert_eq!(cache.stats().evictions, 7);
    }

    #[test]
    fn test_victim_is_least_accessed_then_oldest() {
        let size = tile(key(0)).size_bytes();
        let start = Instant::now();
        let mut cache = TileCache::new(size * 3, Duration::from_secs(60));

        cache.insert(key(1), tile(key(1)), start);
        cache.insert(key(2), tile(key(2)), start + Duration::from_millis(1));
        cache.insert(key(3), tile(key(3)), start + Duration::from_millis(2));
        cache.get(&key(1), start);
        cache.get(&key(3), start);

        // key(2) has no accesses
        cache.insert(key(4), tile(key(4)), start + Duration::from_millis(3));
        assert!(!cache.contains(&key(2), start));

        // Every entry now has one access; the oldest goes
        cache.get(&key(4), start);
        cache.insert(key(5), tile(key(5)), start + Duration::from_millis(4));
        assert!(!cache.contains(&key(1), start));
        assert!(cache.contains(&key(3), start));
        assert!(cache.contains(&key(4), start));
    }

    #[test]
    fn test_ttl_expiry() {
        let start = Instant::now();
        let ttl = Duration::from_secs(10);
        let mut cache = TileCache::new(10_000, ttl);
        cache.insert(key(1), tile(key(1)), start);
        cache.insert(key(2), tile(key(2)), start + Duration::from_secs(5));

        assert!(cache.get(&key(1), start + ttl).is_none());
        assert_eq!(cache.stats().expirations, 1);

        assert_eq!(cache.sweep_expired(start + Duration::from_secs(20)), 1);
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(cache.total_bytes(), 0);
    }

    #[test]
    fn test_oversize_tile_not_cached() {
        let mut cache = TileCache::new(16, Duration::from_secs(60));
        assert!(!cache.insert(key(1), tile(key(1)), Instant::now()));
        assert_eq!(cache.stats().entries, 0);
    }
}
