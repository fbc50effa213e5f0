//! Hit/miss statistics
//!
//! The cache reports one hit or miss per lookup that reached an entry to an
//! optional [`StatsRecorder`]. Recording never affects cache behaviour.

use metrics::Counter;
use revcache_common::StatsConfig;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sink for cache hit/miss counts
pub trait StatsRecorder: Send + Sync {
    fn record_hit(&self);
    fn record_miss(&self);
}

/// In-process hit/miss counters
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: AtomicU64,
    /// Number of cache misses
    pub misses: AtomicU64,
}

impl CacheStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Current hit count
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Current miss count
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits() as f64;
        let misses = self.misses() as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl StatsRecorder for CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

/// Forwards hits and misses to the `metrics` facade
///
/// Counters are registered with whichever recorder is installed when the
/// value is constructed.
pub struct MetricsStatsRecorder {
    hits: Counter,
    misses: Counter,
}

impl MetricsStatsRecorder {
    /// Register counters under the given names
    pub fn new(hits_counter: impl Into<String>, misses_counter: impl Into<String>) -> Self {
        let hits: String = hits_counter.into();
        let misses: String = misses_counter.into();
        Self {
            hits: metrics::counter!(hits),
            misses: metrics::counter!(misses),
        }
    }

    /// Register counters using the names from the stats configuration
    pub fn from_config(config: &StatsConfig) -> Self {
        Self::new(config.hits_counter.clone(), config.misses_counter.clone())
    }
}

impl StatsRecorder for MetricsStatsRecorder {
    fn record_hit(&self) {
        self.hits.increment(1);
    }

    fn record_miss(&self) {
        self.misses.increment(1);
    }
}
