//! Cache Statistics
//!
//! Per-node counters for tier hits, fallbacks and warm-up work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for one cache node
#[derive(Debug, Default)]
pub struct CacheMetrics {
    // Memory tier
    memory_hits: AtomicU64,
    memory_misses: AtomicU64,
    evictions: AtomicU64,

    // Disk tier
    disk_hits: AtomicU64,
    disk_misses: AtomicU64,
    disk_writes: AtomicU64,

    // Disk -> memory population
    backfills: AtomicU64,
    hydrated: AtomicU64,
    pruned: AtomicU64,

    // Lookups no tier could answer
    misses: AtomicU64,

    // Microseconds, exponential moving average
    disk_read_latency_us: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_memory_miss(&self) {
        self.memory_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_miss(&self) {
        self.disk_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A lookup that missed every configured tier
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_write(&self) {
        self.disk_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backfill(&self) {
        self.backfills.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hydrated(&self) {
        self.hydrated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pruned(&self) {
        self.pruned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_read_latency(&self, duration: Duration) {
        let new_us = duration.as_micros() as u64;
        let alpha = 0.1;

        // fetch_update retries on contention
        let _ = self
            .disk_read_latency_us
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(if current == 0 {
                    new_us
                } else {
                    ((1.0 - alpha) * current as f64 + alpha * new_us as f64) as u64
                })
            });
    }

    pub fn memory_hits(&self) -> u64 {
        self.memory_hits.load(Ordering::Relaxed)
    }

    pub fn memory_misses(&self) -> u64 {
        self.memory_misses.load(Ordering::Relaxed)
    }

    pub fn disk_hits(&self) -> u64 {
        self.disk_hits.load(Ordering::Relaxed)
    }

    pub fn disk_misses(&self) -> u64 {
        self.disk_misses.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn disk_read_latency(&self) -> Duration {
        Duration::from_micros(self.disk_read_latency_us.load(Ordering::Relaxed))
    }

    pub fn memory_hit_ratio(&self) -> f64 {
        ratio(self.memory_hits(), self.memory_misses())
    }

    pub fn disk_hit_ratio(&self) -> f64 {
        ratio(self.disk_hits(), self.disk_misses())
    }

    /// Hits at any tier over all lookups; a miss counts once, at the last tier
    pub fn overall_hit_ratio(&self) -> f64 {
        ratio(self.memory_hits() + self.disk_hits(), self.misses())
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            memory_hits: self.memory_hits(),
            memory_misses: self.memory_misses(),
            evictions: self.evictions.load(Ordering::Relaxed),
            memory_hit_ratio: self.memory_hit_ratio(),

            disk_hits: self.disk_hits(),
            disk_misses: self.disk_misses(),
            disk_writes: self.disk_writes.load(Ordering::Relaxed),
            disk_hit_ratio: self.disk_hit_ratio(),
            disk_read_latency: self.disk_read_latency(),

            backfills: self.backfills.load(Ordering::Relaxed),
            hydrated: self.hydrated.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),

            misses: self.misses(),
            overall_hit_ratio: self.overall_hit_ratio(),
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        for counter in [
            &self.memory_hits,
            &self.memory_misses,
            &self.evictions,
            &self.disk_hits,
            &self.disk_misses,
            &self.disk_writes,
            &self.backfills,
            &self.hydrated,
            &self.pruned,
            &self.misses,
            &self.disk_read_latency_us,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

fn ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Point-in-time copy of [`CacheMetrics`]
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub evictions: u64,
    pub memory_hit_ratio: f64,

    pub disk_hits: u64,
    pub disk_misses: u64,
    pub disk_writes: u64,
    pub disk_hit_ratio: f64,
    pub disk_read_latency: Duration,

    pub backfills: u64,
    pub hydrated: u64,
    pub pruned: u64,

    pub misses: u64,
    pub overall_hit_ratio: f64,
}

/// Latency tracker helper
pub struct LatencyTracker {
    start: Instant,
}

impl LatencyTracker {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_tracking() {
        let metrics = CacheMetrics::new();

        metrics.record_memory_hit();
        metrics.record_memory_hit();
        metrics.record_memory_miss();

        assert_eq!(metrics.memory_hits(), 2);
        assert_eq!(metrics.memory_misses(), 1);
        assert!((metrics.memory_hit_ratio() - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_overall_hit_ratio() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.overall_hit_ratio(), 0.0);

        metrics.record_memory_hit();
        metrics.record_memory_miss();
        metrics.record_disk_hit();
        metrics.record_memory_miss();
        metrics.record_disk_miss();
        metrics.record_miss();

        // 2 hits out of 3 lookups
        assert!((metrics.overall_hit_ratio() - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_memory_only_misses_lower_overall_ratio() {
        let metrics = CacheMetrics::new();

        metrics.record_memory_hit();
        metrics.record_memory_miss();
        metrics.record_miss();

        assert_eq!(metrics.disk_misses(), 0);
        assert_eq!(metrics.overall_hit_ratio(), 0.5);
    }

    #[test]
    fn test_latency_ema() {
        let metrics = CacheMetrics::new();

        metrics.record_disk_read_latency(Duration::from_micros(100));
        assert_eq!(metrics.disk_read_latency(), Duration::from_micros(100));

        metrics.record_disk_read_latency(Duration::from_micros(200));
        let latency = metrics.disk_read_latency().as_micros();
        assert!(latency > 100 && latency < 200);
    }

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = CacheMetrics::new();
        metrics.record_backfill();
        metrics.record_hydrated();
        metrics.record_hydrated();
        metrics.record_pruned();
        metrics.record_evictions(3);
        metrics.record_disk_write();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.backfills, 1);
        assert_eq!(snapshot.hydrated, 2);
        assert_eq!(snapshot.pruned, 1);
        assert_eq!(snapshot.evictions, 3);
        assert_eq!(snapshot.disk_writes, 1);

        metrics.record_miss();
        assert_eq!(metrics.snapshot().misses, 1);

        metrics.reset();
        assert_eq!(metrics.snapshot().misses, 0);
        assert_eq!(metrics.snapshot().hydrated, 0);
        assert_eq!(metrics.snapshot().evictions, 0);
    }
}
