use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// Lock-free counters kept by every cache store.
#[derive(Debug)]
pub struct Metrics {
  // --- Lookups ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Writes ---
  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) updates: CachePadded<AtomicU64>,
  pub(crate) invalidations: CachePadded<AtomicU64>,

  // --- Evictions ---
  pub(crate) evicted_by_capacity: CachePadded<AtomicU64>,
  pub(crate) evicted_by_ttl: CachePadded<AtomicU64>,

  // --- Wrapped function runs ---
  pub(crate) computations: CachePadded<AtomicU64>,
  pub(crate) failed_computations: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      updates: CachePadded::new(AtomicU64::new(0)),
      invalidations: CachePadded::new(AtomicU64::new(0)),
      evicted_by_capacity: CachePadded::new(AtomicU64::new(0)),
      evicted_by_ttl: CachePadded::new(AtomicU64::new(0)),
      computations: CachePadded::new(AtomicU64::new(0)),
      failed_computations: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn record(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot. `current_size` is supplied by the
  /// store, which knows it exactly.
  pub(crate) fn snapshot(&self, current_size: usize) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      inserts: self.inserts.load(Ordering::Relaxed),
      updates: self.updates.load(Ordering::Relaxed),
      invalidations: self.invalidations.load(Ordering::Relaxed),
      evicted_by_capacity: self.evicted_by_capacity.load(Ordering::Relaxed),
      evicted_by_ttl: self.evicted_by_ttl.load(Ordering::Relaxed),
      computations: self.computations.load(Ordering::Relaxed),
      failed_computations: self.failed_computations.load(Ordering::Relaxed),
      current_size,
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time snapshot of one store's metrics.
#[derive(Clone, PartialEq, Default)]
pub struct MetricsSnapshot {
  /// Calls answered from the cache.
  pub hits: u64,
  /// Calls that found no entry.
  pub misses: u64,
  /// hits / (hits + misses).
  pub hit_ratio: f64,
  /// New keys written.
  pub inserts: u64,
  /// Existing keys overwritten.
  pub updates: u64,
  /// Entries dropped by `clear`.
  pub invalidations: u64,
  pub evicted_by_capacity: u64,
  pub evicted_by_ttl: u64,
  /// Times the wrapped function ran.
  pub computations: u64,
  /// Runs that returned an error or panicked.
  pub failed_computations: u64,
  /// Entries in the store when the snapshot was taken.
  pub current_size: usize,
  /// Seconds since the store was created.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("inserts", &self.inserts)
      .field("updates", &self.updates)
      .field("invalidations", &self.invalidations)
      .field("evicted_by_capacity", &self.evicted_by_capacity)
      .field("evicted_by_ttl", &self.evicted_by_ttl)
      .field("computations", &self.computations)
      .field("failed_computations", &self.failed_computations)
      .field("current_size", &self.current_size)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_hit_ratio() {
    let metrics = Metrics::new();
    assert_eq!(metrics.snapshot(0).hit_ratio, 0.0);

    Metrics::record(&metrics.hits, 3);
    Metrics::record(&metrics.misses, 1);
    let snapshot = metrics.snapshot(2);
    assert_eq!(snapshot.hit_ratio, 0.75);
    assert_eq!(snapshot.current_size, 2);
    assert!(format!("{snapshot:?}").contains("75.00%"));
  }
}
