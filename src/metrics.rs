use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Internal lock-free counters. Padded so hot counters on different cores
/// do not share a cache line.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) deletes: CachePadded<AtomicU64>,
  pub(crate) loads: CachePadded<AtomicU64>,
  pub(crate) evicted_by_capacity: CachePadded<AtomicU64>,
  pub(crate) swept_expired: CachePadded<AtomicU64>,
  pub(crate) invalidations_published: CachePadded<AtomicU64>,
  pub(crate) invalidations_received: CachePadded<AtomicU64>,
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if lookups == 0 {
        0.0
      } else {
        hits as f64 / lookups as f64
      },
      inserts: self.inserts.load(Ordering::Relaxed),
      deletes: self.deletes.load(Ordering::Relaxed),
      loads: self.loads.load(Ordering::Relaxed),
      evicted_by_capacity: self.evicted_by_capacity.load(Ordering::Relaxed),
      swept_expired: self.swept_expired.load(Ordering::Relaxed),
      invalidations_published: self.invalidations_published.load(Ordering::Relaxed),
      invalidations_received: self.invalidations_received.load(Ordering::Relaxed),
    }
  }
}

/// A point-in-time view of the cache's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
  /// Successful lookups, including probe hits inside `get_or_load`.
  pub hits: u64,
  /// Failed lookups.
  pub misses: u64,
  /// `hits / (hits + misses)`, zero when nothing was looked up yet.
  pub hit_ratio: f64,
  /// Writes through `set` (insert or in-place update).
  pub inserts: u64,
  /// Deletes that actually removed an entry.
  pub deletes: u64,
  /// Loader invocations performed on behalf of `get_or_load`.
  pub loads: u64,
  /// Entries dropped to make room for a new insert.
  pub evicted_by_capacity: u64,
  /// Expired entries removed by the background sweepers.
  pub swept_expired: u64,
  /// Invalidations successfully handed to the bridge.
  pub invalidations_published: u64,
  /// Invalidations received from the bridge and applied locally.
  pub invalidations_received: u64,
}
