use crate::error::{BoxError, CacheError};
use crate::flight::SingleFlight;
use crate::invalidation::{InvalidationBridge, CLEAR_ALL};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::options::{ClearOptions, DeleteOptions, SetOptions};
use crate::signal::Shutdown;
use crate::store::ShardedStore;
use crate::LoaderResult;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use log::{info, warn};
use parking_lot::Mutex;

/// The shared core behind every `Cache` handle: the shards, the
/// single-flight table, the optional bridge, and the background tasks.
pub(crate) struct CacheCore<V> {
  pub(crate) store: Arc<ShardedStore<V>>,
  pub(crate) metrics: Arc<Metrics>,
  pub(crate) flight: SingleFlight<V>,
  pub(crate) bridge: Option<Arc<dyn InvalidationBridge>>,
  pub(crate) shutdown: Shutdown,
  pub(crate) tasks: Mutex<Vec<JoinHandle<()>>>,
  pub(crate) closed: AtomicBool,
}

impl<V> Drop for CacheCore<V> {
  fn drop(&mut self) {
    self.shutdown.cancel();
    if !self.closed.swap(true, Ordering::SeqCst) {
      if let Some(bridge) = &self.bridge {
        if let Err(err) = bridge.close() {
          warn!("failed to close invalidation bridge: {err}");
        }
      }
    }
    for task in self.tasks.get_mut().drain(..) {
      let _ = task.join();
    }
  }
}

/// A sharded, in-process cache with per-entry TTL, LRU eviction,
/// single-flight loads, and optional cross-instance invalidation.
///
/// Handles are cheap to clone; every clone operates on the same shards.
/// All operations are safe to call from any thread.
pub struct Cache<V> {
  pub(crate) core: Arc<CacheCore<V>>,
}

impl<V> Clone for Cache<V> {
  fn clone(&self) -> Self {
    Self {
      core: Arc::clone(&self.core),
    }
  }
}

impl<V> Cache<V>
where
  V: Clone + Send + 'static,
{
  /// Shorthand for [`CacheBuilder::new`](crate::CacheBuilder::new).
  pub fn builder() -> crate::CacheBuilder<V> {
    crate::CacheBuilder::new()
  }

  /// Looks up `key`, promoting the entry on hit. An entry observed past
  /// its expiry is removed and reported as [`CacheError::KeyNotFound`].
  pub fn get(&self, key: &str) -> Result<V, CacheError> {
    let shard = self.core.store.shard_for(key);
    let value = shard.state.lock().get(key, Instant::now());
    match value {
      Some(value) => {
        self.core.metrics.hits.fetch_add(1, Ordering::Relaxed);
        Ok(value)
      }
      None => {
        self.core.metrics.misses.fetch_add(1, Ordering::Relaxed);
        Err(CacheError::KeyNotFound(key.to_owned()))
      }
    }
  }

  /// Read-through lookup: probes the shard, and on miss runs `loader`
  /// through the single-flight table so that concurrent misses for the
  /// same key trigger at most one load.
  ///
  /// The loader returns the value plus a TTL hint; a zero hint defers to
  /// the cache's default TTL. After a successful load the shard is probed
  /// again — a concurrent writer may have raced the load, and whatever is
  /// installed by then wins. Loader errors propagate to every coalesced
  /// caller and nothing is installed.
  pub fn get_or_load<F>(&self, key: &str, loader: F) -> Result<V, CacheError>
  where
    F: FnOnce(&str) -> LoaderResult<V>,
  {
    let shard = self.core.store.shard_for(key);

    if let Some(value) = shard.state.lock().get(key, Instant::now()) {
      self.core.metrics.hits.fetch_add(1, Ordering::Relaxed);
      return Ok(value);
    }
    self.core.metrics.misses.fetch_add(1, Ordering::Relaxed);

    let metrics = Arc::clone(&self.core.metrics);
    let (value, ttl) = self.core.flight.execute(key, move || {
      metrics.loads.fetch_add(1, Ordering::Relaxed);
      loader(key)
    })?;

    let mut state = shard.state.lock();
    if let Some(existing) = state.get(key, Instant::now()) {
      return Ok(existing);
    }
    let evicted = state.set(key, value.clone(), &SetOptions::new().ttl(ttl), Instant::now());
    drop(state);
    self.record_evictions(evicted);
    Ok(value)
  }

  /// Stores `key`. Never fails; a requested invalidation is published
  /// after the shard lock is released, and a publish failure only logs a
  /// warning.
  pub fn set(&self, key: &str, value: V, options: SetOptions) {
    let shard = self.core.store.shard_for(key);
    let evicted = shard
      .state
      .lock()
      .set(key, value, &options, Instant::now());
    self.core.metrics.inserts.fetch_add(1, Ordering::Relaxed);
    self.record_evictions(evicted);

    if options.should_publish() {
      self.publish_invalidation(key);
    }
  }

  /// Removes `key` if present. Idempotent.
  pub fn delete(&self, key: &str, options: DeleteOptions) {
    let shard = self.core.store.shard_for(key);
    let removed = shard.state.lock().delete(key);
    if removed {
      self.core.metrics.deletes.fetch_add(1, Ordering::Relaxed);
    }

    if options.should_publish() {
      self.publish_invalidation(key);
    }
  }

  /// Empties every shard, taking one shard lock at a time. Idempotent.
  pub fn clear(&self, options: ClearOptions) {
    for shard in self.core.store.iter_shards() {
      shard.state.lock().clear();
    }

    if options.should_publish() {
      self.publish_invalidation(CLEAR_ALL);
    }
  }

  /// Stops the sweepers and the subscriber, closes the bridge, and joins
  /// the background threads. Idempotent. Operations on a closed cache
  /// keep working against the live shards, but their invalidations are
  /// dropped.
  pub fn close(&self) -> Result<(), BoxError> {
    if self.core.closed.swap(true, Ordering::SeqCst) {
      return Ok(());
    }

    info!("closing cache");
    self.core.shutdown.cancel();

    let result = match &self.core.bridge {
      Some(bridge) => bridge.close(),
      None => Ok(()),
    };

    let tasks = std::mem::take(&mut *self.core.tasks.lock());
    for task in tasks {
      let _ = task.join();
    }

    if let Err(err) = &result {
      warn!("failed to close invalidation bridge: {err}");
    } else {
      info!("cache closed");
    }
    result
  }

  /// A point-in-time snapshot of the internal counters.
  pub fn metrics(&self) -> MetricsSnapshot {
    self.core.metrics.snapshot()
  }

  /// Total number of live entries across all shards. Expired entries that
  /// have not yet been read or swept still count.
  pub fn len(&self) -> usize {
    self.core.store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn record_evictions(&self, evicted: usize) {
    if evicted > 0 {
      self
        .core
        .metrics
        .evicted_by_capacity
        .fetch_add(evicted as u64, Ordering::Relaxed);
    }
  }

  fn publish_invalidation(&self, key: &str) {
    // After close, writes still land locally but publishes are dropped.
    if self.core.shutdown.is_cancelled() {
      return;
    }
    let Some(bridge) = &self.core.bridge else {
      return;
    };
    match bridge.publish(key) {
      Ok(()) => {
        self
          .core
          .metrics
          .invalidations_published
          .fetch_add(1, Ordering::Relaxed);
      }
      Err(err) => warn!("failed to publish invalidation for key {key:?}: {err}"),
    }
  }
}
