use crate::metrics::Metrics;
use crate::signal::Shutdown;
use crate::store::ShardedStore;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;

/// Spawns one expiration sweeper per shard.
///
/// Each thread waits out the tick interval on the shutdown signal, so
/// `close()` interrupts the wait instead of sleeping through it. Ticks for
/// one shard never overlap because each shard has exactly one sweeper.
pub(crate) fn spawn_sweepers<V>(
  store: &Arc<ShardedStore<V>>,
  metrics: &Arc<Metrics>,
  interval: Duration,
  shutdown: &Shutdown,
) -> Vec<JoinHandle<()>>
where
  V: Send + 'static,
{
  (0..store.shard_count())
    .map(|index| {
      let store = Arc::clone(store);
      let metrics = Arc::clone(metrics);
      let shutdown = shutdown.clone();
      thread::spawn(move || run(store, metrics, index, interval, shutdown))
    })
    .collect()
}

fn run<V: Send>(
  store: Arc<ShardedStore<V>>,
  metrics: Arc<Metrics>,
  index: usize,
  interval: Duration,
  shutdown: Shutdown,
) {
  loop {
    if shutdown.wait_timeout(interval) {
      return;
    }
    let swept = store.shard(index).state.lock().sweep_expired(Instant::now());
    if swept > 0 {
      metrics.swept_expired.fetch_add(swept as u64, Ordering::Relaxed);
      debug!("sweeper removed {swept} expired entries from shard {index}");
    }
  }
}
