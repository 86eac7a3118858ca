use crate::invalidation::{InvalidationBridge, InvalidationHandler};
use crate::metrics::Metrics;
use crate::signal::Shutdown;
use crate::store::ShardedStore;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info};

/// Spawns the single subscriber task for a bridge-enabled cache.
///
/// Received keys become local mutations: the empty key clears every shard,
/// anything else deletes one key. The mutations are applied directly on
/// the store so nothing is republished back onto the bridge.
pub(crate) fn spawn<V>(
  store: Arc<ShardedStore<V>>,
  metrics: Arc<Metrics>,
  bridge: Arc<dyn InvalidationBridge>,
  shutdown: Shutdown,
) -> JoinHandle<()>
where
  V: Send + 'static,
{
  thread::spawn(move || {
    debug!("starting invalidation subscription");
    let handler: InvalidationHandler = Box::new(move |key: &str| {
      debug!("received invalidation for key {key:?}");
      store.apply_invalidation(key);
      metrics
        .invalidations_received
        .fetch_add(1, Ordering::Relaxed);
    });
    match bridge.subscribe(shutdown, handler) {
      Ok(()) => debug!("invalidation subscription ended"),
      Err(err) => info!("invalidation subscription ended: {err}"),
    }
  })
}
