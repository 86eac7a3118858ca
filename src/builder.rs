use crate::cache::{Cache, CacheCore};
use crate::config::{
  CacheConfig, DEFAULT_CAPACITY, DEFAULT_SHARD_COUNT, DEFAULT_SWEEPER_INTERVAL,
};
use crate::error::ConfigError;
use crate::flight::SingleFlight;
use crate::invalidation::{self, InvalidationBridge};
use crate::metrics::Metrics;
use crate::signal::Shutdown;
use crate::store::ShardedStore;
use crate::task::{subscriber, sweeper};

use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use parking_lot::Mutex;

/// Builder for [`Cache`] instances.
///
/// ```
/// use shoal::CacheBuilder;
/// use std::time::Duration;
///
/// let cache: shoal::Cache<String> = CacheBuilder::new()
///   .shard_count(4)
///   .capacity(10_000)
///   .default_ttl(Duration::from_secs(300))
///   .build()
///   .unwrap();
/// # cache.close().unwrap();
/// ```
pub struct CacheBuilder<V> {
  shard_count: Option<usize>,
  capacity: Option<usize>,
  sweeper_interval: Option<Duration>,
  default_ttl: Option<Duration>,
  config: Option<CacheConfig>,
  bridge: Option<Arc<dyn InvalidationBridge>>,
  _value: PhantomData<fn() -> V>,
}

impl<V> Default for CacheBuilder<V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<V> CacheBuilder<V> {
  pub fn new() -> Self {
    Self {
      shard_count: None,
      capacity: None,
      sweeper_interval: None,
      default_ttl: None,
      config: None,
      bridge: None,
      _value: PhantomData,
    }
  }

  /// Starts from a declarative configuration, e.g. one deserialized from a
  /// file. Explicit builder calls override individual config fields.
  pub fn from_config(config: CacheConfig) -> Self {
    Self {
      config: Some(config),
      ..Self::new()
    }
  }

  /// Number of shards. Zero means the default (8).
  pub fn shard_count(mut self, shard_count: usize) -> Self {
    self.shard_count = Some(shard_count);
    self
  }

  /// Total capacity across all shards. Must exceed the shard count.
  /// Zero means the default (1000).
  pub fn capacity(mut self, capacity: usize) -> Self {
    self.capacity = Some(capacity);
    self
  }

  /// How often each shard's sweeper scans for expired entries.
  pub fn sweeper_interval(mut self, interval: Duration) -> Self {
    self.sweeper_interval = Some(interval);
    self
  }

  /// TTL applied to entries set without an explicit TTL. Zero disables
  /// the default, matching the unset state.
  pub fn default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = Some(ttl);
    self
  }

  /// Attaches an invalidation transport. Takes precedence over any
  /// `invalidation` section in the config.
  pub fn bridge(mut self, bridge: Arc<dyn InvalidationBridge>) -> Self {
    self.bridge = Some(bridge);
    self
  }
}

impl<V> CacheBuilder<V>
where
  V: Clone + Send + 'static,
{
  /// Validates the configuration, builds the shards, and starts the
  /// background sweepers (and the subscriber, when a bridge is
  /// configured).
  pub fn build(self) -> Result<Cache<V>, ConfigError> {
    let resolved = match &self.config {
      Some(config) => Some(config.resolve()?),
      None => None,
    };

    let shard_count = non_zero_or(
      self.shard_count,
      resolved.as_ref().map(|r| r.shard_count),
      DEFAULT_SHARD_COUNT,
    );
    let capacity = non_zero_or(
      self.capacity,
      resolved.as_ref().map(|r| r.capacity),
      DEFAULT_CAPACITY,
    );
    if capacity <= shard_count {
      return Err(ConfigError::CapacityNotAboveShards {
        capacity,
        shard_count,
      });
    }

    let sweeper_interval = self
      .sweeper_interval
      .or(resolved.as_ref().map(|r| r.sweeper_interval))
      .unwrap_or(DEFAULT_SWEEPER_INTERVAL);
    let default_ttl = self
      .default_ttl
      .or(resolved.as_ref().map(|r| r.default_ttl))
      .unwrap_or(Duration::ZERO);

    let bridge = match (self.bridge, resolved.as_ref().and_then(|r| r.invalidation.as_ref())) {
      (Some(bridge), _) => Some(bridge),
      (None, Some(config)) => Some(invalidation::bridge_from_config(config)?),
      (None, None) => None,
    };

    info!(
      "initializing cache: shard_count={shard_count} capacity={capacity} \
       sweeper_interval={sweeper_interval:?} default_ttl={default_ttl:?} \
       invalidation={}",
      bridge.is_some()
    );

    let store = Arc::new(ShardedStore::new(shard_count, capacity, default_ttl));
    let metrics = Arc::new(Metrics::new());
    let shutdown = Shutdown::new();

    let mut tasks = sweeper::spawn_sweepers(&store, &metrics, sweeper_interval, &shutdown);
    if let Some(bridge) = &bridge {
      tasks.push(subscriber::spawn(
        Arc::clone(&store),
        Arc::clone(&metrics),
        Arc::clone(bridge),
        shutdown.clone(),
      ));
    }

    Ok(Cache {
      core: Arc::new(CacheCore {
        store,
        metrics,
        flight: SingleFlight::new(),
        bridge,
        shutdown,
        tasks: Mutex::new(tasks),
        closed: AtomicBool::new(false),
      }),
    })
  }
}

/// Explicit builder value first, then the config value, then the default;
/// zeros fall through to the next layer.
fn non_zero_or(explicit: Option<usize>, configured: Option<usize>, default: usize) -> usize {
  explicit
    .filter(|&n| n > 0)
    .or_else(|| configured.filter(|&n| n > 0))
    .unwrap_or(default)
}
