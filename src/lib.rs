//! # shoal
//!
//! A sharded, in-process key-value cache for read-heavy workloads where
//! values are expensive to compute and several processes share a logical
//! key space that should stay approximately coherent.
//!
//! - Fixed fan-out of independently locked shards, each a map plus an
//!   intrusive LRU list with per-entry TTL and a background expiration
//!   sweeper.
//! - Single-flight coalescing: concurrent misses for one key run the
//!   loader at most once, and every caller shares the outcome.
//! - Optional cross-instance invalidation over a pluggable
//!   publish/subscribe bridge — only evictions travel, never values.
//!
//! ```
//! use shoal::{CacheBuilder, SetOptions};
//! use std::time::Duration;
//!
//! let cache: shoal::Cache<String> = CacheBuilder::new()
//!   .shard_count(4)
//!   .capacity(10_000)
//!   .build()
//!   .unwrap();
//!
//! cache.set("user:1", "alice".to_owned(), SetOptions::new().ttl(Duration::from_secs(60)));
//! assert_eq!(cache.get("user:1").unwrap(), "alice");
//!
//! let profile = cache.get_or_load("user:2", |_key| {
//!   // ... fetch from the backing store ...
//!   Ok(("bob".to_owned(), Duration::from_secs(60)))
//! });
//! assert_eq!(profile.unwrap(), "bob");
//!
//! cache.close().unwrap();
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod metrics;
pub mod options;
pub mod signal;

mod entry;
mod flight;
mod shard;
mod store;
mod task;

pub use builder::CacheBuilder;
pub use cache::Cache;
pub use config::{CacheConfig, InvalidationConfig};
pub use error::{BoxError, CacheError, ConfigError};
pub use invalidation::{InvalidationBridge, InvalidationHandler, MemoryBridge, CLEAR_ALL};
pub use metrics::MetricsSnapshot;
pub use options::{ClearOptions, DeleteOptions, SetOptions};
pub use signal::Shutdown;

/// What a loader returns: the value plus a TTL hint. A zero hint defers to
/// the cache's default TTL.
pub type LoaderResult<V> = Result<(V, std::time::Duration), BoxError>;
