//! The publish/subscribe contract that carries key evictions between cache
//! instances, plus the in-process transport.
//!
//! Only eviction travels over a bridge, never values: a message is the bare
//! UTF-8 key to delete, and the empty string asks receivers to clear
//! everything. Networked transports (a document-store change feed, a
//! Redis-style channel) live outside this crate; they implement
//! [`InvalidationBridge`] and are handed to the builder.

mod memory;

pub use memory::MemoryBridge;

use crate::config::InvalidationConfig;
use crate::error::{BoxError, ConfigError};
use crate::signal::Shutdown;

use std::sync::Arc;

/// The message that requests a full clear on every receiving instance.
pub const CLEAR_ALL: &str = "";

/// Callback a subscriber invokes once per received key.
pub type InvalidationHandler = Box<dyn Fn(&str) + Send>;

/// A publish/subscribe transport for invalidation messages.
///
/// Delivery is at-least-once; handlers must tolerate duplicates. Deleting
/// an absent key is a no-op, so the cache's own handler is naturally
/// duplicate-safe.
pub trait InvalidationBridge: Send + Sync {
  /// Fire-and-forget delivery of one key to every subscriber. The caller
  /// treats failures as non-fatal.
  fn publish(&self, key: &str) -> Result<(), BoxError>;

  /// Blocks, invoking `handler` for each received key, until `shutdown`
  /// fires or the transport goes away.
  fn subscribe(&self, shutdown: Shutdown, handler: InvalidationHandler) -> Result<(), BoxError>;

  /// Releases transport resources. Idempotent.
  fn close(&self) -> Result<(), BoxError>;
}

/// Resolves a declarative invalidation config into a concrete transport.
///
/// Transports are constructed explicitly rather than looked up through a
/// registration side effect; the only tag resolvable from bare config is
/// `memory`. Anything else must be built by the application and passed to
/// [`CacheBuilder::bridge`](crate::CacheBuilder::bridge).
pub(crate) fn bridge_from_config(
  config: &InvalidationConfig,
) -> Result<Arc<dyn InvalidationBridge>, ConfigError> {
  match config.kind.as_str() {
    "memory" => Ok(Arc::new(MemoryBridge::from_driver_config(
      &config.driver_config,
    ))),
    other => Err(ConfigError::UnknownInvalidator(other.to_owned())),
  }
}
