//! An in-process transport backed by named broadcast channels in a
//! process-global registry. Bridges created with the same channel name see
//! each other's messages, which mirrors how the networked transports
//! behave across processes — including delivery of a bridge's own
//! publishes back to its subscriber.

use super::{InvalidationBridge, InvalidationHandler};
use crate::error::BoxError;
use crate::signal::Shutdown;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

const DEFAULT_CHANNEL: &str = "shoal:invalidation";
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(25);

static REGISTRY: Lazy<Mutex<HashMap<String, Vec<RegisteredSubscriber>>>> =
  Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(0);

struct RegisteredSubscriber {
  id: u64,
  sender: Sender<String>,
}

/// In-process invalidation transport.
pub struct MemoryBridge {
  channel: String,
  closed: AtomicBool,
}

impl MemoryBridge {
  /// Creates a bridge on the named channel. An empty name selects the
  /// shared default channel.
  pub fn new(channel: impl Into<String>) -> Self {
    let channel = channel.into();
    let channel = if channel.is_empty() {
      DEFAULT_CHANNEL.to_owned()
    } else {
      channel
    };
    Self {
      channel,
      closed: AtomicBool::new(false),
    }
  }

  /// Decodes the `driverConfig` blob: `{ "channel": "name" }`, everything
  /// optional.
  pub(crate) fn from_driver_config(driver_config: &serde_json::Value) -> Self {
    let channel = driver_config
      .get("channel")
      .and_then(|value| value.as_str())
      .unwrap_or("");
    Self::new(channel)
  }

  pub fn channel(&self) -> &str {
    &self.channel
  }

  fn register(&self) -> (u64, mpsc::Receiver<String>) {
    let id = NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed);
    let (sender, receiver) = mpsc::channel();
    REGISTRY
      .lock()
      .entry(self.channel.clone())
      .or_default()
      .push(RegisteredSubscriber { id, sender });
    (id, receiver)
  }

  fn deregister(&self, id: u64) {
    let mut registry = REGISTRY.lock();
    if let Some(subscribers) = registry.get_mut(&self.channel) {
      subscribers.retain(|subscriber| subscriber.id != id);
      if subscribers.is_empty() {
        registry.remove(&self.channel);
      }
    }
  }
}

impl InvalidationBridge for MemoryBridge {
  fn publish(&self, key: &str) -> Result<(), BoxError> {
    if self.closed.load(Ordering::Acquire) {
      return Err("memory bridge is closed".into());
    }
    let registry = REGISTRY.lock();
    if let Some(subscribers) = registry.get(&self.channel) {
      for subscriber in subscribers {
        // A receiver that went away is dropped on its own deregister;
        // delivery to the rest proceeds.
        let _ = subscriber.sender.send(key.to_owned());
      }
    }
    Ok(())
  }

  fn subscribe(&self, shutdown: Shutdown, handler: InvalidationHandler) -> Result<(), BoxError> {
    let (id, receiver) = self.register();

    loop {
      if shutdown.is_cancelled() || self.closed.load(Ordering::Acquire) {
        break;
      }
      match receiver.recv_timeout(RECV_POLL_INTERVAL) {
        Ok(key) => handler(&key),
        Err(RecvTimeoutError::Timeout) => continue,
        Err(RecvTimeoutError::Disconnected) => break,
      }
    }

    self.deregister(id);
    Ok(())
  }

  fn close(&self) -> Result<(), BoxError> {
    self.closed.store(true, Ordering::Release);
    Ok(())
  }
}
