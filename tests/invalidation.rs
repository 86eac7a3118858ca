mod common;

use common::eventually;
use shoal::{
  Cache, CacheBuilder, CacheConfig, ClearOptions, DeleteOptions, MemoryBridge, SetOptions,
};

use std::sync::Arc;
use std::thread;
use std::time::Duration;

const PROPAGATION_DEADLINE: Duration = Duration::from_secs(5);

/// Two instances joined by the in-process transport on a dedicated
/// channel. Channel names are per-test because the registry is
/// process-global and the test binary runs tests in parallel.
fn bridged_pair(channel: &str) -> (Cache<String>, Cache<String>) {
  let build = || -> Cache<String> {
    CacheBuilder::new()
      .shard_count(2)
      .capacity(50)
      .bridge(Arc::new(MemoryBridge::new(channel)))
      .build()
      .unwrap()
  };
  (build(), build())
}

#[test]
fn set_with_invalidate_evicts_the_key_on_the_peer() {
  let (a, b) = bridged_pair("it:set-invalidate");

  b.set("x", "stale".to_owned(), SetOptions::new());
  a.set("x", "1".to_owned(), SetOptions::new());
  a.set("x", "2".to_owned(), SetOptions::new().invalidate());

  // Only the eviction crosses the bridge, never the value.
  assert!(eventually(PROPAGATION_DEADLINE, || b.get("x").is_err()));

  a.close().unwrap();
  b.close().unwrap();
}

#[test]
fn set_without_invalidate_stays_local() {
  let (a, b) = bridged_pair("it:set-silent");

  b.set("x", "stale".to_owned(), SetOptions::new());
  a.set("x", "fresh".to_owned(), SetOptions::new());

  thread::sleep(Duration::from_millis(150));
  assert_eq!(b.get("x").unwrap(), "stale");
  assert_eq!(b.metrics().invalidations_received, 0);

  a.close().unwrap();
  b.close().unwrap();
}

#[test]
fn delete_with_invalidate_evicts_on_the_peer() {
  let (a, b) = bridged_pair("it:delete-invalidate");

  a.set("x", "1".to_owned(), SetOptions::new());
  b.set("x", "1".to_owned(), SetOptions::new());

  a.delete("x", DeleteOptions::new().invalidate());
  assert!(eventually(PROPAGATION_DEADLINE, || b.get("x").is_err()));

  a.close().unwrap();
  b.close().unwrap();
}

#[test]
fn clear_with_invalidate_broadcasts_the_clear_all_sentinel() {
  let (a, b) = bridged_pair("it:clear-invalidate");

  for i in 0..20 {
    b.set(&format!("key-{i}"), i.to_string(), SetOptions::new());
  }
  a.set("other", "1".to_owned(), SetOptions::new());

  a.clear(ClearOptions::new().invalidate());
  assert!(eventually(PROPAGATION_DEADLINE, || b.is_empty()));

  a.close().unwrap();
  b.close().unwrap();
}

#[test]
fn receivers_do_not_republish() {
  let (a, b) = bridged_pair("it:no-storm");

  b.set("x", "1".to_owned(), SetOptions::new());
  a.set("x", "2".to_owned(), SetOptions::new().invalidate());

  assert!(eventually(PROPAGATION_DEADLINE, || {
    b.metrics().invalidations_received >= 1
  }));
  // The receiving side applied the eviction without putting anything
  // back on the wire.
  thread::sleep(Duration::from_millis(100));
  assert_eq!(b.metrics().invalidations_published, 0);
  assert_eq!(a.metrics().invalidations_published, 1);

  a.close().unwrap();
  b.close().unwrap();
}

#[test]
fn duplicate_deliveries_are_harmless() {
  let (a, b) = bridged_pair("it:duplicates");

  b.set("x", "1".to_owned(), SetOptions::new());
  for _ in 0..5 {
    a.delete("x", DeleteOptions::new().invalidate());
  }

  assert!(eventually(PROPAGATION_DEADLINE, || {
    b.metrics().invalidations_received >= 5
  }));
  assert!(b.get("x").is_err());

  a.close().unwrap();
  b.close().unwrap();
}

#[test]
fn bridge_can_come_from_config() {
  let json = r#"{
    "shardCount": 2,
    "capacity": 50,
    "invalidation": { "type": "memory", "driverConfig": { "channel": "it:from-config" } }
  }"#;
  let config: CacheConfig = serde_json::from_str(json).unwrap();

  let a: Cache<String> = CacheBuilder::from_config(config.clone()).build().unwrap();
  let b: Cache<String> = CacheBuilder::from_config(config).build().unwrap();

  b.set("x", "1".to_owned(), SetOptions::new());
  a.delete("x", DeleteOptions::new().invalidate());
  assert!(eventually(PROPAGATION_DEADLINE, || b.get("x").is_err()));

  a.close().unwrap();
  b.close().unwrap();
}

#[test]
fn closed_instances_publish_nothing() {
  let (a, b) = bridged_pair("it:closed");

  b.set("x", "1".to_owned(), SetOptions::new());
  a.close().unwrap();

  // Writes on the closed instance still land locally, silently.
  a.set("x", "2".to_owned(), SetOptions::new().invalidate());
  assert_eq!(a.get("x").unwrap(), "2");

  thread::sleep(Duration::from_millis(150));
  assert_eq!(b.get("x").unwrap(), "1");
  assert_eq!(a.metrics().invalidations_published, 0);

  b.close().unwrap();
}

#[test]
fn a_cache_without_a_bridge_treats_invalidate_flags_as_noops() {
  let cache = common::small_cache(2, 10);
  cache.set("x", "1".to_owned(), SetOptions::new().invalidate());
  cache.delete("x", DeleteOptions::new().invalidate());
  cache.clear(ClearOptions::new().invalidate());
  assert_eq!(cache.metrics().invalidations_published, 0);
  cache.close().unwrap();
}
