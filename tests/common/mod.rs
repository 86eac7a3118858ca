#![allow(dead_code)]

use shoal::{Cache, CacheBuilder};

use std::time::{Duration, Instant};

/// A string-valued cache with the given fan-out and capacity and no
/// default TTL.
pub fn small_cache(shard_count: usize, capacity: usize) -> Cache<String> {
  CacheBuilder::new()
    .shard_count(shard_count)
    .capacity(capacity)
    .build()
    .unwrap()
}

/// Polls `check` until it holds or `deadline` elapses. Returns whether it
/// ever held. Cross-instance propagation is eventual, so assertions on it
/// go through here.
pub fn eventually(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
  let start = Instant::now();
  while start.elapsed() < deadline {
    if check() {
      return true;
    }
    std::thread::sleep(Duration::from_millis(5));
  }
  false
}
