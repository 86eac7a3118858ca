use crate::shard::Shard;

use std::time::Duration;

use crossbeam_utils::CachePadded;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a. Routing must stay stable for the lifetime of a store,
/// so the hash is fixed rather than randomly keyed.
#[inline]
pub(crate) fn fnv1a(bytes: &[u8]) -> u32 {
  let mut hash = FNV_OFFSET_BASIS;
  for byte in bytes {
    hash ^= u32::from(*byte);
    hash = hash.wrapping_mul(FNV_PRIME);
  }
  hash
}

/// A fixed fan-out of independently locked shards.
///
/// Keys route to `fnv1a(key) % shard_count`; the mapping never changes
/// once the store is built.
pub(crate) struct ShardedStore<V> {
  shards: Box<[CachePadded<Shard<V>>]>,
}

impl<V> ShardedStore<V> {
  /// Splits `capacity` evenly across `shard_count` shards; the last shard
  /// absorbs the remainder so the per-shard capacities sum to the total.
  pub(crate) fn new(shard_count: usize, capacity: usize, default_ttl: Duration) -> Self {
    let base = capacity / shard_count;
    let remainder = capacity % shard_count;

    let mut shards = Vec::with_capacity(shard_count);
    for i in 0..shard_count {
      let shard_capacity = if i == shard_count - 1 {
        base + remainder
      } else {
        base
      };
      shards.push(CachePadded::new(Shard::new(shard_capacity, default_ttl)));
    }

    Self {
      shards: shards.into_boxed_slice(),
    }
  }

  #[inline]
  pub(crate) fn shard_index(&self, key: &str) -> usize {
    fnv1a(key.as_bytes()) as usize % self.shards.len()
  }

  #[inline]
  pub(crate) fn shard_for(&self, key: &str) -> &Shard<V> {
    &self.shards[self.shard_index(key)]
  }

  #[inline]
  pub(crate) fn shard(&self, index: usize) -> &Shard<V> {
    &self.shards[index]
  }

  pub(crate) fn shard_count(&self) -> usize {
    self.shards.len()
  }

  pub(crate) fn iter_shards(&self) -> impl Iterator<Item = &Shard<V>> {
    self.shards.iter().map(|padded| &**padded)
  }

  /// Applies a remotely received invalidation: the empty key clears every
  /// shard, anything else deletes the one key locally. Receivers never
  /// republish, which keeps a fleet of instances from feeding back.
  pub(crate) fn apply_invalidation(&self, key: &str) {
    if key.is_empty() {
      for shard in self.iter_shards() {
        shard.state.lock().clear();
      }
    } else {
      self.shard_for(key).state.lock().delete(key);
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.iter_shards().map(|shard| shard.state.lock().len()).sum()
  }
}
