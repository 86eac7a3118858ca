use crate::entry::Entry;
use crate::options::SetOptions;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use generational_arena::{Arena, Index};
use parking_lot::Mutex;

/// One independently locked slice of the cache.
///
/// The lock is taken by the owner (`Cache`); `ShardState` itself assumes
/// exclusive access.
pub(crate) struct Shard<V> {
  pub(crate) state: Mutex<ShardState<V>>,
}

impl<V> Shard<V> {
  pub(crate) fn new(capacity: usize, default_ttl: Duration) -> Self {
    Self {
      state: Mutex::new(ShardState::new(capacity, default_ttl)),
    }
  }
}

/// The map plus the intrusive LRU list of one shard.
///
/// Every live entry is reachable both through `lookup` (by key) and by
/// walking the list from `head` to `tail`; `count` tracks either
/// cardinality. Head is most-recently-used, tail is least.
pub(crate) struct ShardState<V> {
  entries: Arena<Entry<V>>,
  lookup: HashMap<String, Index>,
  head: Option<Index>,
  tail: Option<Index>,
  count: usize,
  capacity: usize,
  /// Zero disables the default.
  default_ttl: Duration,
}

impl<V> ShardState<V> {
  pub(crate) fn new(capacity: usize, default_ttl: Duration) -> Self {
    Self {
      entries: Arena::with_capacity(capacity),
      lookup: HashMap::with_capacity(capacity),
      head: None,
      tail: None,
      count: 0,
      capacity,
      default_ttl,
    }
  }

  /// Looks up `key` and promotes the entry to the head of the LRU list.
  ///
  /// An entry observed past its expiry counts as a miss and is removed on
  /// the spot, so reads self-heal and the sweeper is purely a latency
  /// optimization.
  pub(crate) fn get(&mut self, key: &str, now: Instant) -> Option<V>
  where
    V: Clone,
  {
    let index = *self.lookup.get(key)?;
    if self.entries[index].is_expired(now) {
      self.remove_index(index);
      return None;
    }
    self.move_to_head(index);
    Some(self.entries[index].value.clone())
  }

  /// Inserts or updates `key`, evicting from the tail until there is room
  /// for a new entry. Returns the number of entries evicted for capacity.
  pub(crate) fn set(&mut self, key: &str, value: V, options: &SetOptions, now: Instant) -> usize {
    let expires_at = self.expiry_for(options, now);

    if let Some(&index) = self.lookup.get(key) {
      let entry = &mut self.entries[index];
      entry.value = value;
      entry.expires_at = expires_at;
      self.move_to_head(index);
      return 0;
    }

    let mut evicted = 0;
    while self.count >= self.capacity {
      if self.pop_tail().is_none() {
        break;
      }
      evicted += 1;
    }

    let index = self
      .entries
      .insert(Entry::new(key.to_owned(), value, expires_at));
    self.lookup.insert(key.to_owned(), index);
    self.push_front(index);
    self.count += 1;
    evicted
  }

  /// Removes `key` if present. A no-op on absent keys.
  pub(crate) fn delete(&mut self, key: &str) -> bool {
    match self.lookup.get(key) {
      Some(&index) => {
        self.remove_index(index);
        true
      }
      None => false,
    }
  }

  /// Scans every entry and drops the expired ones. Returns how many were
  /// removed.
  pub(crate) fn sweep_expired(&mut self, now: Instant) -> usize {
    let expired: Vec<Index> = self
      .entries
      .iter()
      .filter(|(_, entry)| entry.is_expired(now))
      .map(|(index, _)| index)
      .collect();

    for &index in &expired {
      self.remove_index(index);
    }
    expired.len()
  }

  /// Drops everything and resets the list.
  pub(crate) fn clear(&mut self) {
    self.entries.clear();
    self.lookup.clear();
    self.head = None;
    self.tail = None;
    self.count = 0;
  }

  pub(crate) fn len(&self) -> usize {
    self.count
  }

  /// Effective expiry for a set: the no-expiration flag wins outright; an
  /// explicit non-zero TTL applies; otherwise the shard default applies
  /// when configured; otherwise the entry never expires.
  fn expiry_for(&self, options: &SetOptions, now: Instant) -> Option<Instant> {
    if options.is_no_expiration() {
      return None;
    }
    let mut ttl = options.ttl_value();
    if ttl.is_zero() {
      ttl = self.default_ttl;
    }
    if ttl.is_zero() {
      None
    } else {
      Some(now + ttl)
    }
  }

  // --- LRU list plumbing ---
  // All list mutations touch a constant number of links.

  fn unlink(&mut self, index: Index) {
    let (prev, next) = {
      let entry = &self.entries[index];
      (entry.prev, entry.next)
    };
    match prev {
      Some(p) => self.entries[p].next = next,
      None => self.head = next,
    }
    match next {
      Some(n) => self.entries[n].prev = prev,
      None => self.tail = prev,
    }
  }

  fn push_front(&mut self, index: Index) {
    let old_head = self.head;
    {
      let entry = &mut self.entries[index];
      entry.prev = None;
      entry.next = old_head;
    }
    if let Some(h) = old_head {
      self.entries[h].prev = Some(index);
    }
    self.head = Some(index);
    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  fn move_to_head(&mut self, index: Index) {
    if self.head != Some(index) {
      self.unlink(index);
      self.push_front(index);
    }
  }

  /// Removes the least-recently-used entry and returns its key. Returns
  /// `None` when the list is empty, which stops the eviction loop.
  fn pop_tail(&mut self) -> Option<String> {
    let tail = self.tail?;
    self.unlink(tail);
    let entry = self.entries.remove(tail).unwrap();
    self.lookup.remove(&entry.key);
    self.count -= 1;
    Some(entry.key)
  }

  fn remove_index(&mut self, index: Index) {
    self.unlink(index);
    let entry = self.entries.remove(index).unwrap();
    self.lookup.remove(&entry.key);
    self.count -= 1;
  }

  // --- Test-only introspection ---

  /// Keys from most- to least-recently-used.
  #[cfg(test)]
  pub(crate) fn keys_as_vec(&self) -> Vec<String> {
    let mut keys = Vec::with_capacity(self.count);
    let mut current = self.head;
    while let Some(index) = current {
      keys.push(self.entries[index].key.clone());
      current = self.entries[index].next;
    }
    keys
  }

  /// Asserts that the map, the list, and `count` agree, in both traversal
  /// directions, and that the capacity bound holds.
  #[cfg(test)]
  pub(crate) fn check_integrity(&self) {
    assert_eq!(self.lookup.len(), self.count, "lookup/count mismatch");
    assert_eq!(self.entries.len(), self.count, "arena/count mismatch");
    assert!(self.count <= self.capacity, "capacity bound violated");

    let forward = self.keys_as_vec();
    assert_eq!(forward.len(), self.count, "forward walk length mismatch");
    for key in &forward {
      let &index = self.lookup.get(key).expect("list key missing from map");
      assert_eq!(&self.entries[index].key, key);
    }

    let mut backward = Vec::with_capacity(self.count);
    let mut current = self.tail;
    while let Some(index) = current {
      backward.push(self.entries[index].key.clone());
      current = self.entries[index].prev;
    }
    backward.reverse();
    assert_eq!(forward, backward, "forward and backward walks disagree");
  }
}
