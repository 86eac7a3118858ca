use std::time::Instant;

use generational_arena::Index;

/// A single cached value, woven into its shard's LRU list through the
/// `prev`/`next` arena indices.
///
/// Entries are created by a successful set or load, mutated only under the
/// owning shard's lock, and dropped when evicted, deleted, or swept.
#[derive(Debug)]
pub(crate) struct Entry<V> {
  pub(crate) key: String,
  pub(crate) value: V,
  /// `None` means the entry never expires.
  pub(crate) expires_at: Option<Instant>,
  pub(crate) prev: Option<Index>,
  pub(crate) next: Option<Index>,
}

impl<V> Entry<V> {
  pub(crate) fn new(key: String, value: V, expires_at: Option<Instant>) -> Self {
    Self {
      key,
      value,
      expires_at,
      prev: None,
      next: None,
    }
  }

  #[inline]
  pub(crate) fn is_expired(&self, now: Instant) -> bool {
    matches!(self.expires_at, Some(at) if now >= at)
  }
}
