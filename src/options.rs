use std::time::Duration;

/// Per-call options for [`Cache::set`](crate::Cache::set).
///
/// Options are consuming builders; within the same flag the last call wins:
///
/// ```
/// use shoal::SetOptions;
/// use std::time::Duration;
///
/// let opts = SetOptions::new()
///   .ttl(Duration::from_secs(30))
///   .invalidate();
/// ```
///
/// Expiry precedence on set: `no_expiration()` pins the entry regardless of
/// any default TTL; an explicit non-zero `ttl(..)` applies as-is; leaving
/// the TTL unset (or explicitly zero) defers to the cache's default TTL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
  ttl: Duration,
  no_expiration: bool,
  publish: bool,
}

impl SetOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets an explicit TTL. Clears a previously requested `no_expiration`.
  /// A zero duration leaves the TTL unset, deferring to the default.
  pub fn ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self.no_expiration = false;
    self
  }

  /// Pins the entry: it never expires, even when the cache has a default
  /// TTL configured.
  pub fn no_expiration(mut self) -> Self {
    self.ttl = Duration::ZERO;
    self.no_expiration = true;
    self
  }

  /// Publishes a key invalidation on the bridge after the write lands.
  /// A no-op when the cache has no bridge configured.
  pub fn invalidate(mut self) -> Self {
    self.publish = true;
    self
  }

  #[inline]
  pub(crate) fn ttl_value(&self) -> Duration {
    self.ttl
  }

  #[inline]
  pub(crate) fn is_no_expiration(&self) -> bool {
    self.no_expiration
  }

  #[inline]
  pub(crate) fn should_publish(&self) -> bool {
    self.publish
  }
}

/// Per-call options for [`Cache::delete`](crate::Cache::delete).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
  publish: bool,
}

impl DeleteOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Publishes a key invalidation on the bridge after the delete.
  pub fn invalidate(mut self) -> Self {
    self.publish = true;
    self
  }

  #[inline]
  pub(crate) fn should_publish(&self) -> bool {
    self.publish
  }
}

/// Per-call options for [`Cache::clear`](crate::Cache::clear).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearOptions {
  publish: bool,
}

impl ClearOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Publishes the clear-all sentinel (the empty key) after the clear.
  pub fn invalidate(mut self) -> Self {
    self.publish = true;
    self
  }

  #[inline]
  pub(crate) fn should_publish(&self) -> bool {
    self.publish
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn set_options_default() {
    let opts = SetOptions::new();
    assert_eq!(opts.ttl_value(), Duration::ZERO);
    assert!(!opts.is_no_expiration());
    assert!(!opts.should_publish());
  }

  #[test]
  fn ttl_clears_no_expiration() {
    let opts = SetOptions::new()
      .no_expiration()
      .ttl(Duration::from_secs(5));
    assert_eq!(opts.ttl_value(), Duration::from_secs(5));
    assert!(!opts.is_no_expiration());
  }

  #[test]
  fn no_expiration_zeroes_pending_ttl() {
    let opts = SetOptions::new()
      .ttl(Duration::from_secs(5))
      .no_expiration();
    assert_eq!(opts.ttl_value(), Duration::ZERO);
    assert!(opts.is_no_expiration());
  }

  #[test]
  fn last_ttl_wins() {
    let opts = SetOptions::new()
      .ttl(Duration::from_secs(1))
      .ttl(Duration::from_secs(9));
    assert_eq!(opts.ttl_value(), Duration::from_secs(9));
  }

  #[test]
  fn invalidate_is_orthogonal_to_expiry_flags() {
    let opts = SetOptions::new().invalidate().no_expiration();
    assert!(opts.should_publish());
    assert!(opts.is_no_expiration());
  }

  #[test]
  fn delete_and_clear_options_default_to_silent() {
    assert!(!DeleteOptions::new().should_publish());
    assert!(!ClearOptions::new().should_publish());
    assert!(DeleteOptions::new().invalidate().should_publish());
    assert!(ClearOptions::new().invalidate().should_publish());
  }
}
