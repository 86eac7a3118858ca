use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// The boxed error type user loaders and invalidation transports return.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Errors surfaced by the cache's read paths.
///
/// Writes never fail from the caller's perspective; publish failures on the
/// invalidation bridge are logged at warn level and swallowed.
#[derive(Debug, Clone)]
pub enum CacheError {
  /// The requested key is absent, or its entry had expired and was removed
  /// on the way out. Carries the key verbatim.
  KeyNotFound(String),
  /// The user loader returned an error inside `get_or_load`. The error is
  /// propagated verbatim and shared between coalesced callers.
  Loader(Arc<BoxError>),
  /// The user loader panicked. The unwind is captured so that coalesced
  /// waiters observe an error instead of unwinding themselves.
  LoaderPanic(String),
}

impl fmt::Display for CacheError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CacheError::KeyNotFound(key) => write!(f, "key not found: {key}"),
      CacheError::Loader(err) => write!(f, "loader failed: {err}"),
      CacheError::LoaderPanic(msg) => write!(f, "loader panicked: {msg}"),
    }
  }
}

impl Error for CacheError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      CacheError::Loader(err) => Some(&***err),
      _ => None,
    }
  }
}

impl CacheError {
  /// True when the error is a plain miss rather than a load failure.
  pub fn is_not_found(&self) -> bool {
    matches!(self, CacheError::KeyNotFound(_))
  }
}

/// Errors that abort cache construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
  /// Total capacity must exceed the shard count, otherwise some shard ends
  /// up with capacity zero or one and the eviction loop degrades.
  CapacityNotAboveShards { capacity: usize, shard_count: usize },
  /// The configured invalidation transport tag is not recognized.
  UnknownInvalidator(String),
  /// A duration string could not be parsed.
  InvalidDuration { field: &'static str, value: String },
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::CapacityNotAboveShards {
        capacity,
        shard_count,
      } => write!(
        f,
        "capacity ({capacity}) must be greater than shard count ({shard_count})"
      ),
      ConfigError::UnknownInvalidator(tag) => {
        write!(f, "unknown invalidator type: {tag}")
      }
      ConfigError::InvalidDuration { field, value } => {
        write!(f, "invalid duration for {field}: {value:?}")
      }
    }
  }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn key_not_found_display_carries_key() {
    let err = CacheError::KeyNotFound("user:42".to_owned());
    assert_eq!(err.to_string(), "key not found: user:42");
    assert!(err.is_not_found());
  }

  #[test]
  fn loader_error_exposes_source() {
    let inner: BoxError = "backend unreachable".into();
    let err = CacheError::Loader(Arc::new(inner));
    assert!(err.source().is_some());
    assert!(!err.is_not_found());
    assert_eq!(err.to_string(), "loader failed: backend unreachable");
  }

  #[test]
  fn config_error_display() {
    let err = ConfigError::CapacityNotAboveShards {
      capacity: 4,
      shard_count: 8,
    };
    assert_eq!(
      err.to_string(),
      "capacity (4) must be greater than shard count (8)"
    );
  }
}
