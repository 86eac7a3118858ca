use crate::error::ConfigError;

use std::time::Duration;

use serde::Deserialize;

pub(crate) const DEFAULT_SHARD_COUNT: usize = 8;
pub(crate) const DEFAULT_CAPACITY: usize = 1000;
pub(crate) const DEFAULT_SWEEPER_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Declarative cache configuration, as it arrives from a config file.
///
/// Zero values mean "use the default"; durations are human-readable
/// strings such as `"250ms"`, `"40s"`, `"10m"` or `"1h30m"`.
/// [`resolve`](CacheConfig::resolve) applies defaults, parses the strings
/// and validates the result.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheConfig {
  #[serde(default)]
  pub shard_count: usize,
  #[serde(default)]
  pub capacity: usize,
  #[serde(default)]
  pub sweeper_interval: Option<String>,
  /// Default TTL applied to entries set without an explicit TTL. Absent or
  /// empty means entries do not expire by default.
  #[serde(default)]
  pub ttl: Option<String>,
  #[serde(default)]
  pub invalidation: Option<InvalidationConfig>,
}

/// Selects an invalidation transport by tag. The driver blob is opaque at
/// this layer; the selected transport decodes it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InvalidationConfig {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub driver_config: serde_json::Value,
}

/// Configuration after defaults, parsing, and validation.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
  pub(crate) shard_count: usize,
  pub(crate) capacity: usize,
  pub(crate) sweeper_interval: Duration,
  pub(crate) default_ttl: Duration,
  pub(crate) invalidation: Option<InvalidationConfig>,
}

impl CacheConfig {
  pub(crate) fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
    let shard_count = if self.shard_count == 0 {
      DEFAULT_SHARD_COUNT
    } else {
      self.shard_count
    };
    let capacity = if self.capacity == 0 {
      DEFAULT_CAPACITY
    } else {
      self.capacity
    };
    if capacity <= shard_count {
      return Err(ConfigError::CapacityNotAboveShards {
        capacity,
        shard_count,
      });
    }

    let sweeper_interval = match self.sweeper_interval.as_deref() {
      Some(raw) if !raw.trim().is_empty() => {
        parse_duration(raw).ok_or_else(|| ConfigError::InvalidDuration {
          field: "sweeperInterval",
          value: raw.to_owned(),
        })?
      }
      _ => DEFAULT_SWEEPER_INTERVAL,
    };

    let default_ttl = match self.ttl.as_deref() {
      Some(raw) if !raw.trim().is_empty() => {
        parse_duration(raw).ok_or_else(|| ConfigError::InvalidDuration {
          field: "ttl",
          value: raw.to_owned(),
        })?
      }
      _ => Duration::ZERO,
    };

    Ok(ResolvedConfig {
      shard_count,
      capacity,
      sweeper_interval,
      default_ttl,
      invalidation: self.invalidation.clone(),
    })
  }
}

/// Parses `300ms` / `40s` / `10m` / `2h` style duration strings, including
/// compound forms like `1h30m` and fractional counts like `1.5s`. A bare
/// `0` is accepted. Returns `None` on anything malformed.
pub(crate) fn parse_duration(raw: &str) -> Option<Duration> {
  let s = raw.trim();
  if s.is_empty() {
    return None;
  }
  if s == "0" {
    return Some(Duration::ZERO);
  }

  let bytes = s.as_bytes();
  let mut total = Duration::ZERO;
  let mut i = 0;
  while i < bytes.len() {
    let number_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
      i += 1;
    }
    let count: f64 = s[number_start..i].parse().ok()?;
    if !count.is_finite() || count < 0.0 {
      return None;
    }

    let unit_start = i;
    while i < bytes.len() && !bytes[i].is_ascii_digit() {
      i += 1;
    }
    let unit_secs = match &s[unit_start..i] {
      "ns" => 1e-9,
      "us" | "\u{b5}s" => 1e-6,
      "ms" => 1e-3,
      "s" => 1.0,
      "m" => 60.0,
      "h" => 3600.0,
      _ => return None,
    };
    total = total.checked_add(Duration::try_from_secs_f64(count * unit_secs).ok()?)?;
  }
  Some(total)
}
