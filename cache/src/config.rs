use crate::error::BuildError;
use crate::policy::EvictionPolicy;

use std::time::Duration;

/// The settings of one memoized function's cache, in a form that can be kept
/// in a configuration file.
///
/// With the `serde` feature every field is optional when deserializing, the
/// policy name is case-insensitive and `ttl` is given in (fractional)
/// seconds:
///
/// ```json
/// { "max_items": 128, "policy": "lfu", "ttl": 2.5 }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct CacheConfig {
  /// Upper bound on live entries. `None` means unbounded.
  pub max_items: Option<usize>,
  pub policy: EvictionPolicy,
  /// Entry lifetime. `None` means entries never expire.
  #[cfg_attr(feature = "serde", serde(with = "ttl_secs"))]
  pub ttl: Option<Duration>,
  /// Let concurrent callers with the same arguments wait for one
  /// computation instead of each running the function.
  pub single_flight: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      max_items: None,
      policy: EvictionPolicy::Lru,
      ttl: None,
      single_flight: false,
    }
  }
}

impl CacheConfig {
  /// Checks the settings without building anything, for configs loaded
  /// ahead of the functions that use them.
  pub fn validate(&self) -> Result<(), BuildError> {
    check_capacity(self.max_items)
  }
}

pub(crate) fn check_capacity(max_items: Option<usize>) -> Result<(), BuildError> {
  if max_items == Some(0) {
    return Err(BuildError::ZeroCapacity);
  }
  Ok(())
}

/// Converts a TTL in seconds, rejecting values a `Duration` cannot hold.
pub(crate) fn ttl_from_secs(secs: f64) -> Result<Duration, BuildError> {
  Duration::try_from_secs_f64(secs).map_err(|_| BuildError::InvalidTtl(secs))
}

#[cfg(feature = "serde")]
mod ttl_secs {
  use serde::{de, Deserialize, Deserializer, Serializer};
  use std::time::Duration;

  pub(super) fn serialize<S: Serializer>(ttl: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match ttl {
      Some(ttl) => serializer.serialize_some(&ttl.as_secs_f64()),
      None => serializer.serialize_none(),
    }
  }

  pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    match Option::<f64>::deserialize(deserializer)? {
      Some(secs) => super::ttl_from_secs(secs).map(Some).map_err(de::Error::custom),
      None => Ok(None),
    }
  }
}
