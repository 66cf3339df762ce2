//! Eviction policies.
//!
//! A policy only chooses victims; the store owns the entries and does the
//! removal. When the store is full it hands the policy a view of every live
//! entry's bookkeeping and evicts whichever key the policy returns.

pub mod fifo;
pub mod lfu;
pub mod lru;

pub use fifo::Fifo;
pub use lfu::Lfu;
pub use lru::Lru;

use crate::digest::Digest;
use crate::error::BuildError;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// A read-only view of one entry's bookkeeping, handed to a policy.
#[derive(Debug, Clone, Copy)]
pub struct EntryMeta<'a> {
  pub key: &'a Digest,
  /// Insertion sequence number. Lower means inserted earlier.
  pub seq: u64,
  pub created_at: Duration,
  pub last_access_at: Duration,
  pub hit_count: u64,
}

/// A strategy for choosing which entry to evict from a full store.
///
/// Called with the store's lock held, so implementations should not block.
pub trait CachePolicy: Send + Sync + fmt::Debug {
  /// A short name for logs.
  fn name(&self) -> &'static str;

  /// Picks the entry to evict, or `None` to evict nothing.
  fn select_victim<'a>(
    &self,
    entries: &mut dyn Iterator<Item = EntryMeta<'a>>,
    now: Duration,
  ) -> Option<Digest>;
}

/// The built-in eviction policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum EvictionPolicy {
  /// Evict the entry inserted first.
  Fifo,
  /// Evict the entry idle the longest.
  #[default]
  Lru,
  /// Evict the entry with the fewest hits.
  Lfu,
}

impl EvictionPolicy {
  pub fn as_str(&self) -> &'static str {
    match self {
      EvictionPolicy::Fifo => "FIFO",
      EvictionPolicy::Lru => "LRU",
      EvictionPolicy::Lfu => "LFU",
    }
  }

  /// Creates the policy object the store runs.
  pub fn into_policy(self) -> Arc<dyn CachePolicy> {
    match self {
      EvictionPolicy::Fifo => Arc::new(Fifo),
      EvictionPolicy::Lru => Arc::new(Lru),
      EvictionPolicy::Lfu => Arc::new(Lfu),
    }
  }
}

impl fmt::Display for EvictionPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EvictionPolicy {
  type Err = BuildError;

  /// Parses a policy name, ignoring case.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.eq_ignore_ascii_case("fifo") {
      Ok(EvictionPolicy::Fifo)
    } else if s.eq_ignore_ascii_case("lru") {
      Ok(EvictionPolicy::Lru)
    } else if s.eq_ignore_ascii_case("lfu") {
      Ok(EvictionPolicy::Lfu)
    } else {
      Err(BuildError::UnknownPolicy(s.to_string()))
    }
  }
}

impl TryFrom<String> for EvictionPolicy {
  type Error = BuildError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<EvictionPolicy> for String {
  fn from(policy: EvictionPolicy) -> Self {
    policy.as_str().to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_is_case_insensitive() {
    assert_eq!("lru".parse::<EvictionPolicy>(), Ok(EvictionPolicy::Lru));
    assert_eq!("Fifo".parse::<EvictionPolicy>(), Ok(EvictionPolicy::Fifo));
    assert_eq!("LFU".parse::<EvictionPolicy>(), Ok(EvictionPolicy::Lfu));
  }

  #[test]
  fn test_unknown_name_is_rejected() {
    assert_eq!(
      "MRU".parse::<EvictionPolicy>(),
      Err(BuildError::UnknownPolicy("MRU".to_string()))
    );
  }

  #[test]
  fn test_default_and_display() {
    assert_eq!(EvictionPolicy::default(), EvictionPolicy::Lru);
    assert_eq!(EvictionPolicy::Lfu.to_string(), "LFU");
    assert_eq!(EvictionPolicy::Fifo.into_policy().name(), "FIFO");
  }
}
