use crate::digest::Digest;
use crate::policy::EntryMeta;

use std::sync::Arc;
use std::time::Duration;

/// A cached value together with the bookkeeping the eviction policies read.
///
/// Entries are owned by their store and only mutated under the store's lock.
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
  pub(crate) value: Arc<V>,
  pub(crate) created_at: Duration,
  pub(crate) last_access_at: Duration,
  pub(crate) hit_count: u64,
  /// Insertion sequence number, used as the final tie breaker.
  pub(crate) seq: u64,
}

impl<V> CacheEntry<V> {
  pub(crate) fn new(value: Arc<V>, seq: u64, now: Duration) -> Self {
    Self {
      value,
      created_at: now,
      last_access_at: now,
      hit_count: 0,
      seq,
    }
  }

  /// Records a hit at `now` and hands out the value.
  #[inline]
  pub(crate) fn touch(&mut self, now: Duration) -> Arc<V> {
    self.last_access_at = now;
    self.hit_count += 1;
    self.value.clone()
  }

  /// Replaces the value in place. The entry keeps its sequence number but
  /// otherwise starts over as if freshly inserted.
  pub(crate) fn reset(&mut self, value: Arc<V>, now: Duration) {
    self.value = value;
    self.created_at = now;
    self.last_access_at = now;
    self.hit_count = 0;
  }

  /// An entry is expired once it has lived for at least `ttl`.
  #[inline]
  pub(crate) fn is_expired(&self, ttl: Option<Duration>, now: Duration) -> bool {
    match ttl {
      Some(ttl) => now.saturating_sub(self.created_at) >= ttl,
      None => false,
    }
  }

  pub(crate) fn meta<'a>(&self, key: &'a Digest) -> EntryMeta<'a> {
    EntryMeta {
      key,
      seq: self.seq,
      created_at: self.created_at,
      last_access_at: self.last_access_at,
      hit_count: self.hit_count,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SEC: Duration = Duration::from_secs(1);

  #[test]
  fn test_expiry_boundary_is_inclusive() {
    let entry = CacheEntry::new(Arc::new(()), 0, SEC);
    let ttl = Some(SEC);
    assert!(!entry.is_expired(ttl, SEC + SEC / 2));
    assert!(entry.is_expired(ttl, SEC * 2));
    assert!(!entry.is_expired(None, SEC * 100));
  }

  #[test]
  fn test_touch_and_reset() {
    let mut entry = CacheEntry::new(Arc::new(1), 7, Duration::ZERO);
    assert_eq!(*entry.touch(SEC), 1);
    entry.touch(SEC * 2);
    assert_eq!(entry.hit_count, 2);
    assert_eq!(entry.last_access_at, SEC * 2);

    entry.reset(Arc::new(2), SEC * 3);
    assert_eq!(entry.hit_count, 0);
    assert_eq!(entry.created_at, SEC * 3);
    assert_eq!(entry.seq, 7);
    assert_eq!(*entry.value, 2);
  }
}
