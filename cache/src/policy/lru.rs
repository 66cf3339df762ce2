use super::{CachePolicy, EntryMeta};
use crate::digest::Digest;

use std::cmp::Reverse;
use std::time::Duration;

/// Evicts the entry that has gone the longest without being read or written.
/// Ties go to the entry inserted first.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lru;

impl CachePolicy for Lru {
  fn name(&self) -> &'static str {
    "LRU"
  }

  fn select_victim<'a>(
    &self,
    entries: &mut dyn Iterator<Item = EntryMeta<'a>>,
    now: Duration,
  ) -> Option<Digest> {
    entries
      .min_by_key(|meta| (Reverse(now.saturating_sub(meta.last_access_at)), meta.seq))
      .map(|meta| *meta.key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn meta(key: &Digest, seq: u64, last_access_secs: u64) -> EntryMeta<'_> {
    EntryMeta {
      key,
      seq,
      created_at: Duration::from_secs(seq),
      last_access_at: Duration::from_secs(last_access_secs),
      hit_count: 0,
    }
  }

  #[test]
  fn test_longest_idle_is_evicted() {
    let (a, b) = (Digest::of(b"a"), Digest::of(b"b"));
    // `a` was inserted first but read more recently than `b`.
    let entries = vec![meta(&a, 0, 5), meta(&b, 1, 3)];
    let victim = Lru.select_victim(&mut entries.into_iter(), Duration::from_secs(6));
    assert_eq!(victim, Some(b));
  }

  #[test]
  fn test_ties_go_to_the_oldest_insert() {
    let (a, b) = (Digest::of(b"a"), Digest::of(b"b"));
    let entries = vec![meta(&b, 4, 2), meta(&a, 3, 2)];
    let victim = Lru.select_victim(&mut entries.into_iter(), Duration::from_secs(2));
    assert_eq!(victim, Some(a));
  }
}
