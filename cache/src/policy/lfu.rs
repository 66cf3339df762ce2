use super::{CachePolicy, EntryMeta};
use crate::digest::Digest;

use std::time::Duration;

/// Evicts the entry with the fewest hits since it was last written.
/// Ties go to the entry inserted first.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lfu;

impl CachePolicy for Lfu {
  fn name(&self) -> &'static str {
    "LFU"
  }

  fn select_victim<'a>(
    &self,
    entries: &mut dyn Iterator<Item = EntryMeta<'a>>,
    _now: Duration,
  ) -> Option<Digest> {
    entries
      .min_by_key(|meta| (meta.hit_count, meta.seq))
      .map(|meta| *meta.key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn meta(key: &Digest, seq: u64, hit_count: u64) -> EntryMeta<'_> {
    EntryMeta {
      key,
      seq,
      created_at: Duration::ZERO,
      last_access_at: Duration::ZERO,
      hit_count,
    }
  }

  #[test]
  fn test_least_hit_is_evicted() {
    let (a, b, c) = (Digest::of(b"a"), Digest::of(b"b"), Digest::of(b"c"));
    let entries = vec![meta(&a, 0, 2), meta(&b, 1, 0), meta(&c, 2, 1)];
    assert_eq!(Lfu.select_victim(&mut entries.into_iter(), Duration::ZERO), Some(b));
  }

  #[test]
  fn test_ties_go_to_the_oldest_insert() {
    let (a, b) = (Digest::of(b"a"), Digest::of(b"b"));
    let entries = vec![meta(&b, 1, 0), meta(&a, 0, 0)];
    assert_eq!(Lfu.select_victim(&mut entries.into_iter(), Duration::ZERO), Some(a));
  }
}
