use super::{CachePolicy, EntryMeta};
use crate::digest::Digest;

use std::time::Duration;

/// Evicts entries in First-In, First-Out order. Reads do not matter.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fifo;

impl CachePolicy for Fifo {
  fn name(&self) -> &'static str {
    "FIFO"
  }

  fn select_victim<'a>(
    &self,
    entries: &mut dyn Iterator<Item = EntryMeta<'a>>,
    _now: Duration,
  ) -> Option<Digest> {
    entries.min_by_key(|meta| meta.seq).map(|meta| *meta.key)
  }
}
