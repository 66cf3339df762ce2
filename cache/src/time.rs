use once_cell::sync::Lazy;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// The single, static reference point for all time calculations in the cache.
// It is initialized lazily on its first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Converts an `Instant` into a `Duration` since the cache's epoch.
#[inline]
pub(crate) fn instant_to_duration(instant: Instant) -> Duration {
  instant.saturating_duration_since(*CACHE_EPOCH)
}

/// A helper to get the current time as a `Duration` since the epoch.
#[inline]
pub(crate) fn now_duration() -> Duration {
  instant_to_duration(Instant::now())
}

/// A source of monotonic timestamps for entry bookkeeping.
///
/// Timestamps are `Duration`s measured from an arbitrary, fixed epoch. Only
/// differences between them are meaningful.
pub trait Clock: Send + Sync + fmt::Debug {
  fn now(&self) -> Duration;
}

/// The default clock, backed by `Instant::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
  #[inline]
  fn now(&self) -> Duration {
    now_duration()
  }
}

/// A clock that only moves when told to. Useful for exercising TTL and LRU
/// behaviour deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
  nanos: AtomicU64,
}

impl ManualClock {
  pub fn new() -> Self {
    Self::default()
  }

  /// Moves the clock forward by `by`.
  pub fn advance(&self, by: Duration) {
    self
      .nanos
      .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
  }

  /// Sets the clock to an absolute offset from its epoch.
  pub fn set(&self, at: Duration) {
    self.nanos.store(at.as_nanos() as u64, Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Duration {
    Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
  }
}
