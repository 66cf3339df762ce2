#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fibre_memo::time::ManualClock;
use fibre_memo::CacheManager;

/// A manager driven by a clock that only moves when the test says so.
pub fn manual_manager() -> (CacheManager, Arc<ManualClock>) {
  let clock = Arc::new(ManualClock::new());
  let manager = CacheManager::with_clock(clock.clone());
  (manager, clock)
}

pub fn secs(s: f64) -> Duration {
  Duration::from_secs_f64(s)
}

/// Counts how many times a wrapped function actually ran.
#[derive(Clone, Default)]
pub struct RunCounter(Arc<AtomicUsize>);

impl RunCounter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn bump(&self) -> usize {
    self.0.fetch_add(1, Ordering::SeqCst)
  }

  pub fn get(&self) -> usize {
    self.0.load(Ordering::SeqCst)
  }
}
